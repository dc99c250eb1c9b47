pub mod client;
pub mod dbsize;
pub mod decr;
pub mod del;
pub mod eval;
pub mod evalsha;
pub mod executable;
pub mod exists;
pub mod fcall;
pub mod flushdb;
pub mod function;
pub mod get;
pub mod incr;
pub mod ping;
pub mod script;
pub mod set;
pub mod ttl;
pub mod type_;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

use client::Client;
use dbsize::DBSize;
use decr::Decr;
use del::Del;
use eval::Eval;
use evalsha::EvalSha;
use exists::Exists;
use fcall::FCall;
use flushdb::FlushDb;
use function::Function;
use get::Get;
use incr::Incr;
use ping::Ping;
use script::Script;
use set::Set;
use ttl::Ttl;
use type_::Type;

#[derive(Debug, PartialEq)]
pub enum Command {
    DBsize(DBSize),
    Decr(Decr),
    Del(Del),
    Exists(Exists),
    FlushDb(FlushDb),
    Get(Get),
    Incr(Incr),
    Set(Set),
    Ttl(Ttl),
    Type(Type),

    Eval(Eval),
    EvalSha(EvalSha),
    FCall(FCall),
    Function(Function),
    Script(Script),

    Client(Client),
    Ping(Ping),
}

impl Executable for Command {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        match self {
            Command::Client(cmd) => cmd.exec(db),
            Command::DBsize(cmd) => cmd.exec(db),
            Command::Decr(cmd) => cmd.exec(db),
            Command::Del(cmd) => cmd.exec(db),
            Command::Eval(cmd) => cmd.exec(db),
            Command::EvalSha(cmd) => cmd.exec(db),
            Command::Exists(cmd) => cmd.exec(db),
            Command::FCall(cmd) => cmd.exec(db),
            Command::FlushDb(cmd) => cmd.exec(db),
            Command::Function(cmd) => cmd.exec(db),
            Command::Get(cmd) => cmd.exec(db),
            Command::Incr(cmd) => cmd.exec(db),
            Command::Ping(cmd) => cmd.exec(db),
            Command::Script(cmd) => cmd.exec(db),
            Command::Set(cmd) => cmd.exec(db),
            Command::Ttl(cmd) => cmd.exec(db),
            Command::Type(cmd) => cmd.exec(db),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the Redis server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                }
                .into())
            }
        };

        let parser = &mut CommandParser {
            parts: frames.into_iter(),
            command: String::new(),
        };

        let command_name = parser.parse_command_name()?;

        let command = match &command_name[..] {
            "client" => Client::try_from(parser).map(Command::Client),
            "dbsize" => DBSize::try_from(parser).map(Command::DBsize),
            "decr" => Decr::try_from(parser).map(Command::Decr),
            "del" => Del::try_from(parser).map(Command::Del),
            "eval" => Eval::try_from(parser).map(Command::Eval),
            "evalsha" => EvalSha::try_from(parser).map(Command::EvalSha),
            "exists" => Exists::try_from(parser).map(Command::Exists),
            "fcall" => FCall::try_from(parser).map(Command::FCall),
            "fcall_ro" => FCall::try_from(parser)
                .map(FCall::read_only)
                .map(Command::FCall),
            "flushdb" => FlushDb::try_from(parser).map(Command::FlushDb),
            "function" => Function::try_from(parser).map(Command::Function),
            "get" => Get::try_from(parser).map(Command::Get),
            "incr" => Incr::try_from(parser).map(Command::Incr),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "script" => Script::try_from(parser).map(Command::Script),
            "set" => Set::try_from(parser).map(Command::Set),
            "ttl" => Ttl::try_from(parser).map(Command::Ttl),
            "type" => Type::try_from(parser).map(Command::Type),
            _ => Err(CommandParserError::UnknownCommand {
                command: command_name.clone(),
            }
            .into()),
        };

        // Running out of arguments is reported to clients as an arity error.
        command.map_err(|err| -> Error {
            match err.downcast::<CommandParserError>() {
                Ok(err) if *err == CommandParserError::EndOfStream => {
                    Box::new(CommandParserError::WrongArity {
                        command: command_name.clone(),
                    })
                }
                Ok(err) => err,
                Err(err) => err,
            }
        })
    }
}

pub struct CommandParser {
    parts: vec::IntoIter<Frame>,
    /// Name of the command being parsed, lowercased.
    command: String,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<String, CommandParserError> {
        let command_name = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        let command_name = match command_name {
            Frame::Simple(s) => s.to_lowercase(),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_lowercase())
                .map_err(CommandParserError::InvalidUTF8String)?,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "simple string".to_string(),
                    actual: frame,
                })
            }
        };

        self.command = command_name.clone();
        Ok(command_name)
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        match frame {
            // Both `Simple` and `Bulk` representation may be strings. Strings are parsed to UTF-8.
            // While errors are stored as strings, they are considered separate types.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        match frame {
            Frame::Integer(i) => Ok(i),
            Frame::Simple(string) => string
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotInteger),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map_err(|_| CommandParserError::NotInteger)?
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotInteger),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        match frame {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// The next argument if there is one.
    fn next_optional_string(&mut self) -> Result<Option<String>, CommandParserError> {
        match self.next_string() {
            Ok(s) => Ok(Some(s)),
            Err(CommandParserError::EndOfStream) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Every argument left, in order.
    fn remaining_strings(&mut self) -> Result<Vec<String>, CommandParserError> {
        let mut values = Vec::with_capacity(self.parts.len());
        while let Some(value) = self.next_optional_string()? {
            values.push(value);
        }
        Ok(values)
    }

    /// Parses the `numkeys key... arg...` tail shared by EVAL, EVALSHA and FCALL.
    fn next_keys_and_args(&mut self) -> Result<(Vec<String>, Vec<String>), CommandParserError> {
        let numkeys = self.next_integer()?;
        if numkeys < 0 {
            return Err(CommandParserError::NegativeKeyCount);
        }

        let mut keys = self.remaining_strings()?;
        let numkeys = numkeys as usize;
        if numkeys > keys.len() {
            return Err(CommandParserError::TooManyKeys);
        }

        let args = keys.split_off(numkeys);
        Ok((keys, args))
    }

    /// Fails when arguments are left over.
    fn ensure_exhausted(&self) -> Result<(), CommandParserError> {
        if self.parts.len() > 0 {
            return Err(CommandParserError::WrongArity {
                command: self.command.clone(),
            });
        }
        Ok(())
    }

    /// Accepts the optional `ASYNC` or `SYNC` flush modifier.
    fn parse_flush_mode(&mut self) -> Result<(), CommandParserError> {
        match self.next_optional_string()? {
            None => Ok(()),
            Some(mode)
                if mode.eq_ignore_ascii_case("async") || mode.eq_ignore_ascii_case("sync") =>
            {
                self.ensure_exhausted()
            }
            Some(_) => Err(CommandParserError::SyntaxError),
        }
    }
}

/// Argument errors. The `Display` output is the reply sent to the client.
#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR Protocol error: expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR unknown subcommand '{subcommand}'. Try {command} HELP.")]
    UnknownSubcommand { command: String, subcommand: String },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity { command: String },
    #[error("ERR value is not an integer or out of range")]
    NotInteger,
    #[error("ERR Number of keys can't be negative")]
    NegativeKeyCount,
    #[error("ERR Number of keys can't be greater than number of args")]
    TooManyKeys,
    #[error("ERR syntax error")]
    SyntaxError,
    #[error("ERR invalid function name format, use library.function")]
    InvalidFunctionName,
    #[error("ERR invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("ERR attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}
