use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::db::Db;
use crate::frame::Frame;
use crate::scripting::{Library, Stats};
use crate::Error;

/// Function library management.
///
/// Ref: <https://redis.io/docs/latest/commands/function-load/>
#[derive(Debug, PartialEq)]
pub enum Function {
    /// `FUNCTION CREATE libname source [REPLACE]`, replies with the library digest.
    Create {
        library: String,
        source: String,
        replace: bool,
    },
    /// `FUNCTION LOAD [REPLACE] source`, the library name comes from the `#!lua name=` line.
    Load { source: String, replace: bool },
    Delete { library: String },
    List {
        pattern: Option<String>,
        with_code: bool,
    },
    Dump,
    /// `FUNCTION RESTORE payload [FLUSH|APPEND|REPLACE]`. Dumps carry no library code, so the
    /// payload is accepted and ignored.
    Restore,
    Stats,
    Flush,
}

impl Executable for Function {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let functions = &db.functions;

        let res = match self {
            Function::Create {
                library,
                source,
                replace,
            } => match functions.create_library(&library, &source, replace) {
                Ok(digest) => Frame::Bulk(Bytes::from(digest)),
                Err(err) => Frame::Error(err.to_string()),
            },
            Function::Load { source, replace } => match functions.load_library(&source, replace) {
                Ok(name) => Frame::Bulk(Bytes::from(name)),
                Err(err) => Frame::Error(err.to_string()),
            },
            Function::Delete { library } => match functions.delete_library(&library) {
                Ok(()) => Frame::Simple("OK".to_string()),
                Err(err) => Frame::Error(err.to_string()),
            },
            Function::List { pattern, with_code } => Frame::Array(
                functions
                    .list(pattern.as_deref())
                    .iter()
                    .map(|library| describe_library(library, with_code))
                    .collect(),
            ),
            Function::Dump => Frame::Bulk(Bytes::from(functions.dump())),
            Function::Restore => Frame::Simple("OK".to_string()),
            Function::Stats => stats(functions.stats()),
            Function::Flush => {
                functions.flush();
                Frame::Simple("OK".to_string())
            }
        };

        Ok(res)
    }
}

fn bulk(s: &str) -> Frame {
    Frame::Bulk(Bytes::from(s.to_string()))
}

fn describe_library(library: &Library, with_code: bool) -> Frame {
    let functions = library
        .functions
        .values()
        .map(|function| {
            Frame::Array(vec![
                bulk("name"),
                bulk(&function.name),
                bulk("description"),
                function.description.as_deref().map_or(Frame::Null, bulk),
                bulk("flags"),
                Frame::Array(function.flags.iter().map(|flag| bulk(flag)).collect()),
            ])
        })
        .collect();

    let mut res = vec![
        bulk("library_name"),
        bulk(&library.name),
        bulk("engine"),
        bulk(library.engine),
        bulk("functions"),
        Frame::Array(functions),
    ];

    if with_code {
        res.push(bulk("library_code"));
        res.push(bulk(&library.source));
    }

    Frame::Array(res)
}

fn stats(stats: Stats) -> Frame {
    Frame::Array(vec![
        Frame::Array(vec![
            bulk("libraries_count"),
            Frame::Integer(stats.libraries as i64),
        ]),
        Frame::Array(vec![
            bulk("functions_count"),
            Frame::Integer(stats.functions as i64),
        ]),
    ])
}

impl TryFrom<&mut CommandParser> for Function {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let subcommand = parser.next_string()?;

        let function = match subcommand.to_lowercase().as_str() {
            "create" => {
                let library = parser.next_string()?;
                let source = parser.next_string()?;
                let mut replace = false;
                for arg in parser.remaining_strings()? {
                    if !arg.eq_ignore_ascii_case("replace") {
                        return Err(CommandParserError::SyntaxError.into());
                    }
                    replace = true;
                }
                Function::Create {
                    library,
                    source,
                    replace,
                }
            }
            "load" => {
                let mut source = parser.next_string()?;
                let mut replace = false;
                if source.eq_ignore_ascii_case("replace") {
                    if let Some(next) = parser.next_optional_string()? {
                        source = next;
                        replace = true;
                    }
                }
                parser.ensure_exhausted()?;
                Function::Load { source, replace }
            }
            "delete" => {
                let library = parser.next_string()?;
                parser.ensure_exhausted()?;
                Function::Delete { library }
            }
            "list" => {
                let mut pattern = None;
                let mut with_code = false;
                while let Some(arg) = parser.next_optional_string()? {
                    if arg.eq_ignore_ascii_case("withcode") {
                        with_code = true;
                    } else if arg.eq_ignore_ascii_case("libraryname") {
                        pattern = Some(parser.next_string()?);
                    } else if pattern.is_none() {
                        pattern = Some(arg);
                    } else {
                        return Err(CommandParserError::SyntaxError.into());
                    }
                }
                Function::List { pattern, with_code }
            }
            "dump" => {
                parser.ensure_exhausted()?;
                Function::Dump
            }
            "restore" => {
                parser.next_bytes()?;
                if let Some(policy) = parser.next_optional_string()? {
                    if !["flush", "append", "replace"]
                        .iter()
                        .any(|p| policy.eq_ignore_ascii_case(p))
                    {
                        return Err(CommandParserError::SyntaxError.into());
                    }
                }
                parser.ensure_exhausted()?;
                Function::Restore
            }
            "stats" => {
                parser.ensure_exhausted()?;
                Function::Stats
            }
            "flush" => {
                parser.parse_flush_mode()?;
                Function::Flush
            }
            _ => {
                return Err(CommandParserError::UnknownSubcommand {
                    command: "FUNCTION".to_string(),
                    subcommand,
                }
                .into())
            }
        };

        Ok(function)
    }
}
