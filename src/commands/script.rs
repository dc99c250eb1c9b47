use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Script cache management.
///
/// Ref: <https://redis.io/docs/latest/commands/script-load/>
#[derive(Debug, PartialEq)]
pub enum Script {
    /// Caches a script without running it and replies with its digest.
    Load { script: String },
    /// One `1`/`0` per digest, in request order.
    Exists { digests: Vec<String> },
    Flush,
    /// Accepted for compatibility. Debugging is not supported.
    Debug,
    /// Accepted for compatibility. Running scripts can't be interrupted.
    Kill,
}

impl Executable for Script {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let res = match self {
            Script::Load { script } => Frame::Bulk(Bytes::from(db.scripts.load(&script))),
            Script::Exists { digests } => Frame::Array(
                digests
                    .iter()
                    .map(|digest| Frame::Integer(db.scripts.exists(digest) as i64))
                    .collect(),
            ),
            Script::Flush => {
                db.scripts.flush();
                Frame::Simple("OK".to_string())
            }
            Script::Debug | Script::Kill => Frame::Simple("OK".to_string()),
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Script {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let subcommand = parser.next_string()?;

        let script = match subcommand.to_lowercase().as_str() {
            "load" => {
                let script = parser.next_string()?;
                parser.ensure_exhausted()?;
                Script::Load { script }
            }
            "exists" => {
                let digests = parser.remaining_strings()?;
                if digests.is_empty() {
                    return Err(CommandParserError::WrongArity {
                        command: "script|exists".to_string(),
                    }
                    .into());
                }
                Script::Exists { digests }
            }
            "flush" => {
                parser.parse_flush_mode()?;
                Script::Flush
            }
            "debug" => {
                parser.remaining_strings()?;
                Script::Debug
            }
            "kill" => {
                parser.ensure_exhausted()?;
                Script::Kill
            }
            _ => {
                return Err(CommandParserError::UnknownSubcommand {
                    command: "SCRIPT".to_string(),
                    subcommand,
                }
                .into())
            }
        };

        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::scripting::sha1_hex;

    fn script(parts: &[&str]) -> Result<Command, Error> {
        let mut frames = vec![Frame::Bulk(Bytes::from("SCRIPT"))];
        frames.extend(
            parts
                .iter()
                .map(|part| Frame::Bulk(Bytes::from(part.to_string()))),
        );
        Command::try_from(Frame::Array(frames))
    }

    #[tokio::test]
    async fn load_exists_flush() {
        let db = Db::default();
        let digest = sha1_hex("return 1");

        let res = script(&["LOAD", "return 1"]).unwrap().exec(db.clone()).unwrap();
        assert_eq!(res, Frame::Bulk(Bytes::from(digest.clone())));

        let res = script(&["EXISTS", &digest, "0000000000000000000000000000000000000000"])
            .unwrap()
            .exec(db.clone())
            .unwrap();
        assert_eq!(res, Frame::Array(vec![Frame::Integer(1), Frame::Integer(0)]));

        let res = script(&["flush", "sync"]).unwrap().exec(db.clone()).unwrap();
        assert_eq!(res, Frame::Simple("OK".to_string()));
        assert!(!db.scripts.exists(&digest));
    }

    #[tokio::test]
    async fn debug_and_kill_are_no_ops() {
        let db = Db::default();

        for parts in [&["DEBUG", "NO"][..], &["KILL"][..]] {
            let res = script(parts).unwrap().exec(db.clone()).unwrap();
            assert_eq!(res, Frame::Simple("OK".to_string()));
        }
    }

    #[test]
    fn argument_errors() {
        let err = script(&["NOPE"]).err().unwrap();
        assert_eq!(
            err.to_string(),
            "ERR unknown subcommand 'NOPE'. Try SCRIPT HELP."
        );

        let err = script(&["FLUSH", "LATER"]).err().unwrap();
        assert_eq!(
            *err.downcast_ref::<CommandParserError>().unwrap(),
            CommandParserError::SyntaxError
        );

        let err = script(&["EXISTS"]).err().unwrap();
        assert_eq!(
            err.to_string(),
            "ERR wrong number of arguments for 'script|exists' command"
        );
    }
}
