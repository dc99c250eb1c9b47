use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Invokes `library.function` with `numkeys` key names followed by arbitrary arguments.
///
/// FCALL_RO is parsed into the same command with `read_only` set. Read-only calls are not
/// prevented from writing.
///
/// Ref: <https://redis.io/docs/latest/commands/fcall/>
#[derive(Debug, PartialEq)]
pub struct FCall {
    pub library: String,
    pub function: String,
    pub keys: Vec<String>,
    pub args: Vec<String>,
    pub read_only: bool,
}

impl FCall {
    pub fn read_only(self) -> Self {
        Self {
            read_only: true,
            ..self
        }
    }
}

impl Executable for FCall {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let res = db
            .functions
            .call_function(&self.library, &self.function, &self.keys, &self.args);

        match res {
            Ok(value) => Ok(value.into()),
            Err(err) => Ok(Frame::Error(err.to_string())),
        }
    }
}

impl TryFrom<&mut CommandParser> for FCall {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let name = parser.next_string()?;
        let (library, function) = match name.split_once('.') {
            Some((library, function)) if !library.is_empty() && !function.is_empty() => {
                (library.to_string(), function.to_string())
            }
            _ => return Err(CommandParserError::InvalidFunctionName.into()),
        };

        let (keys, args) = parser.next_keys_and_args()?;

        Ok(Self {
            library,
            function,
            keys,
            args,
            read_only: false,
        })
    }
}
