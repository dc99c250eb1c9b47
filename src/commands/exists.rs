use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Returns how many of the given keys exist. A key named several times is counted every time.
///
/// Ref: <https://redis.io/docs/latest/commands/exists/>
#[derive(Debug, PartialEq)]
pub struct Exists {
    pub keys: Vec<String>,
}

impl Executable for Exists {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let state = db.store.lock();
        let count = self.keys.iter().filter(|key| state.exists(key)).count();

        Ok(Frame::Integer(count as i64))
    }
}

impl TryFrom<&mut CommandParser> for Exists {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.remaining_strings()?;
        if keys.is_empty() {
            return Err(CommandParserError::EndOfStream.into());
        }

        Ok(Self { keys })
    }
}
