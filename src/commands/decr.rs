use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Decrements the number stored at key by one.
///
/// Ref: <https://redis.io/docs/latest/commands/decr/>
#[derive(Debug, PartialEq)]
pub struct Decr {
    pub key: String,
}

impl Executable for Decr {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let res = db.store.lock().incr_by(&self.key, -1_i64);

        match res {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(msg) => Ok(Frame::Error(msg)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Decr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.ensure_exhausted()?;

        Ok(Self { key })
    }
}
