use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// TTL returns the remaining time to live of a key that has a timeout, `-1` for a key without
/// one and `-2` for a missing key.
///
/// Ref: <https://redis.io/docs/latest/commands/ttl>
#[derive(Debug, PartialEq)]
pub struct Ttl {
    pub key: String,
}

impl Executable for Ttl {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        Ok(Frame::Integer(db.store.lock().ttl_secs(&self.key)))
    }
}

impl TryFrom<&mut CommandParser> for Ttl {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.ensure_exhausted()?;
        Ok(Self { key })
    }
}
