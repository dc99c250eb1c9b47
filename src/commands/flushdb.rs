use tracing::info;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Deletes every key. Cached scripts and function libraries are kept.
///
/// Ref: <https://redis.io/docs/latest/commands/flushdb/>
#[derive(Debug, PartialEq)]
pub struct FlushDb;

impl Executable for FlushDb {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        db.store.lock().flush();
        info!("keyspace flushed");

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for FlushDb {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.parse_flush_mode()?;
        Ok(Self)
    }
}
