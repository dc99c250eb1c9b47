use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::store::{Value, WRONGTYPE};
use crate::Error;

/// Get the value of `key`. If the key does not exist the special value `nil` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: String,
}

impl Executable for Get {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let state = db.store.lock();

        let res = match state.get(&self.key) {
            Some(Value::String(value)) => Frame::Bulk(value.clone()),
            Some(_) => Frame::Error(WRONGTYPE.to_string()),
            None => Frame::Null,
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.ensure_exhausted()?;
        Ok(Self { key })
    }
}
