use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Returns the string representation of the type of the value stored at `key`: `string`, `list`,
/// `set`, `zset` or `hash`. If the key does not exist, `none` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/type/>
#[derive(Debug, PartialEq)]
pub struct Type {
    pub key: String,
}

impl Executable for Type {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let state = db.store.lock();
        let type_ = state
            .get(&self.key)
            .map(|value| value.type_name())
            .unwrap_or("none");

        Ok(Frame::Simple(type_.to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Type {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.ensure_exhausted()?;
        Ok(Self { key })
    }
}
