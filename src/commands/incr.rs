use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Increments the number stored at key by one.
///
/// Ref: <https://redis.io/docs/latest/commands/incr/>
#[derive(Debug, PartialEq)]
pub struct Incr {
    pub key: String,
}

impl Executable for Incr {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let res = db.store.lock().incr_by(&self.key, 1_i64);

        match res {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(msg) => Ok(Frame::Error(msg)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Incr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        parser.ensure_exhausted()?;

        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::store::Value;
    use bytes::Bytes;

    fn incr() -> Command {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("INCR")),
            Frame::Bulk(Bytes::from("key1")),
        ]);
        Command::try_from(frame).unwrap()
    }

    #[tokio::test]
    async fn existing_key() {
        let db = Db::default();
        let cmd = incr();

        assert_eq!(
            cmd,
            Command::Incr(Incr {
                key: "key1".to_string()
            })
        );

        db.store.lock().set(String::from("key1"), Bytes::from("1"));

        let result = cmd.exec(db.clone()).unwrap();

        assert_eq!(result, Frame::Integer(2));
        assert_eq!(
            db.store.lock().get("key1"),
            Some(&Value::String(Bytes::from("2")))
        );
    }

    #[tokio::test]
    async fn non_existing_key() {
        let db = Db::default();

        let result = incr().exec(db.clone()).unwrap();

        assert_eq!(result, Frame::Integer(1));
        assert_eq!(
            db.store.lock().get("key1"),
            Some(&Value::String(Bytes::from("1")))
        );
    }

    #[tokio::test]
    async fn invalid_value() {
        let db = Db::default();
        db.store
            .lock()
            .set(String::from("key1"), Bytes::from("12abc"));

        let result = incr().exec(db.clone()).unwrap();

        assert_eq!(
            result,
            Frame::Error("ERR value is not an integer or out of range".to_string())
        );
        assert_eq!(
            db.store.lock().get("key1"),
            Some(&Value::String(Bytes::from("12abc")))
        );
    }

    #[tokio::test]
    async fn out_of_range() {
        let db = Db::default();
        db.store
            .lock()
            .set(String::from("key1"), Bytes::from("999223372036854775808"));

        let result = incr().exec(db.clone()).unwrap();

        assert_eq!(
            result,
            Frame::Error("ERR value is not an integer or out of range".to_string())
        );
    }
}
