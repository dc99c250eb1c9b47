use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Runs a Lua script with `numkeys` key names followed by arbitrary arguments. The script is
/// cached, so it can later be invoked with EVALSHA.
///
/// Ref: <https://redis.io/docs/latest/commands/eval/>
#[derive(Debug, PartialEq)]
pub struct Eval {
    pub script: String,
    pub keys: Vec<String>,
    pub args: Vec<String>,
}

impl Executable for Eval {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        db.scripts.load(&self.script);

        let res = match db.scripts.eval(&self.script, &self.keys, &self.args) {
            Ok(value) => value.into(),
            Err(err) => Frame::Error(err.to_string()),
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Eval {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let script = parser.next_string()?;
        let (keys, args) = parser.next_keys_and_args()?;

        Ok(Self { script, keys, args })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::commands::Command;
    use crate::scripting::sha1_hex;

    fn eval(parts: &[&str]) -> Command {
        let mut frames = vec![Frame::Bulk(Bytes::from("EVAL"))];
        frames.extend(
            parts
                .iter()
                .map(|part| Frame::Bulk(Bytes::from(part.to_string()))),
        );
        Command::try_from(Frame::Array(frames)).unwrap()
    }

    #[test]
    fn parse_keys_and_args() {
        assert_eq!(
            eval(&["return 1", "2", "k1", "k2", "a1"]),
            Command::Eval(Eval {
                script: "return 1".to_string(),
                keys: vec!["k1".to_string(), "k2".to_string()],
                args: vec!["a1".to_string()],
            })
        );
    }

    #[tokio::test]
    async fn return_values() {
        let db = Db::default();

        let cases = [
            ("return 42", Frame::Integer(42)),
            ("return 'hello'", Frame::Bulk(Bytes::from("hello"))),
            ("return true", Frame::Integer(1)),
            ("return nil", Frame::Null),
            ("return 3.5", Frame::Bulk(Bytes::from("3.5"))),
            (
                "return {1, 'two'}",
                Frame::Array(vec![Frame::Integer(1), Frame::Bulk(Bytes::from("two"))]),
            ),
            ("return redis.status_reply('FINE')", Frame::Simple("FINE".to_string())),
            (
                "return redis.error_reply('MY failure')",
                Frame::Error("MY failure".to_string()),
            ),
        ];

        for (script, expected) in cases {
            assert_eq!(eval(&[script, "0"]).exec(db.clone()).unwrap(), expected, "{}", script);
        }
    }

    #[tokio::test]
    async fn set_then_get_within_one_script() {
        let db = Db::default();

        let cmd = eval(&[
            "redis.call('SET', KEYS[1], ARGV[1]) return redis.call('GET', KEYS[1])",
            "1",
            "greeting",
            "hi",
        ]);

        assert_eq!(cmd.exec(db.clone()).unwrap(), Frame::Bulk(Bytes::from("hi")));
    }

    #[tokio::test]
    async fn caches_the_script() {
        let db = Db::default();
        let script = "return ARGV[1]";

        eval(&[script, "0", "x"]).exec(db.clone()).unwrap();

        assert!(db.scripts.exists(&sha1_hex(script)));
    }

    #[tokio::test]
    async fn status_and_error_replies_are_single_lines() {
        let db = Db::default();

        let res = eval(&["return redis.status_reply('A\\r\\n+INJECTED')", "0"])
            .exec(db.clone())
            .unwrap();
        assert_eq!(res.serialize(), b"+A  +INJECTED\r\n".to_vec());

        let res = eval(&["return redis.error_reply('ERR x\\r\\n:1')", "0"])
            .exec(db.clone())
            .unwrap();
        assert_eq!(res, Frame::Error("ERR x  :1".to_string()));

        let res = eval(&[
            "return {redis.pcall('EXPIRE', KEYS[1], '9223372036854775807')}",
            "1",
            "k",
        ])
        .exec(db)
        .unwrap();
        assert_eq!(
            res,
            Frame::Array(vec![Frame::Error("ERR invalid expire time".to_string())])
        );
    }

    #[tokio::test]
    async fn errors_are_replies() {
        let db = Db::default();

        let res = eval(&["return +", "0"]).exec(db.clone()).unwrap();
        assert!(matches!(res, Frame::Error(ref msg) if msg.starts_with("ERR ")));

        let res = eval(&["error('boom')", "0"]).exec(db).unwrap();
        assert!(matches!(res, Frame::Error(ref msg) if msg.contains("boom")));
    }
}
