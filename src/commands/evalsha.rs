use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Runs a script from the cache by its SHA-1 digest. Replies `NOSCRIPT` when the digest is
/// unknown, so clients can fall back to EVAL.
///
/// Ref: <https://redis.io/docs/latest/commands/evalsha/>
#[derive(Debug, PartialEq)]
pub struct EvalSha {
    pub digest: String,
    pub keys: Vec<String>,
    pub args: Vec<String>,
}

impl Executable for EvalSha {
    fn exec(self, db: Db) -> Result<Frame, Error> {
        let res = match db.scripts.eval_sha(&self.digest, &self.keys, &self.args) {
            Ok(value) => value.into(),
            Err(err) => Frame::Error(err.to_string()),
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for EvalSha {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let digest = parser.next_string()?;
        let (keys, args) = parser.next_keys_and_args()?;

        Ok(Self { digest, keys, args })
    }
}
