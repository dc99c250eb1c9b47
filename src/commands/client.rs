use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

/// Connection management (`CLIENT SETNAME`, `CLIENT SETINFO`, ...). Accepted and ignored so that
/// client libraries can complete their handshake.
#[derive(Debug, PartialEq)]
pub struct Client {
    pub args: Vec<String>,
}

impl Executable for Client {
    fn exec(self, _db: Db) -> Result<Frame, Error> {
        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Client {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let args = parser.remaining_strings()?;
        Ok(Self { args })
    }
}
