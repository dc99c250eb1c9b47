use crate::db::Db;
use crate::frame::Frame;
use crate::Error;

pub trait Executable {
    fn exec(self, db: Db) -> Result<Frame, Error>;
}
