use futures::StreamExt;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

pub struct Connection {
    pub id: Uuid,
    pub client_address: Option<SocketAddr>,
    reader: FramedRead<OwnedReadHalf, FrameCodec>,
    writer: OwnedWriteHalf,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        let client_address = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();

        Connection {
            id: Uuid::new_v4(),
            client_address,
            reader: FramedRead::new(reader, FrameCodec::new()),
            writer,
        }
    }

    /// Reads the next frame. `Ok(None)` means the peer closed the connection.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.reader.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<(), Error> {
        self.writer.write_all(&frame.serialize()).await?;
        Ok(())
    }
}
