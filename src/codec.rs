use bytes::{Buf, BytesMut};
use std::env;
use std::io::Cursor;
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::frame::{self, Frame};
use crate::Error;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: max_frame_size(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn max_frame_size() -> usize {
    match env::var("MAX_FRAME_SIZE") {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid MAX_FRAME_SIZE {:?}", value);
            DEFAULT_MAX_FRAME_SIZE
        }),
        Err(_) => DEFAULT_MAX_FRAME_SIZE,
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() > self.max_frame_size {
            return Err("frame size exceeds limit".into());
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            Err(frame::Error::Incomplete) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let position = cursor.position() as usize;
        trace!(bytes = position, "decoded frame");

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}
