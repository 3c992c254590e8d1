//! Length-prefixed [`HubFrame`] framing over a TCP stream.
//!
//! Each frame is a big-endian `u16` length followed by that many bytes of bincode.

use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::{io::AsyncReadExt, io::AsyncWriteExt, io::BufWriter, net::TcpStream};

use super::{FrameError, HubFrame};

const LEN_SIZE: usize = std::mem::size_of::<u16>();

pub fn from_socket(socket: TcpStream) -> (ConnectionTx, ConnectionRx) {
    let (read_stream, write_stream) = socket.into_split();

    (
        ConnectionTx {
            write_stream: BufWriter::new(write_stream),
        },
        ConnectionRx {
            read_stream,
            buffer: BytesMut::with_capacity(256),
        },
    )
}

#[derive(Debug)]
pub struct ConnectionTx {
    write_stream: BufWriter<OwnedWriteHalf>,
}

#[derive(Debug)]
pub struct ConnectionRx {
    read_stream: OwnedReadHalf,
    buffer: BytesMut,
}

impl ConnectionTx {
    pub async fn write_frame(&mut self, frame: &HubFrame) -> Result<(), FrameError> {
        let mut bytes: Bytes = bincode::serialize(frame)?.into();
        let len = u16::try_from(bytes.len()).map_err(|_| {
            tracing::warn!(size = bytes.len(), "Refusing to send oversized frame");
            FrameError::FrameLength
        })?;
        self.write_stream.write_all(&len.to_be_bytes()).await?;
        self.write_stream.write_buf(&mut bytes).await?;
        self.write_stream.flush().await?;
        Ok(())
    }
}

impl ConnectionRx {
    /// Read the next complete frame. `Ok(None)` means the remote closed the connection cleanly.
    ///
    /// Cancel safe: partially received frames stay buffered until the next call.
    pub async fn read_frame(&mut self) -> Result<Option<HubFrame>, FrameError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if self.read_stream.read_buf(&mut self.buffer).await? == 0 {
                if self.buffer.is_empty() {
                    // Remote closed Connection
                    return Ok(None);
                } else {
                    // Connection closed while still sending data
                    return Err(FrameError::ConnectionReset);
                }
            }
        }
    }

    fn parse_frame(&mut self) -> Result<Option<HubFrame>, FrameError> {
        if self.buffer.len() < LEN_SIZE {
            return Ok(None);
        }

        // Use a Cursor to avoid advancing the internal cursor of self.buffer
        let mut buf = Cursor::new(&self.buffer[..]);
        let frame_len = usize::from(buf.get_u16());
        if self.buffer.len() < frame_len + LEN_SIZE {
            return Ok(None);
        }

        // Consume the frame from the buffer and deserialize it
        self.buffer.advance(LEN_SIZE);
        let body = self.buffer.split_to(frame_len);
        Ok(Some(bincode::deserialize::<HubFrame>(&body)?))
    }
}
