use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// A frame oriented view over a byte stream. Used both for clients connecting to the server and
/// for the replica's connection to its master.
pub struct Connection<S = TcpStream> {
    pub id: Uuid,
    // Data is read from the socket into the codec's read buffer. When a frame is parsed, the
    // corresponding data is removed from the buffer.
    framed: Framed<S, FrameCodec>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Connection<S> {
        Connection::with_codec(stream, FrameCodec::new())
    }

    pub fn with_codec(stream: S, codec: FrameCodec) -> Connection<S> {
        Connection {
            id: Uuid::new_v4(),
            framed: Framed::new(stream, codec),
        }
    }

    /// Reads a single frame. Returns `None` when the peer closed the stream cleanly between two
    /// frames; closing in the middle of a frame is an error.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.framed.send(frame).await
    }
}
