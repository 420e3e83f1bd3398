use bytes::Bytes;
use std::time::Duration;
use strum_macros::Display;
use thiserror::Error as ThisError;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::ReplicaOf;
use crate::connection::Connection;
use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum HandshakeState {
    Connect,
    Ping,
    ListeningPort,
    Capabilities,
    Psync,
    Done,
}

/// What the master answered to `PSYNC ? -1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullResync {
    pub replid: String,
    pub offset: u64,
}

impl TryFrom<&Frame> for FullResync {
    type Error = ();

    fn try_from(frame: &Frame) -> Result<Self, Self::Error> {
        let line = match frame {
            Frame::Simple(line) => line,
            _ => return Err(()),
        };

        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(keyword), Some(replid), Some(offset), None)
                if keyword.eq_ignore_ascii_case("FULLRESYNC") =>
            {
                let offset = offset.parse::<u64>().map_err(|_| ())?;
                Ok(FullResync {
                    replid: replid.to_string(),
                    offset,
                })
            }
            _ => Err(()),
        }
    }
}

#[derive(Debug, ThisError)]
pub enum HandshakeError {
    #[error("failed to connect to master {master}: {source}")]
    Connect {
        master: String,
        #[source]
        source: std::io::Error,
    },
    #[error("protocol error during {state}: {source}")]
    Protocol {
        state: HandshakeState,
        #[source]
        source: crate::Error,
    },
    #[error("master closed the connection during {state}")]
    ConnectionClosed { state: HandshakeState },
    #[error("master replied with an error during {state}: {message}")]
    ErrorReply {
        state: HandshakeState,
        message: String,
    },
    #[error("unexpected reply during {state}: {reply}")]
    UnexpectedReply { state: HandshakeState, reply: Frame },
}

impl HandshakeError {
    /// The step the handshake was in when it failed.
    pub fn state(&self) -> HandshakeState {
        match self {
            HandshakeError::Connect { .. } => HandshakeState::Connect,
            HandshakeError::Protocol { state, .. }
            | HandshakeError::ConnectionClosed { state }
            | HandshakeError::ErrorReply { state, .. }
            | HandshakeError::UnexpectedReply { state, .. } => *state,
        }
    }
}

/// The replica side of the initial synchronization with a master: `PING`, the two `REPLCONF`
/// announcements and `PSYNC ? -1`, one request at a time, each preceded by `delay`.
#[derive(Debug, Clone)]
pub struct Handshake {
    master: ReplicaOf,
    listening_port: u16,
    delay: Duration,
}

impl Handshake {
    pub fn new(master: ReplicaOf, listening_port: u16, delay: Duration) -> Handshake {
        Handshake {
            master,
            listening_port,
            delay,
        }
    }

    pub async fn run(&self) -> Result<FullResync, HandshakeError> {
        let stream = TcpStream::connect((self.master.host.as_str(), self.master.port))
            .await
            .map_err(|source| HandshakeError::Connect {
                master: self.master.to_string(),
                source,
            })?;
        let mut conn = Connection::new(stream);

        info!(master = %self.master, "Connected to master");

        let port = self.listening_port.to_string();
        let requests = [
            (HandshakeState::Ping, command(&["PING"])),
            (
                HandshakeState::ListeningPort,
                command(&["REPLCONF", "listening-port", port.as_str()]),
            ),
            (
                HandshakeState::Capabilities,
                command(&["REPLCONF", "capa", "psync2"]),
            ),
            (HandshakeState::Psync, command(&["PSYNC", "?", "-1"])),
        ];

        let mut reply = Frame::Null;
        for (state, request) in requests {
            reply = self.exchange(&mut conn, state, request).await?;
        }

        let full_resync =
            FullResync::try_from(&reply).map_err(|_| HandshakeError::UnexpectedReply {
                state: HandshakeState::Psync,
                reply,
            })?;

        info!(
            state = %HandshakeState::Done,
            replid = %full_resync.replid,
            offset = full_resync.offset,
            "Handshake with master completed"
        );

        Ok(full_resync)
    }

    async fn exchange(
        &self,
        conn: &mut Connection,
        state: HandshakeState,
        request: Frame,
    ) -> Result<Frame, HandshakeError> {
        tokio::time::sleep(self.delay).await;

        debug!(%state, "Sending handshake request: {}", request);
        conn.write_frame(request)
            .await
            .map_err(|source| HandshakeError::Protocol { state, source })?;

        let reply = conn
            .read_frame()
            .await
            .map_err(|source| HandshakeError::Protocol { state, source })?
            .ok_or(HandshakeError::ConnectionClosed { state })?;

        debug!(%state, "Received handshake reply: {}", reply);
        match reply {
            Frame::Error(message) => Err(HandshakeError::ErrorReply { state, message }),
            reply => Ok(reply),
        }
    }
}

fn command(parts: &[&str]) -> Frame {
    Frame::Array(
        parts
            .iter()
            .map(|part| Frame::Bulk(Bytes::copy_from_slice(part.as_bytes())))
            .collect(),
    )
}
