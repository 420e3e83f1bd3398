use tracing::debug;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Configuration a replica announces to its master during the handshake, such as
/// `listening-port <port>` or `capa psync2`. Logged and acknowledged.
#[derive(Debug, PartialEq)]
pub struct Replconf {
    pub args: Vec<String>,
}

impl Executable for Replconf {
    fn exec(self, _ctx: &Context) -> Result<Frame, Error> {
        for option in self.args.chunks(2) {
            debug!("Replica announced {}", option.join(" "));
        }

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Replconf {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let mut args = Vec::with_capacity(parser.remaining());
        while parser.remaining() > 0 {
            args.push(parser.next_string()?);
        }

        Ok(Self { args })
    }
}
