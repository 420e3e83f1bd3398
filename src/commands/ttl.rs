use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// TTL returns the remaining time to live of a key that has a timeout, in seconds rounded to the
/// closest second. Replies with null when the key does not exist or has no timeout.
///
/// Ref: <https://redis.io/docs/latest/commands/ttl>
#[derive(Debug, PartialEq)]
pub struct Ttl {
    pub key: String,
}

impl Executable for Ttl {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let res = ctx
            .store
            .ttl(&self.key)
            .map(|ttl| Frame::Integer(((ttl.as_millis() + 500) / 1000) as i64))
            .unwrap_or(Frame::Null);

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Ttl {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        Ok(Self { key })
    }
}
