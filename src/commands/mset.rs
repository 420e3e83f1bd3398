use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Sets the given keys to their respective values. Replaces existing values with new values and
/// replies with how many of the keys were created.
///
/// Ref: <https://redis.io/docs/latest/commands/mset/>
#[derive(Debug, PartialEq)]
pub struct Mset {
    pub pairs: Vec<(String, Bytes)>,
}

impl Executable for Mset {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let created = ctx.store.set_many(self.pairs);

        Ok(Frame::Integer(created as i64))
    }
}

impl TryFrom<&mut CommandParser> for Mset {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pairs = parser.next_pairs()?;

        Ok(Self { pairs })
    }
}
