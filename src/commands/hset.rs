use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Sets the specified fields to their respective values in the hash stored at key, creating the
/// hash if needed. Replies with the number of fields that were added.
///
/// Ref: <https://redis.io/docs/latest/commands/hset/>
#[derive(Debug, PartialEq)]
pub struct Hset {
    pub key: String,
    pub fields: Vec<(String, Bytes)>,
}

impl Executable for Hset {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let created = ctx.store.hset(self.key, self.fields);

        Ok(Frame::Integer(created as i64))
    }
}

impl TryFrom<&mut CommandParser> for Hset {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let fields = parser.next_pairs()?;

        Ok(Self { key, fields })
    }
}
