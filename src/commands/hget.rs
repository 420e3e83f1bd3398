use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Returns the value associated with field in the hash stored at key.
///
/// Ref: <https://redis.io/docs/latest/commands/hget/>
#[derive(Debug, PartialEq)]
pub struct Hget {
    pub key: String,
    pub field: String,
}

impl Executable for Hget {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let res = ctx
            .store
            .hget(&self.key, &self.field)
            .map_or(Frame::Null, Frame::Bulk);

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Hget {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let field = parser.next_string()?;

        Ok(Self { key, field })
    }
}
