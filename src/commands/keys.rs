use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{error_reply, CommandParser};
use crate::context::Context;
use crate::frame::Frame;
use crate::utils::glob;
use crate::Error;

// https://redis.io/commands/keys
#[derive(Debug, PartialEq)]
pub struct Keys {
    pub pattern: String,
}

impl Executable for Keys {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let matcher = match glob::compile(&self.pattern) {
            Ok(matcher) => matcher,
            Err(err) => return Ok(error_reply(format!("invalid pattern: {}", err))),
        };

        let keys = ctx
            .store
            .keys_matching(|key| matcher.is_match(key))
            .into_iter()
            .map(|key| Frame::Bulk(Bytes::from(key)))
            .collect();

        Ok(Frame::Array(keys))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pattern = parser.next_string()?;
        Ok(Self { pattern })
    }
}
