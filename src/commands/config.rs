use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{error_reply, CommandParser, CommandParserError};
use crate::context::Context;
use crate::frame::Frame;
use crate::utils::glob;
use crate::Error;

/// `CONFIG GET parameter [parameter ...]`, parameters may be glob patterns. Only `GET` is
/// supported and the parameters are read only.
///
/// Ref: <https://redis.io/docs/latest/commands/config-get/>
#[derive(Debug, PartialEq)]
pub struct Config {
    pub patterns: Vec<String>,
}

impl Executable for Config {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let mut matchers = Vec::with_capacity(self.patterns.len());
        for pattern in &self.patterns {
            match glob::compile(&pattern.to_lowercase()) {
                Ok(matcher) => matchers.push(matcher),
                Err(err) => return Ok(error_reply(format!("invalid pattern: {}", err))),
            }
        }

        let config = &ctx.config;
        let parameters = [
            ("dir", config.dir.display().to_string()),
            ("dbfilename", config.dbfilename.clone()),
            ("appendfilename", config.appendfilename.clone()),
            ("appendonly", "yes".to_string()),
            ("port", config.port.to_string()),
        ];

        let mut res = vec![];
        for (name, value) in parameters {
            if matchers.iter().any(|matcher| matcher.is_match(name)) {
                res.push(Frame::Bulk(Bytes::from(name)));
                res.push(Frame::Bulk(Bytes::from(value)));
            }
        }

        Ok(Frame::Array(res))
    }
}

impl TryFrom<&mut CommandParser> for Config {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let subcommand = parser.next_string()?.to_lowercase();
        if subcommand != "get" {
            return Err(CommandParserError::UnknownSubcommand {
                command: "config".to_string(),
                subcommand,
            }
            .into());
        }

        let patterns = parser.next_strings()?;

        Ok(Self { patterns })
    }
}
