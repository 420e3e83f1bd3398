use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Returns all fields and values of the hash stored at key, flattened into a single array.
///
/// Ref: <https://redis.io/docs/latest/commands/hgetall/>
#[derive(Debug, PartialEq)]
pub struct Hgetall {
    pub key: String,
}

impl Executable for Hgetall {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let Some(fields) = ctx.store.hgetall(&self.key) else {
            return Ok(Frame::Null);
        };

        let mut res = Vec::with_capacity(fields.len() * 2);
        for (field, value) in fields {
            res.push(Frame::Bulk(Bytes::from(field)));
            res.push(Frame::Bulk(value));
        }

        Ok(Frame::Array(res))
    }
}

impl TryFrom<&mut CommandParser> for Hgetall {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;

        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;

    fn hgetall_frame(key: &str) -> Frame {
        Frame::Array(vec![
            Frame::Bulk(Bytes::from("HGETALL")),
            Frame::Bulk(Bytes::copy_from_slice(key.as_bytes())),
        ])
    }

    #[tokio::test]
    async fn flattened_fields() {
        let ctx = Context::new(Default::default());
        ctx.store.hset(
            String::from("user"),
            vec![(String::from("name"), Bytes::from("ada"))],
        );

        let cmd = Command::try_from(hgetall_frame("user")).unwrap();
        assert_eq!(
            cmd,
            Command::Hgetall(Hgetall {
                key: String::from("user")
            })
        );

        assert_eq!(
            cmd.exec(&ctx).unwrap(),
            Frame::Array(vec![
                Frame::Bulk(Bytes::from("name")),
                Frame::Bulk(Bytes::from("ada")),
            ])
        );
    }

    #[tokio::test]
    async fn missing_hash() {
        let ctx = Context::new(Default::default());

        let cmd = Command::try_from(hgetall_frame("user")).unwrap();

        assert_eq!(cmd.exec(&ctx).unwrap(), Frame::Null);
    }
}
