use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::store::KeyType;
use crate::Error;

/// Returns how many of the given keys exist. A key mentioned multiple times is counted multiple
/// times.
///
/// Ref: <https://redis.io/docs/latest/commands/exists/>
#[derive(Debug, PartialEq)]
pub struct Exists {
    pub keys: Vec<String>,
}

impl Executable for Exists {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let count = self
            .keys
            .iter()
            .filter(|key| ctx.store.key_type(key) != KeyType::None)
            .count();

        Ok(Frame::Integer(count as i64))
    }
}

impl TryFrom<&mut CommandParser> for Exists {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let keys = parser.next_strings()?;

        Ok(Self { keys })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use bytes::Bytes;

    #[tokio::test]
    async fn counts_existing_keys() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("EXISTS")),
            Frame::Bulk(Bytes::from("key1")),
            Frame::Bulk(Bytes::from("key1")),
            Frame::Bulk(Bytes::from("hash")),
            Frame::Bulk(Bytes::from("missing")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(
            cmd,
            Command::Exists(Exists {
                keys: vec![
                    String::from("key1"),
                    String::from("key1"),
                    String::from("hash"),
                    String::from("missing"),
                ]
            })
        );

        let ctx = Context::new(Default::default());
        ctx.store.set(String::from("key1"), Bytes::from("1"));
        ctx.store.hset(
            String::from("hash"),
            vec![(String::from("f"), Bytes::from("v"))],
        );

        let res = cmd.exec(&ctx).unwrap();

        assert_eq!(res, Frame::Integer(3));
    }

    #[tokio::test]
    async fn single_missing_key() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("EXISTS")),
            Frame::Bulk(Bytes::from("key1")),
        ]);
        let cmd = Command::try_from(frame).unwrap();
        let ctx = Context::new(Default::default());

        assert_eq!(cmd.exec(&ctx).unwrap(), Frame::Integer(0));
    }
}
