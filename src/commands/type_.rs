use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Returns the string representation of the type of the value stored at `key`.
///
/// The types this server stores are `string`, `hash` and `stream`. If the key does not exist,
/// `none` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/type/>
#[derive(Debug, PartialEq)]
pub struct Type {
    pub key: String,
}

impl Executable for Type {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let type_ = ctx.store.key_type(&self.key);

        Ok(Frame::Simple(type_.to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Type {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::commands::Command;
    use crate::stream::IdRequest;

    fn type_frame(key: &str) -> Frame {
        Frame::Array(vec![
            Frame::Bulk(Bytes::from("TYPE")),
            Frame::Bulk(Bytes::copy_from_slice(key.as_bytes())),
        ])
    }

    #[tokio::test]
    async fn existing_key() {
        let ctx = Context::new(Default::default());

        let cmd = Command::try_from(type_frame("key1")).unwrap();

        assert_eq!(
            cmd,
            Command::Type(Type {
                key: String::from("key1"),
            })
        );

        ctx.store.set(String::from("key1"), Bytes::from("1"));

        let result = cmd.exec(&ctx).unwrap();

        assert_eq!(result, Frame::Simple("string".to_string()));
    }

    #[tokio::test]
    async fn hashes_and_streams() {
        let ctx = Context::new(Default::default());
        ctx.store.hset(
            String::from("hash"),
            vec![(String::from("f"), Bytes::from("v"))],
        );
        ctx.store
            .xadd(String::from("stream"), IdRequest::Auto, vec![])
            .unwrap();

        let result = Command::try_from(type_frame("hash"))
            .unwrap()
            .exec(&ctx)
            .unwrap();
        assert_eq!(result, Frame::Simple("hash".to_string()));

        let result = Command::try_from(type_frame("stream"))
            .unwrap()
            .exec(&ctx)
            .unwrap();
        assert_eq!(result, Frame::Simple("stream".to_string()));
    }

    #[tokio::test]
    async fn missing_key() {
        let ctx = Context::new(Default::default());

        let cmd = Command::try_from(type_frame("key1")).unwrap();
        let result = cmd.exec(&ctx).unwrap();

        assert_eq!(result, Frame::Simple("none".to_string()));
    }
}
