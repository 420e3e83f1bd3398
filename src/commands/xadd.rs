use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{error_reply, CommandParser};
use crate::context::Context;
use crate::frame::Frame;
use crate::stream::{Fields, IdRequest};
use crate::Error;

/// Appends an entry to the stream stored at key, creating the stream if needed. The id is either
/// explicit (`<ms>-<seq>`), partially generated (`<ms>-*`) or fully generated (`*`), and must be
/// greater than the id of the last entry of the stream.
///
/// Ref: <https://redis.io/docs/latest/commands/xadd/>
#[derive(Debug, PartialEq)]
pub struct Xadd {
    pub key: String,
    pub id: IdRequest,
    pub fields: Fields,
}

impl Xadd {
    /// Fixes a generated id before the command is written to the append-only file and returns
    /// the command with the explicit id, so replaying the file recreates the same entry. Must
    /// run while no other write can reach the stream.
    pub fn resolve(&mut self, ctx: &Context) -> Option<Frame> {
        if let IdRequest::Explicit(_) = self.id {
            return None;
        }

        let id = ctx.store.next_stream_id(&self.key, self.id).ok()?;
        self.id = IdRequest::Explicit(id);

        let mut parts = vec![
            Frame::Bulk(Bytes::from("XADD")),
            Frame::Bulk(Bytes::from(self.key.clone())),
            Frame::Bulk(Bytes::from(id.to_string())),
        ];
        for (field, value) in &self.fields {
            parts.push(Frame::Bulk(field.clone()));
            parts.push(Frame::Bulk(value.clone()));
        }

        Some(Frame::Array(parts))
    }
}

impl Executable for Xadd {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        match ctx.store.xadd(self.key, self.id, self.fields) {
            Ok(id) => Ok(Frame::Bulk(Bytes::from(id.to_string()))),
            Err(err) => Ok(error_reply(err)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Xadd {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let id = parser.next_string()?.parse::<IdRequest>()?;
        let fields = parser
            .next_pairs()?
            .into_iter()
            .map(|(field, value)| (Bytes::from(field), value))
            .collect();

        Ok(Self { key, id, fields })
    }
}
