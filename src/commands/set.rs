use bytes::Bytes;
use std::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::context::Context;
use crate::frame::Frame;
use crate::utils::unix_millis;
use crate::Error;

/// Set key to hold the string value, optionally expiring after the given time or at the given
/// Unix time.
///
/// `SET key value [PX milliseconds | EX seconds | PXAT unix-time-milliseconds | EXAT
/// unix-time-seconds]`
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: String,
    pub value: Bytes,
    pub expiry: Option<Expiry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// `PX` or `EX`, counted from when the command runs.
    After(Duration),
    /// `PXAT` or `EXAT`, in milliseconds since the Unix epoch.
    At(u64),
}

impl Set {
    /// The command as written to the append-only file. A relative expiration is pinned to the
    /// wall clock, so replaying the file later expires the key when the original did.
    pub fn resolve(&self) -> Option<Frame> {
        let Some(Expiry::After(ttl)) = self.expiry else {
            return None;
        };
        let at = u64::try_from(ttl.as_millis())
            .ok()
            .and_then(|ttl| unix_millis().checked_add(ttl))?;

        Some(Frame::Array(vec![
            Frame::Bulk(Bytes::from("SET")),
            Frame::Bulk(Bytes::from(self.key.clone())),
            Frame::Bulk(self.value.clone()),
            Frame::Bulk(Bytes::from("PXAT")),
            Frame::Bulk(Bytes::from(at.to_string())),
        ]))
    }
}

impl Executable for Set {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        match self.expiry {
            Some(Expiry::After(ttl)) => ctx.store.set_with_ttl(self.key, self.value, ttl),
            // A time already past stores the key expired, which removes it.
            Some(Expiry::At(at)) => {
                let ttl = Duration::from_millis(at.saturating_sub(unix_millis()));
                ctx.store.set_with_ttl(self.key, self.value, ttl)
            }
            None => ctx.store.set(self.key, self.value),
        }

        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        let mut expiry = None;
        while parser.remaining() > 0 {
            let option = parser.next_string()?.to_uppercase();
            let to_expiry: fn(u64) -> Option<Expiry> = match &option[..] {
                "PX" => |ms: u64| Some(Expiry::After(Duration::from_millis(ms))),
                "EX" => |secs: u64| Some(Expiry::After(Duration::from_secs(secs))),
                "PXAT" => |ms: u64| Some(Expiry::At(ms)),
                "EXAT" => |secs: u64| secs.checked_mul(1000).map(Expiry::At),
                _ => return Err(CommandParserError::Syntax.into()),
            };

            if expiry.is_some() {
                return Err(CommandParserError::Syntax.into());
            }

            let amount = match parser.next_integer() {
                Ok(amount) => amount,
                Err(CommandParserError::EndOfStream) => {
                    return Err(CommandParserError::Syntax.into())
                }
                Err(err) => return Err(err.into()),
            };

            let invalid = || CommandParserError::InvalidExpireTime {
                command: "set".to_string(),
            };
            if amount <= 0 {
                return Err(invalid().into());
            }

            expiry = Some(to_expiry(amount as u64).ok_or_else(invalid)?);
        }

        Ok(Self { key, value, expiry })
    }
}
