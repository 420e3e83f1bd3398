pub mod config;
pub mod decr;
pub mod del;
pub mod discard;
pub mod echo;
pub mod exec;
pub mod executable;
pub mod exists;
pub mod get;
pub mod hget;
pub mod hgetall;
pub mod hset;
pub mod incr;
pub mod info;
pub mod keys;
pub mod mget;
pub mod mset;
pub mod multi;
pub mod ping;
pub mod psync;
pub mod replconf;
pub mod set;
pub mod ttl;
pub mod type_;
pub mod xadd;

use bytes::Bytes;
use std::fmt;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

use config::Config;
use decr::Decr;
use del::Del;
use discard::Discard;
use echo::Echo;
use exec::Exec;
use exists::Exists;
use get::Get;
use hget::Hget;
use hgetall::Hgetall;
use hset::Hset;
use incr::Incr;
use info::Info;
use keys::Keys;
use mget::Mget;
use mset::Mset;
use multi::Multi;
use ping::Ping;
use psync::Psync;
use replconf::Replconf;
use set::Set;
use ttl::Ttl;
use type_::Type;
use xadd::Xadd;

#[derive(Debug, PartialEq)]
pub enum Command {
    Decr(Decr),
    Del(Del),
    Exists(Exists),
    Get(Get),
    Hget(Hget),
    Hgetall(Hgetall),
    Hset(Hset),
    Incr(Incr),
    Keys(Keys),
    Mget(Mget),
    Mset(Mset),
    Set(Set),
    Ttl(Ttl),
    Type(Type),
    Xadd(Xadd),

    Discard(Discard),
    Exec(Exec),
    Multi(Multi),

    Config(Config),
    Echo(Echo),
    Info(Info),
    Ping(Ping),
    Psync(Psync),
    Replconf(Replconf),
}

impl Command {
    /// Whether the command modifies the store, and so has to be written to the append-only file.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set(_)
                | Command::Hset(_)
                | Command::Del(_)
                | Command::Mset(_)
                | Command::Incr(_)
                | Command::Decr(_)
                | Command::Xadd(_)
        )
    }

    /// The frame written to the append-only file in place of the one received, for writes that
    /// depend on when they run. Generated stream ids and relative expirations are fixed here so
    /// replaying the file rebuilds the same data. `None` keeps the received frame.
    pub fn resolve(&mut self, ctx: &Context) -> Option<Frame> {
        match self {
            Command::Set(cmd) => cmd.resolve(),
            Command::Xadd(cmd) => cmd.resolve(ctx),
            _ => None,
        }
    }
}

impl Executable for Command {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        match self {
            Command::Config(cmd) => cmd.exec(ctx),
            Command::Decr(cmd) => cmd.exec(ctx),
            Command::Del(cmd) => cmd.exec(ctx),
            Command::Discard(cmd) => cmd.exec(ctx),
            Command::Echo(cmd) => cmd.exec(ctx),
            Command::Exec(cmd) => cmd.exec(ctx),
            Command::Exists(cmd) => cmd.exec(ctx),
            Command::Get(cmd) => cmd.exec(ctx),
            Command::Hget(cmd) => cmd.exec(ctx),
            Command::Hgetall(cmd) => cmd.exec(ctx),
            Command::Hset(cmd) => cmd.exec(ctx),
            Command::Incr(cmd) => cmd.exec(ctx),
            Command::Info(cmd) => cmd.exec(ctx),
            Command::Keys(cmd) => cmd.exec(ctx),
            Command::Mget(cmd) => cmd.exec(ctx),
            Command::Mset(cmd) => cmd.exec(ctx),
            Command::Multi(cmd) => cmd.exec(ctx),
            Command::Ping(cmd) => cmd.exec(ctx),
            Command::Psync(cmd) => cmd.exec(ctx),
            Command::Replconf(cmd) => cmd.exec(ctx),
            Command::Set(cmd) => cmd.exec(ctx),
            Command::Ttl(cmd) => cmd.exec(ctx),
            Command::Type(cmd) => cmd.exec(ctx),
            Command::Xadd(cmd) => cmd.exec(ctx),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the Redis server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                }
                .into())
            }
        };

        let parser = &mut CommandParser {
            parts: frames.into_iter(),
        };

        let command_name = parser.parse_command_name()?;

        let command = match &command_name[..] {
            "config" => Config::try_from(&mut *parser).map(Command::Config),
            "decr" => Decr::try_from(&mut *parser).map(Command::Decr),
            "del" => Del::try_from(&mut *parser).map(Command::Del),
            "discard" => Discard::try_from(&mut *parser).map(Command::Discard),
            "echo" => Echo::try_from(&mut *parser).map(Command::Echo),
            "exec" => Exec::try_from(&mut *parser).map(Command::Exec),
            "exists" => Exists::try_from(&mut *parser).map(Command::Exists),
            "get" => Get::try_from(&mut *parser).map(Command::Get),
            "hget" => Hget::try_from(&mut *parser).map(Command::Hget),
            "hgetall" => Hgetall::try_from(&mut *parser).map(Command::Hgetall),
            "hset" => Hset::try_from(&mut *parser).map(Command::Hset),
            "incr" => Incr::try_from(&mut *parser).map(Command::Incr),
            "info" => Info::try_from(&mut *parser).map(Command::Info),
            "keys" => Keys::try_from(&mut *parser).map(Command::Keys),
            "mget" => Mget::try_from(&mut *parser).map(Command::Mget),
            "mset" => Mset::try_from(&mut *parser).map(Command::Mset),
            "multi" => Multi::try_from(&mut *parser).map(Command::Multi),
            "ping" => Ping::try_from(&mut *parser).map(Command::Ping),
            "psync" => Psync::try_from(&mut *parser).map(Command::Psync),
            "replconf" => Replconf::try_from(&mut *parser).map(Command::Replconf),
            "set" => Set::try_from(&mut *parser).map(Command::Set),
            "ttl" => Ttl::try_from(&mut *parser).map(Command::Ttl),
            "type" => Type::try_from(&mut *parser).map(Command::Type),
            "xadd" => Xadd::try_from(&mut *parser).map(Command::Xadd),
            _ => {
                return Err(CommandParserError::UnknownCommand {
                    command: command_name,
                }
                .into())
            }
        };

        // Running out of arguments, or having some left over, means the arity is wrong.
        let command = command.map_err(|err| match err.downcast_ref::<CommandParserError>() {
            Some(CommandParserError::EndOfStream) => wrong_arity(&command_name),
            _ => err,
        })?;

        if parser.remaining() > 0 {
            return Err(wrong_arity(&command_name));
        }

        Ok(command)
    }
}

fn wrong_arity(command: &str) -> Error {
    CommandParserError::WrongNumberOfArguments {
        command: command.to_string(),
    }
    .into()
}

/// Builds the error reply sent back to clients.
pub fn error_reply(message: impl fmt::Display) -> Frame {
    Frame::Error(format!("ERR {}", message))
}

pub struct CommandParser {
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<String, CommandParserError> {
        let command_name = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        match command_name {
            Frame::Simple(s) => Ok(s.to_lowercase()),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_lowercase())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// Number of arguments not consumed yet.
    pub fn remaining(&self) -> usize {
        self.parts.len()
    }

    pub fn next_string(&mut self) -> Result<String, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        match frame {
            // Both `Simple` and `Bulk` representation may be strings. Strings are parsed to UTF-8.
            // While errors are stored as strings, they are considered separate types.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    pub fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        match frame {
            Frame::Integer(i) => Ok(i),
            Frame::Simple(string) => string
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotAnInteger),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map_err(CommandParserError::InvalidUTF8String)?
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotAnInteger),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame,
            }),
        }
    }

    pub fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or_else(|| CommandParserError::EndOfStream)?;

        match frame {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// Consumes every remaining argument as `name value` pairs. At least one pair is required.
    pub fn next_pairs(&mut self) -> Result<Vec<(String, Bytes)>, CommandParserError> {
        if self.remaining() == 0 || self.remaining() % 2 != 0 {
            return Err(CommandParserError::EndOfStream);
        }

        let mut pairs = Vec::with_capacity(self.remaining() / 2);
        while self.remaining() > 0 {
            pairs.push((self.next_string()?, self.next_bytes()?));
        }

        Ok(pairs)
    }

    /// Consumes every remaining argument as a string. At least one is required.
    pub fn next_strings(&mut self) -> Result<Vec<String>, CommandParserError> {
        let mut strings = vec![];

        loop {
            match self.next_string() {
                Ok(string) => strings.push(string),
                Err(CommandParserError::EndOfStream) if !strings.is_empty() => break,
                Err(err) => return Err(err),
            }
        }

        Ok(strings)
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("unknown subcommand '{subcommand}' for '{command}'")]
    UnknownSubcommand { command: String, subcommand: String },
    #[error("wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: String },
    #[error("invalid argument '{argument}' for '{command}' command")]
    InvalidCommandArgument { command: String, argument: String },
    #[error("invalid expire time in '{command}' command")]
    InvalidExpireTime { command: String },
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("syntax error")]
    Syntax,
    #[error("invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(frame: Frame) -> CommandParserError {
        let err = Command::try_from(frame).err().unwrap();
        err.downcast::<CommandParserError>().map(|err| *err).unwrap()
    }

    #[test]
    fn parse_get_command_with_simple_string() {
        let get_frame = Frame::Array(vec![
            Frame::Simple(String::from("GET")),
            Frame::Simple(String::from("foo")),
        ]);

        let get_command = Command::try_from(get_frame).unwrap();

        assert_eq!(
            get_command,
            Command::Get(Get {
                key: String::from("foo")
            })
        );
    }

    #[test]
    fn parse_get_command_with_bulk_string() {
        let get_frame = Frame::Array(vec![
            Frame::Simple(String::from("GET")),
            Frame::Bulk(Bytes::from("foo-from-bytes")),
        ]);

        let get_command = Command::try_from(get_frame).unwrap();

        assert_eq!(
            get_command,
            Command::Get(Get {
                key: String::from("foo-from-bytes")
            })
        );
    }

    #[test]
    fn command_names_are_case_insensitive() {
        for name in ["get", "GET", "gEt"] {
            let frame = Frame::Array(vec![
                Frame::Bulk(Bytes::from(name)),
                Frame::Bulk(Bytes::from("foo")),
            ]);

            assert_eq!(
                Command::try_from(frame).unwrap(),
                Command::Get(Get {
                    key: String::from("foo")
                })
            );
        }
    }

    #[test]
    fn unknown_command() {
        let frame = Frame::Array(vec![Frame::Bulk(Bytes::from("FLY"))]);

        assert_eq!(
            parse_error(frame),
            CommandParserError::UnknownCommand {
                command: "fly".to_string()
            }
        );
    }

    #[test]
    fn missing_arguments() {
        let frame = Frame::Array(vec![Frame::Bulk(Bytes::from("GET"))]);

        assert_eq!(
            parse_error(frame),
            CommandParserError::WrongNumberOfArguments {
                command: "get".to_string()
            }
        );
    }

    #[test]
    fn extra_arguments() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("GET")),
            Frame::Bulk(Bytes::from("foo")),
            Frame::Bulk(Bytes::from("bar")),
        ]);

        let err = parse_error(frame);
        assert_eq!(
            err,
            CommandParserError::WrongNumberOfArguments {
                command: "get".to_string()
            }
        );
        assert_eq!(
            error_reply(err),
            Frame::Error("ERR wrong number of arguments for 'get' command".to_string())
        );
    }

    #[test]
    fn not_an_array() {
        let frame = Frame::Simple("GET".to_string());

        assert_eq!(
            parse_error(frame),
            CommandParserError::InvalidFrame {
                expected: "array".to_string(),
                actual: Frame::Simple("GET".to_string()),
            }
        );
    }

    #[test]
    fn write_commands() {
        let parse = |parts: &[&str]| {
            let frame = Frame::Array(
                parts
                    .iter()
                    .map(|part| Frame::Bulk(Bytes::copy_from_slice(part.as_bytes())))
                    .collect(),
            );
            Command::try_from(frame).unwrap()
        };

        assert!(parse(&["SET", "k", "v"]).is_write());
        assert!(parse(&["MSET", "k", "v"]).is_write());
        assert!(parse(&["DEL", "k"]).is_write());
        assert!(parse(&["INCR", "k"]).is_write());
        assert!(parse(&["DECR", "k"]).is_write());
        assert!(parse(&["HSET", "h", "f", "v"]).is_write());
        assert!(parse(&["XADD", "s", "*", "f", "v"]).is_write());

        assert!(!parse(&["GET", "k"]).is_write());
        assert!(!parse(&["MULTI"]).is_write());
        assert!(!parse(&["PING"]).is_write());
        assert!(!parse(&["KEYS", "*"]).is_write());
    }

    #[test]
    fn pairs_must_be_complete() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("MSET")),
            Frame::Bulk(Bytes::from("a")),
            Frame::Bulk(Bytes::from("1")),
            Frame::Bulk(Bytes::from("b")),
        ]);

        assert_eq!(
            parse_error(frame),
            CommandParserError::WrongNumberOfArguments {
                command: "mset".to_string()
            }
        );
    }
}
