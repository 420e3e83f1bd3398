use bytes::Bytes;
use std::fmt::Write;
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString};

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::context::Context;
use crate::frame::Frame;
use crate::replication::Role;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Section {
    Server,
    Persistence,
    Replication,
}

/// Returns information and statistics about the server. Without a section, or with `all`,
/// every section is included. An unknown section yields an empty reply.
///
/// Ref: <https://redis.io/docs/latest/commands/info/>
#[derive(Debug, PartialEq)]
pub struct Info {
    pub section: Option<String>,
}

impl Executable for Info {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let sections: Vec<Section> = match self.section.as_deref() {
            None | Some("all") | Some("default") | Some("everything") => {
                Section::iter().collect()
            }
            Some(section) => section.parse::<Section>().into_iter().collect(),
        };

        let mut info = String::new();
        for section in sections {
            if !info.is_empty() {
                info.push_str("\r\n");
            }

            match section {
                Section::Server => write_server(&mut info, ctx)?,
                Section::Persistence => write_persistence(&mut info, ctx)?,
                Section::Replication => write_replication(&mut info, ctx)?,
            }
        }

        Ok(Frame::Bulk(Bytes::from(info)))
    }
}

fn write_server(info: &mut String, ctx: &Context) -> std::fmt::Result {
    write!(info, "# Server\r\n")?;
    write!(info, "kvdis_version:{}\r\n", env!("CARGO_PKG_VERSION"))?;
    write!(info, "process_id:{}\r\n", std::process::id())?;
    write!(info, "tcp_port:{}\r\n", ctx.config.port)
}

fn write_persistence(info: &mut String, ctx: &Context) -> std::fmt::Result {
    write!(info, "# Persistence\r\n")?;
    write!(info, "aof_enabled:1\r\n")?;
    write!(info, "aof_filename:{}\r\n", ctx.config.appendfilename)?;
    write!(info, "keys:{}\r\n", ctx.store.len())
}

fn write_replication(info: &mut String, ctx: &Context) -> std::fmt::Result {
    let replication = &ctx.replication;

    write!(info, "# Replication\r\n")?;
    write!(info, "role:{}\r\n", replication.role())?;
    if let (Role::Slave, Some(master)) = (replication.role(), replication.master()) {
        write!(info, "master_host:{}\r\n", master.host)?;
        write!(info, "master_port:{}\r\n", master.port)?;
    }
    write!(info, "master_replid:{}\r\n", replication.replid())?;
    write!(info, "master_repl_offset:{}\r\n", replication.offset())
}

impl TryFrom<&mut CommandParser> for Info {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let section = match parser.next_string() {
            Ok(section) => Some(section.to_lowercase()),
            Err(CommandParserError::EndOfStream) => None,
            Err(err) => return Err(err.into()),
        };

        Ok(Self { section })
    }
}
