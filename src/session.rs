use tracing::{error, warn};

use crate::aof::Aof;
use crate::commands::executable::Executable;
use crate::commands::{error_reply, Command};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Per connection command handling. Owns the connection's transaction queue and writes every
/// write command to the append-only file before executing it.
pub struct Session {
    ctx: Context,
    aof: Option<Aof>,
    // `Some` between MULTI and EXEC/DISCARD.
    queue: Option<Vec<Queued>>,
}

struct Queued {
    command: Command,
    frame: Frame,
}

impl Session {
    pub fn new(ctx: Context, aof: Option<Aof>) -> Session {
        Session {
            ctx,
            aof,
            queue: None,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.queue.is_some()
    }

    /// Handles one frame received from the client and returns the reply to send back. Frames
    /// that are not a non-empty array are not commands, they are skipped without a reply.
    pub async fn handle(&mut self, frame: Frame) -> Option<Frame> {
        if !matches!(&frame, Frame::Array(parts) if !parts.is_empty()) {
            warn!("Skipping frame that is not a command: {}", frame);
            return None;
        }

        let command = match Command::try_from(frame.clone()) {
            Ok(command) => command,
            Err(err) => return Some(error_reply(err)),
        };

        Some(self.dispatch(command, frame).await)
    }

    async fn dispatch(&mut self, command: Command, frame: Frame) -> Frame {
        match command {
            Command::Multi(cmd) => {
                self.queue.get_or_insert_with(Vec::new);
                reply(cmd.exec(&self.ctx))
            }
            Command::Exec(cmd) => match self.queue.take() {
                None => reply(cmd.exec(&self.ctx)),
                Some(queue) if queue.is_empty() => error_reply("EXEC with empty transaction"),
                Some(queue) => {
                    let mut replies = Vec::with_capacity(queue.len());
                    for Queued { command, frame } in queue {
                        replies.push(self.execute(command, frame).await);
                    }
                    Frame::Array(replies)
                }
            },
            Command::Discard(cmd) => match self.queue.take() {
                None => reply(cmd.exec(&self.ctx)),
                Some(_) => Frame::Simple("OK".to_string()),
            },
            command => {
                if let Some(queue) = self.queue.as_mut() {
                    queue.push(Queued { command, frame });
                    return Frame::Simple("QUEUED".to_string());
                }

                self.execute(command, frame).await
            }
        }
    }

    async fn execute(&self, mut command: Command, frame: Frame) -> Frame {
        let aof = match &self.aof {
            Some(aof) if command.is_write() => aof,
            _ => return reply(command.exec(&self.ctx)),
        };

        // The writer is held until the command ran, so writes apply in the order they are logged.
        let mut writer = aof.writer().await;
        let logged = command.resolve(&self.ctx).unwrap_or(frame);

        match writer.append(&logged).await {
            Ok(written) => {
                self.ctx.replication.advance(written as u64);
            }
            Err(e) => {
                error!("Failed to append to {:?}: {}", aof.path(), e);
                return error_reply(format!("failed to persist write: {}", e));
            }
        }

        reply(command.exec(&self.ctx))
    }
}

fn reply(result: Result<Frame, Error>) -> Frame {
    result.unwrap_or_else(error_reply)
}
