use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use crate::aof::Aof;
use crate::codec::FrameCodec;
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::context::Context;
use crate::frame::Frame;
use crate::replication::Handshake;
use crate::session::Session;
use crate::Error;

/// Installs the global tracing subscriber, binds the listening socket and serves clients.
pub async fn run(config: Config) -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;

    serve(listener, config).await
}

/// Serves clients accepted on `listener`. Opens and replays the append-only file first, and
/// starts the handshake with the master when running as a replica.
pub async fn serve(listener: TcpListener, config: Config) -> Result<(), Error> {
    let ctx = Context::new(config);

    let aof = Aof::open(ctx.config.aof_path(), ctx.config.appendfsync_interval()).await?;
    let replayed = aof.replay(|frame| apply_logged(&ctx, frame)).await?;
    info!("Replayed {} commands from {:?}", replayed, aof.path());

    let local_address = listener.local_addr()?;

    if let Some(master) = ctx.replication.master().cloned() {
        let handshake = Handshake::new(master, local_address.port(), ctx.config.handshake_delay());

        tokio::spawn(async move {
            if let Err(e) = handshake.run().await {
                error!("Replication handshake failed: {}", e);
            }
        });
    }

    info!(
        role = %ctx.replication.role(),
        "Redis server listening on {}", local_address
    );

    loop {
        let (socket, client_address) = listener.accept().await?;
        let ctx = ctx.clone();
        let aof = aof.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, ctx, aof).await {
                error!("Connection failed: {}", e);
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, ctx, aof),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    ctx: Context,
    aof: Aof,
) -> Result<(), Error> {
    let codec = FrameCodec::with_max_frame_size(ctx.config.max_frame_size);
    let mut conn = Connection::with_codec(stream, codec);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    let mut session = Session::new(ctx, Some(aof));

    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {}", frame);

        if let Some(res) = session.handle(frame).await {
            debug!("Sending response to client: {}", res);
            conn.write_frame(res).await?;
        }
    }

    info!("Connection closed");
    Ok(())
}

// Logged commands are applied directly, they must not be logged again.
fn apply_logged(ctx: &Context, frame: Frame) {
    let command = match Command::try_from(frame) {
        Ok(command) => command,
        Err(e) => {
            warn!("Skipping logged command that does not parse: {}", e);
            return;
        }
    };

    match command.exec(ctx) {
        Ok(Frame::Error(e)) => debug!("Logged command replied with an error: {}", e),
        Ok(_) => {}
        Err(e) => warn!("Failed to apply logged command: {}", e),
    }
}
