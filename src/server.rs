use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use tokio::net::TcpListener;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::connection;
use crate::Error;

/// Binds the configured address and serves connections until Ctrl-C.
pub async fn run(config: Config) -> Result<(), Error> {
    let listener = TcpListener::bind((config.host, config.port)).await?;

    serve(listener, config).await
}

/// Accepts connections on an already bound listener. Each connection is served on its own
/// detached OS thread with the codec working directly on the socket. Those threads do not hold up
/// process exit after Ctrl-C.
pub async fn serve(listener: TcpListener, config: Config) -> Result<(), Error> {
    let config = Arc::new(config);

    info!("Redis server listening on {}", listener.local_addr()?);

    loop {
        let (socket, client_address) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        };
        info!("Accepted connection from {:?}", client_address);

        let stream = socket.into_std()?;
        stream.set_nonblocking(false)?;

        let config = config.clone();
        let spawned = thread::Builder::new()
            .name(format!("connection-{}", client_address))
            .spawn(move || {
                if let Err(e) = handle_connection(stream, client_address, &config) {
                    error!("Connection from {} failed: {}", client_address, e);
                }
            });

        if let Err(e) = spawned {
            error!("Failed to spawn a thread for {}: {}", client_address, e);
        }
    }
}

#[instrument(
    name = "connection",
    skip(stream, config),
    fields(connection_id, client_address)
)]
fn handle_connection(
    stream: std::net::TcpStream,
    client_address: SocketAddr,
    config: &Config,
) -> Result<(), Error> {
    let mut conn = connection::tcp_connection(stream, config)?;

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    conn.serve()?;

    Ok(())
}
