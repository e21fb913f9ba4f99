use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use ed25519_dalek::{SigningKey, VerifyingKey};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

pub mod shs;

pub use shs::boxstream::{BoxReader, BoxWriter, MAX_SEGMENT_SIZE};
pub use shs::client::ClientHandshake;
pub use shs::connection::SecretConnection;
pub use shs::crypto::{EphemeralKeypair, NetworkKey, SessionKeys};
pub use shs::error::ShsError;
pub use shs::server::ServerHandshake;

/// Dials `addr` and runs the client side of the handshake, authenticating
/// ourselves as `local_key` and expecting the peer to be `server_key`.
pub async fn connect(
    addr: SocketAddr,
    local_key: SigningKey,
    server_key: VerifyingKey,
    network_key: NetworkKey,
) -> Result<SecretConnection<TcpStream>, ShsError> {
    let stream = TcpStream::connect(addr).await?;
    info!("Connected to {addr}");
    let handshake = ClientHandshake::new(local_key, server_key, network_key);
    SecretConnection::client(stream, handshake).await
}

/// Accepts TCP connections on `addr` and serves each one on its own task:
/// run the server side of the handshake, then hand the established
/// connection to `on_connect`. Peers that fail the handshake are dropped.
pub async fn listen<F, Fut>(
    addr: SocketAddr,
    local_key: SigningKey,
    network_key: NetworkKey,
    on_connect: F,
) -> Result<(), ShsError>
where
    F: Fn(SecretConnection<TcpStream>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!("Listening for peers at {addr}");
    let on_connect = Arc::new(on_connect);
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let handshake = ServerHandshake::new(local_key.clone(), network_key);
        let on_connect = on_connect.clone();
        tokio::spawn(async move {
            match SecretConnection::server(stream, handshake).await {
                Ok(connection) => on_connect(connection).await,
                Err(err) => error!("Handshake with {peer_addr} failed: {err}"),
            }
        });
    }
}
