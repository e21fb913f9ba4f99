use bytes::Bytes;
use ed25519_dalek::VerifyingKey;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

use super::boxstream::{stream_pair, BoxStreamReader, BoxStreamWriter};
use super::client::ClientHandshake;
use super::crypto::SessionKeys;
use super::error::ShsError;
use super::server::ServerHandshake;
use super::{CHALLENGE_SIZE, CLIENT_AUTH_SIZE, SERVER_ACCEPT_SIZE};

/// An authenticated, encrypted duplex connection. Construction runs the
/// whole handshake; afterwards the handshake state is wiped and all traffic
/// moves through the box stream codec. Any error mid-handshake drops the
/// transport and retains nothing.
pub struct SecretConnection<S> {
    reader: BoxStreamReader<S>,
    writer: BoxStreamWriter<S>,
    peer_key: VerifyingKey,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SecretConnection<S> {
    /// Runs the client side: send our challenge, check theirs, send the
    /// auth, check the accept.
    pub async fn client(
        mut stream: S,
        mut handshake: ClientHandshake,
    ) -> Result<Self, ShsError> {
        stream.write_all(&handshake.generate_challenge()).await?;

        let mut challenge = [0u8; CHALLENGE_SIZE];
        read_message(&mut stream, &mut challenge).await?;
        if !handshake.verify_server_challenge(&challenge) {
            return Err(ShsError::BadNetworkKey);
        }

        let auth = handshake.generate_client_auth()?;
        stream.write_all(&auth).await?;

        let mut accept = [0u8; SERVER_ACCEPT_SIZE];
        read_message(&mut stream, &mut accept).await?;
        if !handshake.verify_server_accept(&accept) {
            return Err(ShsError::BadAccept);
        }

        let keys = handshake.session_keys()?;
        let peer_key = *handshake.remote_key();
        handshake.clean();
        info!("Handshake with server {} complete", hex::encode(peer_key));
        Ok(Self::established(stream, keys, peer_key))
    }

    /// Runs the server side: check the client's challenge, send ours, check
    /// the auth, send the accept.
    pub async fn server(
        mut stream: S,
        mut handshake: ServerHandshake,
    ) -> Result<Self, ShsError> {
        let mut challenge = [0u8; CHALLENGE_SIZE];
        read_message(&mut stream, &mut challenge).await?;
        if !handshake.verify_client_challenge(&challenge) {
            return Err(ShsError::BadNetworkKey);
        }

        stream.write_all(&handshake.generate_challenge()).await?;

        let mut auth = [0u8; CLIENT_AUTH_SIZE];
        read_message(&mut stream, &mut auth).await?;
        if !handshake.verify_client_auth(&auth) {
            return Err(ShsError::BadAuth);
        }

        let accept = handshake.generate_accept()?;
        stream.write_all(&accept).await?;

        let keys = handshake.session_keys()?;
        let peer_key = *handshake
            .remote_key()
            .ok_or(ShsError::Usage("established without a peer identity"))?;
        handshake.clean();
        info!("Handshake with client {} complete", hex::encode(peer_key));
        Ok(Self::established(stream, keys, peer_key))
    }

    fn established(stream: S, keys: SessionKeys, peer_key: VerifyingKey) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let (reader, writer) = stream_pair(read_half, write_half, keys);
        Self {
            reader,
            writer,
            peer_key,
        }
    }

    /// Next plaintext frame from the peer, or `Ok(None)` once the peer
    /// closed its side cleanly.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, ShsError> {
        self.reader.recv().await
    }

    /// Seals and sends `data`, chunked into frames as needed.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ShsError> {
        self.writer.send(data).await
    }

    /// Sends the termination frame for our direction. The peer may still
    /// send until it closes its own side.
    pub async fn close(&mut self) -> Result<(), ShsError> {
        self.writer.close().await
    }

    /// The peer's authenticated long-term identity.
    pub fn peer_key(&self) -> &VerifyingKey {
        &self.peer_key
    }

    /// Splits the connection into halves that can be driven from separate
    /// tasks.
    pub fn into_split(self) -> (BoxStreamReader<S>, BoxStreamWriter<S>) {
        (self.reader, self.writer)
    }
}

/// Exact-length read of one handshake message; EOF partway through is the
/// protocol's short-read failure.
async fn read_message<S: AsyncRead + Unpin>(
    stream: &mut S,
    buffer: &mut [u8],
) -> Result<(), ShsError> {
    stream
        .read_exact(buffer)
        .await
        .map_err(ShsError::from_read_error)?;
    Ok(())
}
