use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tracing::trace;
use zeroize::Zeroize;

use super::crypto::{self, SessionKeys, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};
use super::error::ShsError;
use super::utils::{inc_nonce, split_chunks};

/// Largest plaintext body a single frame may carry.
pub const MAX_SEGMENT_SIZE: usize = 4096;
/// On-wire size of a sealed frame header: a 16-byte tag over the 18-byte
/// header (2-byte body length plus the body's own tag).
pub const HEADER_SIZE: usize = TAG_SIZE + 18;

const TERMINATION_HEADER: [u8; 18] = [0u8; 18];

/// Builds the two directed codec halves from a handshake outcome, consuming
/// the keys.
pub fn stream_pair<R, W>(reader: R, writer: W, keys: SessionKeys) -> (BoxReader<R>, BoxWriter<W>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    (
        BoxReader::new(reader, keys.decrypt_key, keys.decrypt_nonce),
        BoxWriter::new(writer, keys.encrypt_key, keys.encrypt_nonce),
    )
}

/// Outbound half: seals plaintext into encrypted frames of at most
/// [`MAX_SEGMENT_SIZE`] bytes each. The nonce advances twice per frame, once
/// for the header box and once for the body box.
pub struct BoxWriter<W> {
    writer: W,
    key: [u8; SECRET_SIZE],
    nonce: [u8; NONCE_SIZE],
    closed: bool,
}

impl<W: AsyncWrite + Unpin> BoxWriter<W> {
    pub fn new(writer: W, key: [u8; SECRET_SIZE], nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            writer,
            key,
            nonce,
            closed: false,
        }
    }

    /// Seals `data` into as many frames as it needs and writes them out.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ShsError> {
        if self.closed {
            return Err(ShsError::Usage("write after the stream was closed"));
        }
        for chunk in split_chunks(data, MAX_SEGMENT_SIZE) {
            let body_nonce = inc_nonce(&self.nonce);

            let mut body = chunk.to_vec();
            let tag = crypto::seal_detached(&self.key, &body_nonce, &mut body);

            let mut header = [0u8; 18];
            header[..2].copy_from_slice(&(chunk.len() as u16).to_be_bytes());
            header[2..].copy_from_slice(&tag);
            let sealed_header = crypto::seal(&self.key, &self.nonce, &header);

            self.writer.write_all(&sealed_header).await?;
            self.writer.write_all(&body).await?;
            trace!("sent frame of {} bytes", chunk.len());

            self.nonce = inc_nonce(&body_nonce);
        }
        self.writer.flush().await?;
        Ok(())
    }

    /// Writes the termination frame (a sealed all-zero header, no body).
    /// The writer is unusable afterwards.
    pub async fn close(&mut self) -> Result<(), ShsError> {
        if self.closed {
            return Err(ShsError::Usage("stream closed twice"));
        }
        let goodbye = crypto::seal(&self.key, &self.nonce, &TERMINATION_HEADER);
        self.writer.write_all(&goodbye).await?;
        self.writer.flush().await?;
        self.closed = true;
        trace!("sent termination frame");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<W> Drop for BoxWriter<W> {
    fn drop(&mut self) {
        self.key.zeroize();
        self.nonce.zeroize();
    }
}

/// Inbound half: opens one frame per [`BoxReader::recv`] call. Reads must be
/// serialized by the caller; after a clean close every further call returns
/// `Ok(None)` immediately.
pub struct BoxReader<R> {
    reader: R,
    key: [u8; SECRET_SIZE],
    nonce: [u8; NONCE_SIZE],
    closed: bool,
}

impl<R: AsyncRead + Unpin> BoxReader<R> {
    pub fn new(reader: R, key: [u8; SECRET_SIZE], nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            reader,
            key,
            nonce,
            closed: false,
        }
    }

    /// Reads the next frame, returning its plaintext body, or `Ok(None)` on
    /// a clean close (termination frame, or EOF at a frame boundary). Any
    /// failure mid-frame is fatal for the connection.
    pub async fn recv(&mut self) -> Result<Option<Bytes>, ShsError> {
        if self.closed {
            return Ok(None);
        }

        let mut sealed_header = [0u8; HEADER_SIZE];
        match self.reader.read_exact(&mut sealed_header).await {
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.closed = true;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }

        let Some(header) = crypto::open(&self.key, &self.nonce, &sealed_header) else {
            return Err(ShsError::FrameAuthFail);
        };
        if header[..] == TERMINATION_HEADER {
            self.closed = true;
            trace!("received termination frame");
            return Ok(None);
        }

        let length = u16::from_be_bytes([header[0], header[1]]) as usize;
        if length > MAX_SEGMENT_SIZE {
            return Err(ShsError::OversizedFrame(length));
        }
        let tag: [u8; TAG_SIZE] = header[2..].try_into().expect("header is 18 bytes");

        let mut body = BytesMut::zeroed(length);
        self.reader
            .read_exact(&mut body)
            .await
            .map_err(ShsError::from_read_error)?;

        let body_nonce = inc_nonce(&self.nonce);
        if !crypto::open_detached(&self.key, &body_nonce, &tag, &mut body) {
            return Err(ShsError::FrameAuthFail);
        }
        self.nonce = inc_nonce(&body_nonce);
        trace!("received frame of {length} bytes");
        Ok(Some(body.freeze()))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<R> Drop for BoxReader<R> {
    fn drop(&mut self) {
        self.key.zeroize();
        self.nonce.zeroize();
    }
}

/// Directed halves over a split duplex stream, as handed out by
/// [`super::connection::SecretConnection::into_split`].
pub type BoxStreamReader<S> = BoxReader<ReadHalf<S>>;
pub type BoxStreamWriter<S> = BoxWriter<WriteHalf<S>>;
