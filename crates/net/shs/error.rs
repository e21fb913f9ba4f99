use std::io;

use thiserror::Error;

/// Every handshake or framing failure terminates the connection; none of
/// these kinds is recoverable in place.
#[derive(Debug, Error)]
pub enum ShsError {
    #[error("challenge MAC was not made with our network key")]
    BadNetworkKey,
    #[error("client authentication rejected")]
    BadAuth,
    #[error("server accept rejected")]
    BadAccept,
    #[error("transport closed before the message completed")]
    ShortRead,
    #[error("frame failed authentication")]
    FrameAuthFail,
    #[error("frame declares a {0}-byte body, over the segment limit")]
    OversizedFrame(usize),
    #[error("{0}")]
    Usage(&'static str),
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl ShsError {
    /// Collapses a failed exact-length read into the protocol's short-read
    /// kind, leaving other transport errors untouched.
    pub(crate) fn from_read_error(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ShsError::ShortRead
        } else {
            ShsError::Io(err)
        }
    }
}
