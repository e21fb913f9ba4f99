pub mod boxstream;
pub mod client;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod server;
pub mod utils;

#[cfg(test)]
mod vectors;

/// Size of handshake messages 1 and 2 (`app_mac ∥ ephemeral_pk`).
pub const CHALLENGE_SIZE: usize = 64;
/// Size of handshake message 3 (the boxed 96-byte client hello).
pub const CLIENT_AUTH_SIZE: usize = 112;
/// Size of handshake message 4 (the boxed 64-byte server signature).
pub const SERVER_ACCEPT_SIZE: usize = 80;
