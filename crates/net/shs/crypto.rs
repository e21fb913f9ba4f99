use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{AeadInPlace, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const SECRET_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 24;
pub const TAG_SIZE: usize = 16;

/// The 32-byte capability shared out of band by every peer of a network.
/// It keys the challenge MACs, so peers holding different network keys never
/// get past the first handshake message.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NetworkKey(pub [u8; SECRET_SIZE]);

impl NetworkKey {
    /// The well-known Scuttlebutt main network key.
    pub const SSB_MAIN_NET: NetworkKey = NetworkKey([
        0xd4, 0xa1, 0xcb, 0x88, 0xa6, 0x6f, 0x02, 0xf8, 0xdb, 0x63, 0x5c, 0xe2, 0x64, 0x41, 0xcc,
        0x5d, 0xac, 0x1b, 0x08, 0x42, 0x0c, 0xea, 0xac, 0x23, 0x08, 0x39, 0xb7, 0x55, 0x84, 0x5a,
        0x9f, 0xfb,
    ]);
}

impl Default for NetworkKey {
    fn default() -> Self {
        Self::SSB_MAIN_NET
    }
}

impl std::fmt::Debug for NetworkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NetworkKey({})", hex::encode(self.0))
    }
}

/// Per-connection Curve25519 keypair. The secret half is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EphemeralKeypair {
    pk: [u8; SECRET_SIZE],
    sk: [u8; SECRET_SIZE],
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let mut sk = [0u8; SECRET_SIZE];
        OsRng.fill_bytes(&mut sk);
        Self::from_secret(sk)
    }

    /// Rebuilds the keypair from a secret scalar, deriving the public half
    /// the way `crypto_box_keypair` does (scalar mult against the basepoint).
    pub fn from_secret(sk: [u8; SECRET_SIZE]) -> Self {
        let pk = x25519_dalek::x25519(sk, x25519_dalek::X25519_BASEPOINT_BYTES);
        Self { pk, sk }
    }

    pub fn public(&self) -> &[u8; SECRET_SIZE] {
        &self.pk
    }

    pub(crate) fn secret(&self) -> &[u8; SECRET_SIZE] {
        &self.sk
    }

    pub(crate) fn wipe(&mut self) {
        self.sk.zeroize();
    }
}

/// The outcome of a successful handshake. Each side's `encrypt_*` pair
/// matches the peer's `decrypt_*` pair. Wiped on drop; the handshake state
/// that produced it is wiped separately.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    pub encrypt_key: [u8; SECRET_SIZE],
    pub encrypt_nonce: [u8; NONCE_SIZE],
    pub decrypt_key: [u8; SECRET_SIZE],
    pub decrypt_nonce: [u8; NONCE_SIZE],
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 over the concatenation of `parts`, without materializing it.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// HMAC-SHA-512-256: full HMAC-SHA-512 truncated to its first 32 bytes,
/// matching `crypto_auth`.
pub fn auth(key: &[u8; SECRET_SIZE], msg: &[u8]) -> [u8; 32] {
    let mut mac = <Hmac<Sha512> as Mac>::new_from_slice(key).expect("hmac accepts any key length");
    mac.update(msg);
    let digest = mac.finalize().into_bytes();
    digest[..32].try_into().expect("sha-512 digest is 64 bytes")
}

/// Constant-time check of a 32-byte challenge MAC.
pub fn auth_verify(expected: &[u8; 32], key: &[u8; SECRET_SIZE], msg: &[u8]) -> bool {
    auth(key, msg).ct_eq(expected).into()
}

/// Curve25519 scalar multiplication with the usual scalar clamping.
pub fn scalar_mult(scalar: &[u8; SECRET_SIZE], point: &[u8; SECRET_SIZE]) -> [u8; SECRET_SIZE] {
    x25519_dalek::x25519(*scalar, *point)
}

/// Derives the Curve25519 secret scalar from an Ed25519 signing key:
/// SHA-512 over the 32-byte seed, lower half clamped. This is the libsodium
/// `crypto_sign_ed25519_sk_to_curve25519` conversion.
pub fn sign_sk_to_curve(key: &SigningKey) -> [u8; SECRET_SIZE] {
    let digest = Sha512::digest(key.to_bytes());
    let mut scalar: [u8; SECRET_SIZE] = digest[..32].try_into().expect("digest is 64 bytes");
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
    scalar
}

/// Converts an Ed25519 public key to its Curve25519 form by mapping the
/// Edwards point to Montgomery form. Returns `None` for inputs that are not
/// valid curve points.
pub fn sign_pk_to_curve(pk: &[u8; SECRET_SIZE]) -> Option<[u8; SECRET_SIZE]> {
    let point = CompressedEdwardsY(*pk).decompress()?;
    Some(point.to_montgomery().0)
}

pub fn sign_detached(key: &SigningKey, msg: &[u8]) -> [u8; 64] {
    key.sign(msg).to_bytes()
}

pub fn verify_detached(key: &VerifyingKey, signature: &[u8; 64], msg: &[u8]) -> bool {
    key.verify(msg, &Signature::from_bytes(signature)).is_ok()
}

/// Seals `plaintext` into the NaCl secretbox layout: 16-byte Poly1305 tag
/// followed by the ciphertext body.
pub fn seal(key: &[u8; SECRET_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let mut boxed = vec![0u8; TAG_SIZE + plaintext.len()];
    boxed[TAG_SIZE..].copy_from_slice(plaintext);
    let tag = seal_detached(key, nonce, &mut boxed[TAG_SIZE..]);
    boxed[..TAG_SIZE].copy_from_slice(&tag);
    boxed
}

/// Opens a `tag ∥ ciphertext` secretbox. `None` means the box does not
/// authenticate under this key and nonce.
pub fn open(key: &[u8; SECRET_SIZE], nonce: &[u8; NONCE_SIZE], boxed: &[u8]) -> Option<Vec<u8>> {
    if boxed.len() < TAG_SIZE {
        return None;
    }
    let tag: [u8; TAG_SIZE] = boxed[..TAG_SIZE].try_into().expect("length checked above");
    let mut plaintext = boxed[TAG_SIZE..].to_vec();
    open_detached(key, nonce, &tag, &mut plaintext).then_some(plaintext)
}

/// Encrypts `buffer` in place, returning the detached Poly1305 tag.
pub fn seal_detached(
    key: &[u8; SECRET_SIZE],
    nonce: &[u8; NONCE_SIZE],
    buffer: &mut [u8],
) -> [u8; TAG_SIZE] {
    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(key));
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), b"", buffer)
        .expect("sealing cannot fail");
    tag.into()
}

/// Decrypts `buffer` in place against a detached tag. On failure the buffer
/// contents are unspecified and must not be used.
pub fn open_detached(
    key: &[u8; SECRET_SIZE],
    nonce: &[u8; NONCE_SIZE],
    tag: &[u8; TAG_SIZE],
    buffer: &mut [u8],
) -> bool {
    let cipher = XSalsa20Poly1305::new(GenericArray::from_slice(key));
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            buffer,
            GenericArray::from_slice(tag),
        )
        .is_ok()
}
