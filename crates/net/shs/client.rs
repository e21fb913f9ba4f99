use ed25519_dalek::{SigningKey, VerifyingKey};
use zeroize::Zeroize;

use super::crypto::{self, EphemeralKeypair, NetworkKey, SessionKeys, NONCE_SIZE, SECRET_SIZE};
use super::error::ShsError;
use super::{CHALLENGE_SIZE, CLIENT_AUTH_SIZE, SERVER_ACCEPT_SIZE};

/// Client side of the four-message handshake. Fields fill in as the protocol
/// advances; [`ClientHandshake::clean`] (also run on drop) wipes every
/// derived secret once the session keys are out.
pub struct ClientHandshake {
    pub(crate) network_key: NetworkKey,
    pub(crate) local_key: SigningKey,
    pub(crate) local_ephemeral: EphemeralKeypair,
    pub(crate) local_app_mac: [u8; 32],
    pub(crate) remote_key: VerifyingKey,
    pub(crate) remote_ephemeral_pk: Option<[u8; SECRET_SIZE]>,
    pub(crate) remote_app_mac: Option<[u8; 32]>,
    // The three Curve25519 agreements, in the order they become available:
    // ephemeral × ephemeral, ephemeral × server long-term, client long-term
    // × ephemeral.
    pub(crate) shared_a: Option<[u8; SECRET_SIZE]>,
    pub(crate) shared_b: Option<[u8; SECRET_SIZE]>,
    pub(crate) shared_c: Option<[u8; SECRET_SIZE]>,
    pub(crate) shared_hash: Option<[u8; 32]>,
    pub(crate) hello: Option<[u8; 96]>,
    pub(crate) box_key: Option<[u8; 32]>,
    pub(crate) accepted: bool,
}

impl ClientHandshake {
    pub fn new(local_key: SigningKey, remote_key: VerifyingKey, network_key: NetworkKey) -> Self {
        Self::with_ephemeral(local_key, remote_key, EphemeralKeypair::generate(), network_key)
    }

    /// Like [`ClientHandshake::new`] but with a caller-supplied ephemeral
    /// keypair, for deterministic handshakes.
    pub fn with_ephemeral(
        local_key: SigningKey,
        remote_key: VerifyingKey,
        ephemeral: EphemeralKeypair,
        network_key: NetworkKey,
    ) -> Self {
        let local_app_mac = crypto::auth(&network_key.0, ephemeral.public());
        Self {
            network_key,
            local_key,
            local_ephemeral: ephemeral,
            local_app_mac,
            remote_key,
            remote_ephemeral_pk: None,
            remote_app_mac: None,
            shared_a: None,
            shared_b: None,
            shared_c: None,
            shared_hash: None,
            hello: None,
            box_key: None,
            accepted: false,
        }
    }

    /// Message 1: `local_app_mac ∥ local_ephemeral_pk`.
    pub fn generate_challenge(&self) -> [u8; CHALLENGE_SIZE] {
        let mut challenge = [0u8; CHALLENGE_SIZE];
        challenge[..32].copy_from_slice(&self.local_app_mac);
        challenge[32..].copy_from_slice(self.local_ephemeral.public());
        challenge
    }

    /// Checks message 2. On success the peer's ephemeral key and MAC are
    /// stored (never to be overwritten) and the ephemeral agreement is
    /// derived; on failure the state is left untouched.
    pub fn verify_server_challenge(&mut self, challenge: &[u8; CHALLENGE_SIZE]) -> bool {
        if self.remote_app_mac.is_some() {
            return false;
        }
        let mac: [u8; 32] = challenge[..32].try_into().expect("split of 64 bytes");
        let remote_ephemeral_pk: [u8; 32] = challenge[32..].try_into().expect("split of 64 bytes");
        if !crypto::auth_verify(&mac, &self.network_key.0, &remote_ephemeral_pk) {
            return false;
        }

        let shared_a = crypto::scalar_mult(self.local_ephemeral.secret(), &remote_ephemeral_pk);
        self.shared_hash = Some(crypto::sha256(&shared_a));
        self.shared_a = Some(shared_a);
        self.remote_app_mac = Some(mac);
        self.remote_ephemeral_pk = Some(remote_ephemeral_pk);
        true
    }

    /// Message 3: the 96-byte hello (signature ∥ our long-term public key)
    /// boxed under SHA-256(network_key ∥ ab ∥ aB) with a zero nonce.
    pub fn generate_client_auth(&mut self) -> Result<[u8; CLIENT_AUTH_SIZE], ShsError> {
        let (Some(shared_a), Some(shared_hash)) = (self.shared_a, self.shared_hash) else {
            return Err(ShsError::Usage("client auth before server challenge"));
        };
        let server_curve_pk = crypto::sign_pk_to_curve(self.remote_key.as_bytes())
            .ok_or(ShsError::Usage("server key is not a usable curve point"))?;
        let shared_b = crypto::scalar_mult(self.local_ephemeral.secret(), &server_curve_pk);

        let signed = crypto::sign_detached(
            &self.local_key,
            &[
                &self.network_key.0[..],
                &self.remote_key.as_bytes()[..],
                &shared_hash[..],
            ]
            .concat(),
        );
        let mut hello = [0u8; 96];
        hello[..64].copy_from_slice(&signed);
        hello[64..].copy_from_slice(self.local_key.verifying_key().as_bytes());

        let key = crypto::sha256_concat(&[&self.network_key.0, &shared_a, &shared_b]);
        let boxed = crypto::seal(&key, &[0u8; NONCE_SIZE], &hello);

        self.shared_b = Some(shared_b);
        self.hello = Some(hello);
        Ok(boxed.try_into().expect("client auth is 112 bytes"))
    }

    /// Checks message 4: derive the final agreement, open the box under
    /// SHA-256(network_key ∥ ab ∥ aB ∥ Ab), and verify the server's
    /// signature over `network_key ∥ hello ∥ shared_hash`.
    pub fn verify_server_accept(&mut self, accept: &[u8; SERVER_ACCEPT_SIZE]) -> bool {
        let (Some(remote_ephemeral_pk), Some(shared_a), Some(shared_b), Some(shared_hash), Some(hello)) = (
            self.remote_ephemeral_pk,
            self.shared_a,
            self.shared_b,
            self.shared_hash,
            self.hello,
        ) else {
            return false;
        };

        let mut local_curve_sk = crypto::sign_sk_to_curve(&self.local_key);
        let shared_c = crypto::scalar_mult(&local_curve_sk, &remote_ephemeral_pk);
        local_curve_sk.zeroize();

        let box_key = crypto::sha256_concat(&[
            &self.network_key.0,
            &shared_a,
            &shared_b,
            &shared_c,
        ]);
        let Some(signature) = crypto::open(&box_key, &[0u8; NONCE_SIZE], accept) else {
            return false;
        };
        let signature: [u8; 64] = match signature.try_into() {
            Ok(signature) => signature,
            Err(_) => return false,
        };

        let signed = [&self.network_key.0[..], &hello[..], &shared_hash[..]].concat();
        if !crypto::verify_detached(&self.remote_key, &signature, &signed) {
            return false;
        }

        self.shared_c = Some(shared_c);
        self.box_key = Some(box_key);
        self.accepted = true;
        true
    }

    /// Extracts the four session keys. Only valid once the server accept has
    /// verified; call [`ClientHandshake::clean`] right after.
    pub fn session_keys(&self) -> Result<SessionKeys, ShsError> {
        let (true, Some(box_key), Some(remote_ephemeral_pk)) =
            (self.accepted, self.box_key, self.remote_ephemeral_pk)
        else {
            return Err(ShsError::Usage("session keys before the accept verified"));
        };
        let seed = crypto::sha256(&box_key);
        Ok(SessionKeys {
            encrypt_key: crypto::sha256_concat(&[&seed, self.remote_key.as_bytes()]),
            encrypt_nonce: crypto::auth(&self.network_key.0, &remote_ephemeral_pk)[..NONCE_SIZE]
                .try_into()
                .expect("24-byte prefix of a 32-byte mac"),
            decrypt_key: crypto::sha256_concat(&[
                &seed,
                self.local_key.verifying_key().as_bytes(),
            ]),
            decrypt_nonce: crypto::auth(&self.network_key.0, self.local_ephemeral.public())
                [..NONCE_SIZE]
                .try_into()
                .expect("24-byte prefix of a 32-byte mac"),
        })
    }

    /// The server's long-term identity this handshake authenticates against.
    pub fn remote_key(&self) -> &VerifyingKey {
        &self.remote_key
    }

    /// Wipes the ephemeral secret and every derived secret. Idempotent.
    pub fn clean(&mut self) {
        self.local_ephemeral.wipe();
        wipe(&mut self.shared_a);
        wipe(&mut self.shared_b);
        wipe(&mut self.shared_c);
        wipe(&mut self.shared_hash);
        wipe(&mut self.box_key);
        if let Some(hello) = self.hello.as_mut() {
            hello.zeroize();
        }
        self.hello = None;
    }
}

pub(crate) fn wipe(slot: &mut Option<[u8; 32]>) {
    if let Some(secret) = slot.as_mut() {
        secret.zeroize();
    }
    *slot = None;
}

impl Drop for ClientHandshake {
    fn drop(&mut self) {
        self.clean();
    }
}
