use ed25519_dalek::{SigningKey, VerifyingKey};
use zeroize::Zeroize;

use super::client::wipe;
use super::crypto::{self, EphemeralKeypair, NetworkKey, SessionKeys, NONCE_SIZE, SECRET_SIZE};
use super::error::ShsError;
use super::{CHALLENGE_SIZE, CLIENT_AUTH_SIZE, SERVER_ACCEPT_SIZE};

/// Server side of the handshake, the mirror of
/// [`super::client::ClientHandshake`]. The client's long-term identity is
/// unknown up front; it is learned (and authenticated) from message 3.
pub struct ServerHandshake {
    pub(crate) network_key: NetworkKey,
    pub(crate) local_key: SigningKey,
    pub(crate) local_ephemeral: EphemeralKeypair,
    pub(crate) local_app_mac: [u8; 32],
    pub(crate) remote_key: Option<VerifyingKey>,
    pub(crate) remote_ephemeral_pk: Option<[u8; SECRET_SIZE]>,
    pub(crate) remote_app_mac: Option<[u8; 32]>,
    pub(crate) shared_a: Option<[u8; SECRET_SIZE]>,
    pub(crate) shared_b: Option<[u8; SECRET_SIZE]>,
    pub(crate) shared_c: Option<[u8; SECRET_SIZE]>,
    pub(crate) shared_hash: Option<[u8; 32]>,
    pub(crate) remote_hello: Option<[u8; 96]>,
    pub(crate) box_key: Option<[u8; 32]>,
    pub(crate) accepted: bool,
}

impl ServerHandshake {
    pub fn new(local_key: SigningKey, network_key: NetworkKey) -> Self {
        Self::with_ephemeral(local_key, EphemeralKeypair::generate(), network_key)
    }

    pub fn with_ephemeral(
        local_key: SigningKey,
        ephemeral: EphemeralKeypair,
        network_key: NetworkKey,
    ) -> Self {
        let local_app_mac = crypto::auth(&network_key.0, ephemeral.public());
        Self {
            network_key,
            local_key,
            local_ephemeral: ephemeral,
            local_app_mac,
            remote_key: None,
            remote_ephemeral_pk: None,
            remote_app_mac: None,
            shared_a: None,
            shared_b: None,
            shared_c: None,
            shared_hash: None,
            remote_hello: None,
            box_key: None,
            accepted: false,
        }
    }

    /// Checks message 1, the same MAC check the client applies to message 2.
    pub fn verify_client_challenge(&mut self, challenge: &[u8; CHALLENGE_SIZE]) -> bool {
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

    /// Message 2: `local_app_mac ∥ local_ephemeral_pk`.
    pub fn generate_challenge(&self) -> [u8; CHALLENGE_SIZE] {
        let mut challenge = [0u8; CHALLENGE_SIZE];
        challenge[..32].copy_from_slice(&self.local_app_mac);
        challenge[32..].copy_from_slice(self.local_ephemeral.public());
        challenge
    }

    /// Checks message 3: open the box under SHA-256(network_key ∥ ab ∥ aB),
    /// split the 96-byte hello into signature and client key, and verify the
    /// signature over `network_key ∥ server_pk ∥ shared_hash`. On success we
    /// finally know who is dialing us.
    pub fn verify_client_auth(&mut self, auth: &[u8; CLIENT_AUTH_SIZE]) -> bool {
        let (Some(remote_ephemeral_pk), Some(shared_a), Some(shared_hash)) = (
            self.remote_ephemeral_pk,
            self.shared_a,
            self.shared_hash,
        ) else {
            return false;
        };

        let mut local_curve_sk = crypto::sign_sk_to_curve(&self.local_key);
        let shared_b = crypto::scalar_mult(&local_curve_sk, &remote_ephemeral_pk);
        local_curve_sk.zeroize();

        let key = crypto::sha256_concat(&[&self.network_key.0, &shared_a, &shared_b]);
        let Some(hello) = crypto::open(&key, &[0u8; NONCE_SIZE], auth) else {
            return false;
        };
        let hello: [u8; 96] = match hello.try_into() {
            Ok(hello) => hello,
            Err(_) => return false,
        };

        let signature: [u8; 64] = hello[..64].try_into().expect("split of 96 bytes");
        let client_pk: [u8; 32] = hello[64..].try_into().expect("split of 96 bytes");
        let Ok(remote_key) = VerifyingKey::from_bytes(&client_pk) else {
            return false;
        };

        let signed = [
            &self.network_key.0[..],
            &self.local_key.verifying_key().as_bytes()[..],
            &shared_hash[..],
        ]
        .concat();
        if !crypto::verify_detached(&remote_key, &signature, &signed) {
            return false;
        }

        self.shared_b = Some(shared_b);
        self.remote_hello = Some(hello);
        self.remote_key = Some(remote_key);
        true
    }

    /// Message 4: sign `network_key ∥ hello ∥ shared_hash` and box the bare
    /// signature under SHA-256(network_key ∥ ab ∥ aB ∥ Ab) with a zero
    /// nonce. 64 bytes of plaintext plus the tag make the 80-byte accept.
    pub fn generate_accept(&mut self) -> Result<[u8; SERVER_ACCEPT_SIZE], ShsError> {
        let (Some(remote_key), Some(shared_a), Some(shared_b), Some(shared_hash), Some(hello)) = (
            self.remote_key,
            self.shared_a,
            self.shared_b,
            self.shared_hash,
            self.remote_hello,
        ) else {
            return Err(ShsError::Usage("accept before the client auth verified"));
        };
        let client_curve_pk = crypto::sign_pk_to_curve(remote_key.as_bytes())
            .ok_or(ShsError::BadAuth)?;
        let shared_c = crypto::scalar_mult(self.local_ephemeral.secret(), &client_curve_pk);

        let box_key = crypto::sha256_concat(&[
            &self.network_key.0,
            &shared_a,
            &shared_b,
            &shared_c,
        ]);
        let signed = [&self.network_key.0[..], &hello[..], &shared_hash[..]].concat();
        let signature = crypto::sign_detached(&self.local_key, &signed);
        let boxed = crypto::seal(&box_key, &[0u8; NONCE_SIZE], &signature);

        self.shared_c = Some(shared_c);
        self.box_key = Some(box_key);
        self.accepted = true;
        Ok(boxed.try_into().expect("server accept is 80 bytes"))
    }

    /// Extracts the four session keys; the inverse mapping of the client's.
    pub fn session_keys(&self) -> Result<SessionKeys, ShsError> {
        let (true, Some(box_key), Some(remote_key), Some(remote_ephemeral_pk)) = (
            self.accepted,
            self.box_key,
            self.remote_key,
            self.remote_ephemeral_pk,
        ) else {
            return Err(ShsError::Usage("session keys before the accept was sent"));
        };
        let seed = crypto::sha256(&box_key);
        Ok(SessionKeys {
            encrypt_key: crypto::sha256_concat(&[&seed, remote_key.as_bytes()]),
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

    /// The authenticated client identity, available once message 3 verified.
    pub fn remote_key(&self) -> Option<&VerifyingKey> {
        self.remote_key.as_ref()
    }

    /// Wipes the ephemeral secret and every derived secret. Idempotent.
    pub fn clean(&mut self) {
        self.local_ephemeral.wipe();
        wipe(&mut self.shared_a);
        wipe(&mut self.shared_b);
        wipe(&mut self.shared_c);
        wipe(&mut self.shared_hash);
        wipe(&mut self.box_key);
        if let Some(hello) = self.remote_hello.as_mut() {
            hello.zeroize();
        }
        self.remote_hello = None;
    }
}

impl Drop for ServerHandshake {
    fn drop(&mut self) {
        self.clean();
    }
}
