//! Credential generation and outbound request signing.
//!
//! Registration issues each consumer an opaque API key/secret pair.
//! The producer authenticates its outbound calls to the consumer's
//! node by sending the key alongside an HMAC-SHA256 signature of the
//! request payload computed with the secret.

use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default credential length in characters.
///
/// 16 alphanumeric characters carry about 95 bits of entropy, well
/// past the 60-bit floor required of issued credentials.
pub const DEFAULT_CREDENTIAL_LEN: usize = 16;

/// An issued API key/secret pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    /// Public half, sent with every signed request.
    pub api_key: String,
    /// Secret half, used only to compute signatures.
    pub api_secret: String,
}

impl CredentialPair {
    /// Generates a fresh random pair of the given length.
    pub fn generate(len: usize) -> Self {
        Self {
            api_key: random_credential(len),
            api_secret: random_credential(len),
        }
    }

    /// Returns a signer bound to this pair's secret.
    pub fn signer(&self) -> RequestSigner {
        RequestSigner::new(self.api_secret.as_bytes())
    }
}

fn random_credential(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Signs outbound request payloads with HMAC-SHA256.
#[derive(Clone)]
pub struct RequestSigner {
    secret: Vec<u8>,
}

impl RequestSigner {
    /// Creates a signer from a raw secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signs a payload, returning the signature as lowercase hex.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        to_hex(&mac.finalize().into_bytes())
    }

    /// Verifies a hex signature against a payload.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        self.sign(payload) == signature
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
