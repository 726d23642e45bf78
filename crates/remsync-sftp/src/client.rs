//! SSH client handler
//!
//! Host keys are checked against an allow-list of OpenSSH `SHA256:`
//! fingerprints or base64-encoded public keys. With an empty list every key
//! is accepted and a warning is logged.

use russh::keys::{HashAlg, PublicKey, PublicKeyBase64};
use tracing::{debug, warn};

pub(crate) struct Client {
    allowed_fingerprints: Vec<String>,
}

impl Client {
    pub(crate) fn new(allowed_fingerprints: Vec<String>) -> Self {
        Self {
            allowed_fingerprints,
        }
    }
}

impl russh::client::Handler for Client {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        if self.allowed_fingerprints.is_empty() {
            warn!(
                fingerprint = %fingerprint,
                "No host key allow-list configured, accepting server key"
            );
            return Ok(true);
        }
        Ok(is_allowed(
            &self.allowed_fingerprints,
            &fingerprint,
            &server_public_key.public_key_base64(),
        ))
    }
}

fn is_allowed(allowed: &[String], fingerprint: &str, key_base64: &str) -> bool {
    let ok = allowed
        .iter()
        .map(|s| s.trim())
        .any(|s| s == fingerprint || s == key_base64);
    if ok {
        debug!(fingerprint, "Server key accepted");
    } else {
        warn!(fingerprint, "Server key not in allow-list");
    }
    ok
}
