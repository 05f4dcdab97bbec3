use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Checks `HMAC-SHA256(body, secret)` signatures on processor callbacks.
#[derive(Clone)]
pub struct WebhookVerifier {
    keyed: HmacSha256,
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> Result<Self, InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(secret.as_bytes())?,
        })
    }

    pub fn sign(&self, body: &[u8]) -> String {
        let mut mac = self.keyed.clone();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison against the hex signature header.
    pub fn verify(&self, body: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let mut mac = self.keyed.clone();
        mac.update(body);
        let valid = mac.verify_slice(&expected).is_ok();
        if !valid {
            log::warn!("Webhook signature verification failed");
        }
        valid
    }
}
