//! TOTP multi-factor authentication
//!
//! Authenticator-app compatible settings: SHA1, 6 digits, 30 second step,
//! one step of clock skew either side. Secrets are stored base32-encoded.

use anyhow::{Context, Result};
use totp_rs::{Algorithm, Secret, TOTP};

const TOTP_DIGITS: usize = 6;
const TOTP_SKEW: u8 = 1;
const TOTP_STEP: u64 = 30;

/// Builds and checks TOTP codes for one issuer name
#[derive(Debug, Clone)]
pub struct MfaService {
    issuer: String,
}

impl MfaService {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generate a new random base32 secret
    pub fn generate_secret(&self) -> String {
        Secret::generate_secret().to_encoded().to_string()
    }

    fn totp(&self, secret: &str, account: &str) -> Result<TOTP> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| anyhow::anyhow!("Invalid TOTP secret: {:?}", e))?;

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| anyhow::anyhow!("Failed to create TOTP: {}", e))
        .context("Invalid TOTP parameters")
    }

    /// `otpauth://` URI for enrolling the secret in an authenticator app
    pub fn provisioning_uri(&self, secret: &str, account: &str) -> Result<String> {
        Ok(self.totp(secret, account)?.get_url())
    }

    /// QR code of the provisioning URI as a base64 PNG
    pub fn qr_code_base64(&self, secret: &str, account: &str) -> Result<String> {
        self.totp(secret, account)?
            .get_qr_base64()
            .map_err(|e| anyhow::anyhow!("Failed to generate QR code: {}", e))
    }

    /// Check a code against the current time window
    pub fn verify(&self, secret: &str, account: &str, code: &str) -> Result<bool> {
        let code = code.trim();
        if code.len() != TOTP_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        Ok(self.totp(secret, account)?.check_current(code).unwrap_or(false))
    }

    /// Current code for a secret
    #[cfg(test)]
    pub fn current_code(&self, secret: &str, account: &str) -> Result<String> {
        self.totp(secret, account)?
            .generate_current()
            .map_err(|e| anyhow::anyhow!("Failed to generate TOTP: {}", e))
    }
}
