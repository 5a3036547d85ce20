//! Time-boxed, HMAC-signed tokens authorizing out-of-band rebuilds.
//!
//! Wire form: `base64url(json([issued_at_ms, payload])) "." base64url(hmac_sha512)`.
//! Tokens are stateless; validity is re-derived from signature and age on every check.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac, digest::KeyInit};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha512;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

type HmacSha512 = Hmac<Sha512>;

const TOKEN_SEPARATOR: char = '.';
const KEY_LEN: usize = 64;
const MIN_KEY_LEN: usize = 32;

pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Error)]
pub enum KeyImportError {
    #[error("signing key is not valid base64url")]
    Encoding,
    #[error("signing key must be at least {MIN_KEY_LEN} bytes, got {0}")]
    TooShort(usize),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token payload could not be serialized: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("signing key rejected by hmac")]
    Key,
}

/// Shared symmetric key. Read-only after creation and cheap to clone.
#[derive(Clone)]
pub struct SigningKey(Arc<[u8]>);

impl SigningKey {
    /// Fresh 512-bit key.
    pub fn generate() -> Self {
        let mut bytes = Vec::with_capacity(KEY_LEN);
        while bytes.len() < KEY_LEN {
            bytes.extend_from_slice(Uuid::new_v4().as_bytes());
        }
        Self(bytes.into())
    }

    /// Transportable form, shared between build and serve processes.
    pub fn export(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    pub fn import(encoded: &str) -> Result<Self, KeyImportError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|_| KeyImportError::Encoding)?;
        if bytes.len() < MIN_KEY_LEN {
            return Err(KeyImportError::TooShort(bytes.len()));
        }
        Ok(Self(bytes.into()))
    }

    fn mac(&self) -> Option<HmacSha512> {
        <HmacSha512 as KeyInit>::new_from_slice(&self.0).ok()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// The two disjoint token families. A token minted for one never validates as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    ForceGenerate,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
struct MarkerPayload {
    purpose: TokenPurpose,
}

#[derive(Clone, Debug)]
pub struct TokenCodec {
    key: SigningKey,
    timeout: Duration,
}

impl TokenCodec {
    pub fn new(key: SigningKey) -> Self {
        Self {
            key,
            timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }

    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String, TokenError> {
        self.sign_at(payload, OffsetDateTime::now_utc())
    }

    pub fn sign_at<T: Serialize>(
        &self,
        payload: &T,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let body = serde_json::to_string(&(unix_millis(issued_at), payload))?;
        let mut mac = self.key.mac().ok_or(TokenError::Key)?;
        mac.update(body.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{}{TOKEN_SEPARATOR}{}",
            URL_SAFE_NO_PAD.encode(body.as_bytes()),
            URL_SAFE_NO_PAD.encode(signature.as_slice())
        ))
    }

    /// Returns the payload when the token is well-formed, correctly signed and
    /// younger than the timeout. Never fails loudly.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Option<T> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    pub fn verify_at<T: DeserializeOwned>(&self, token: &str, now: OffsetDateTime) -> Option<T> {
        let (encoded_body, encoded_signature) = token.split_once(TOKEN_SEPARATOR)?;
        let body = URL_SAFE_NO_PAD.decode(encoded_body).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(encoded_signature).ok()?;

        let mut mac = self.key.mac()?;
        mac.update(&body);
        let expected = mac.finalize().into_bytes();
        if expected.as_slice().ct_eq(signature.as_slice()).unwrap_u8() == 0 {
            return None;
        }

        let (issued_at, payload): (i64, serde_json::Value) = serde_json::from_slice(&body).ok()?;
        let age = unix_millis(now).saturating_sub(issued_at);
        if i128::from(age) > self.timeout.as_millis() as i128 {
            return None;
        }

        serde_json::from_value(payload).ok()
    }

    /// Mint a marker token of the given family.
    pub fn mint(&self, purpose: TokenPurpose) -> Result<String, TokenError> {
        self.sign(&MarkerPayload { purpose })
    }

    pub fn mint_at(
        &self,
        purpose: TokenPurpose,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        self.sign_at(&MarkerPayload { purpose }, issued_at)
    }

    /// True when `token` is a valid, unexpired marker of the given family.
    pub fn check(&self, token: &str, purpose: TokenPurpose) -> bool {
        self.verify::<MarkerPayload>(token)
            .is_some_and(|marker| marker.purpose == purpose)
    }
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
