//! Signed availability links.
//!
//! A cleaner receives one link per month to declare availability. The
//! token is `base64url(payload) "." base64url(hmac_sha256(payload))` where
//! payload is `{month}.{expires_unix}.{cleaner_id}`. The cleaner id goes
//! last so it may contain any UTF-8, dots included.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::calendar::Month;

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("link secret must be non-empty")]
    EmptySecret,
    #[error("malformed link token")]
    Malformed,
    #[error("link token signature mismatch")]
    BadSignature,
    #[error("link expired at {0}")]
    Expired(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkClaims {
    pub cleaner_id: String,
    pub month: Month,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LinkSigner {
    key: Vec<u8>,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner").finish_non_exhaustive()
    }
}

impl LinkSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let key = secret.as_ref().to_vec();
        if key.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        Ok(Self { key })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::EmptySecret)
    }

    pub fn issue(&self, claims: &LinkClaims) -> Result<String, TokenError> {
        let payload = format!(
            "{}.{}.{}",
            claims.month,
            claims.expires_at.timestamp(),
            claims.cleaner_id
        );
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let sig = mac.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(sig)
        ))
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<LinkClaims, TokenError> {
        let (payload_b64, sig_b64) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(&payload);
        mac.verify_slice(&sig).map_err(|_| TokenError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| TokenError::Malformed)?;
        let mut parts = payload.splitn(3, '.');
        let month: Month = parts
            .next()
            .and_then(|m| m.parse().ok())
            .ok_or(TokenError::Malformed)?;
        let expires_unix: i64 = parts
            .next()
            .and_then(|e| e.parse().ok())
            .ok_or(TokenError::Malformed)?;
        let cleaner_id = parts
            .next()
            .filter(|id| !id.is_empty())
            .ok_or(TokenError::Malformed)?
            .to_string();
        let expires_at = DateTime::<Utc>::from_timestamp(expires_unix, 0).ok_or(TokenError::Malformed)?;

        if now >= expires_at {
            return Err(TokenError::Expired(expires_at));
        }

        Ok(LinkClaims {
            cleaner_id,
            month,
            expires_at,
        })
    }
}
