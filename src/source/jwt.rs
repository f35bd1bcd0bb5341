//! Bearer-credential minting for the Source (§4.2).
//!
//! The signed payload is `{iss: key, exp: expiry}`, algorithm HS256, headers
//! `{alg: HS256, typ: JWT}`. Tokens live for five minutes; a token is
//! reissued once fewer than one second of lifetime remains.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::error::{SourceError, SourceResult};

const TOKEN_LIFETIME: Duration = Duration::minutes(5);
const REISSUE_MARGIN: Duration = Duration::seconds(1);

#[derive(Debug, Serialize, Deserialize)]
struct DownloadTokenClaims {
    iss: String,
    exp: i64,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Mints and caches the short-lived bearer credential used for every
/// outbound Source request.
pub struct CredentialMinter {
    api_key: String,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl CredentialMinter {
    pub fn new(api_key: impl Into<String>, api_secret: &str) -> Self {
        Self {
            api_key: api_key.into(),
            encoding_key: EncodingKey::from_secret(api_secret.as_bytes()),
            cached: Mutex::new(None),
        }
    }

    /// Return the current bearer token, minting a new one if none is cached
    /// or the cached one has less than one second of remaining lifetime.
    pub fn get_download_token(&self) -> SourceResult<String> {
        let mut guard = self.cached.lock().expect("credential cache mutex poisoned");

        let needs_reissue = match &*guard {
            None => true,
            Some(cached) => Utc::now() + REISSUE_MARGIN > cached.expires_at,
        };

        if needs_reissue {
            let expires_at = Utc::now() + TOKEN_LIFETIME;
            let claims = DownloadTokenClaims {
                iss: self.api_key.clone(),
                exp: expires_at.timestamp(),
            };
            let header = Header::new(jsonwebtoken::Algorithm::HS256);
            let token = encode(&header, &claims, &self.encoding_key)
                .map_err(|e| SourceError::TokenSigning(e.to_string()))?;
            *guard = Some(CachedToken { token: token.clone(), expires_at });
            return Ok(token);
        }

        Ok(guard.as_ref().expect("checked above").token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn mints_a_token_with_future_expiry() {
        let minter = CredentialMinter::new("key", "secret");
        let token = minter.get_download_token().unwrap();

        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;
        let decoded = decode::<DownloadTokenClaims>(&token, &DecodingKey::from_secret(b"secret"), &validation).unwrap();

        assert_eq!(decoded.claims.iss, "key");
        assert!(decoded.claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn reuses_cached_token_while_valid() {
        let minter = CredentialMinter::new("key", "secret");
        let first = minter.get_download_token().unwrap();
        let second = minter.get_download_token().unwrap();
        assert_eq!(first, second);
    }
}
