//! HTTP Digest authentication for the Sink (§4.3). The Sink also expects a
//! literal `X-Requested-Auth: Digest` header on every authenticated call.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use md5::{Digest, Md5};
use rand::Rng;
use reqwest::{Client, StatusCode};

use super::error::{SinkError, SinkResult};

pub const REQUESTED_AUTH_HEADER: &str = "X-Requested-Auth";
pub const REQUESTED_AUTH_VALUE: &str = "Digest";

struct Challenge {
    realm: String,
    nonce: String,
    opaque: Option<String>,
    qop: Option<String>,
    nc: AtomicU32,
}

/// Computes and caches the digest challenge for a single Sink base URL,
/// reissuing the `Authorization` header for every request without an extra
/// 401 round trip per call once the challenge has been primed.
pub struct DigestAuth {
    user: String,
    password: String,
    challenge: Mutex<Option<Challenge>>,
}

impl DigestAuth {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self { user: user.into(), password: password.into(), challenge: Mutex::new(None) }
    }

    /// Issue an unauthenticated probe request to learn the realm/nonce if
    /// none is cached yet, then return the `Authorization` header value for
    /// `method uri`.
    pub async fn authorization_for(&self, client: &Client, method: &str, url: &str, uri_path: &str) -> SinkResult<String> {
        if self.challenge.lock().expect("digest mutex poisoned").is_none() {
            self.prime(client, url).await?;
        }
        self.header_value(method, uri_path)
    }

    async fn prime(&self, client: &Client, url: &str) -> SinkResult<()> {
        let probe = client
            .get(url)
            .header(REQUESTED_AUTH_HEADER, REQUESTED_AUTH_VALUE)
            .send()
            .await?;

        if probe.status() != StatusCode::UNAUTHORIZED {
            return Err(SinkError::Auth(format!("expected 401 challenge from {url}, got {}", probe.status())));
        }

        let header = probe
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SinkError::Auth("no WWW-Authenticate header in digest challenge".into()))?;

        let parsed = parse_challenge(header)?;
        *self.challenge.lock().expect("digest mutex poisoned") = Some(parsed);
        Ok(())
    }

    fn header_value(&self, method: &str, uri_path: &str) -> SinkResult<String> {
        let guard = self.challenge.lock().expect("digest mutex poisoned");
        let challenge = guard.as_ref().ok_or_else(|| SinkError::Auth("digest challenge not primed".into()))?;

        let nc = challenge.nc.fetch_add(1, Ordering::SeqCst) + 1;
        let nc_str = format!("{nc:08x}");
        let cnonce = random_cnonce();

        let ha1 = md5_hex(&format!("{}:{}:{}", self.user, challenge.realm, self.password));
        let ha2 = md5_hex(&format!("{method}:{uri_path}"));

        let (response, qop_part) = match &challenge.qop {
            Some(qop) => {
                let response = md5_hex(&format!("{ha1}:{}:{nc_str}:{cnonce}:{qop}:{ha2}", challenge.nonce));
                (response, format!(r#", qop={qop}, nc={nc_str}, cnonce="{cnonce}""#))
            }
            None => (md5_hex(&format!("{ha1}:{}:{ha2}", challenge.nonce)), String::new()),
        };

        let opaque_part = challenge.opaque.as_ref().map(|o| format!(r#", opaque="{o}""#)).unwrap_or_default();

        Ok(format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}"{}{}"#,
            self.user, challenge.realm, challenge.nonce, uri_path, response, qop_part, opaque_part
        ))
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn random_cnonce() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 8] = rng.gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_challenge(header: &str) -> SinkResult<Challenge> {
    let rest = header
        .strip_prefix("Digest ")
        .ok_or_else(|| SinkError::Auth(format!("unsupported auth scheme: {header}")))?;

    let mut realm = None;
    let mut nonce = None;
    let mut opaque = None;
    let mut qop = None;

    for part in split_challenge_params(rest) {
        let Some((key, value)) = part.split_once('=') else { continue };
        let value = value.trim().trim_matches('"').to_string();
        match key.trim() {
            "realm" => realm = Some(value),
            "nonce" => nonce = Some(value),
            "opaque" => opaque = Some(value),
            "qop" => qop = Some(value.split(',').next().unwrap_or("auth").trim().to_string()),
            _ => {}
        }
    }

    Ok(Challenge {
        realm: realm.ok_or_else(|| SinkError::Auth("digest challenge missing realm".into()))?,
        nonce: nonce.ok_or_else(|| SinkError::Auth("digest challenge missing nonce".into()))?,
        opaque,
        qop,
        nc: AtomicU32::new(0),
    })
}

fn split_challenge_params(input: &str) -> Vec<&str> {
    // Commas inside quoted values must not split a parameter.
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts
}
