//! The Source Adapter: the only module that speaks the video-conferencing
//! provider's HTTP API (§4.2).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ZoomConfig;
use crate::domain::User;
use crate::storage::Repository;

use super::error::{SourceError, SourceResult};
use super::jwt::CredentialMinter;
use super::models::{strip_zero_width_typed, RecordingObject, RecordingsPage, SourceUser, UserSearchPage};
use super::retry::RetryPolicy;

const US_BASE_URL: &str = "https://api.zoom.us/v2";
const GDPR_BASE_URL: &str = "https://eu01api-zoom.us/v2";

/// Bounded, insertion-order-evicting cache for `get_user` lookups, matching
/// the donor's `lru_cache(maxsize=32)` memoization.
struct UserCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, SourceUser>,
}

impl UserCache {
    fn new(capacity: usize) -> Self {
        Self { capacity, order: VecDeque::new(), entries: HashMap::new() }
    }

    fn get(&self, key: &str) -> Option<SourceUser> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, user: SourceUser) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
            if self.order.len() > self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
        }
        self.entries.insert(key, user);
    }
}

/// HTTP client over the video-conferencing provider's cloud recording API.
pub struct SourceClient {
    http: Client,
    credentials: CredentialMinter,
    retry: RetryPolicy,
    base_url: String,
    user_cache: Mutex<UserCache>,
    repo: Option<Arc<Repository>>,
}

impl SourceClient {
    pub fn new(config: &ZoomConfig) -> SourceResult<Self> {
        Self::with_repository(config, None)
    }

    /// Like [`new`], but write-throughs every `get_user` lookup into
    /// Persistence's User table (§3, §4.2) in addition to this adapter's own
    /// bounded in-memory cache.
    pub fn with_repository(config: &ZoomConfig, repo: Option<Arc<Repository>>) -> SourceResult<Self> {
        let base_url = if config.gdpr { GDPR_BASE_URL } else { US_BASE_URL }.to_string();
        Self::build(config, repo, base_url)
    }

    /// Test seam: points this client at a local mock server instead of the
    /// real Source API, the way the donor's SDK tests swap in a fixture
    /// server rather than mocking at the `reqwest` layer.
    #[doc(hidden)]
    pub fn with_base_url_for_testing(config: &ZoomConfig, base_url: impl Into<String>) -> SourceResult<Self> {
        Self::build(config, None, base_url.into())
    }

    fn build(config: &ZoomConfig, repo: Option<Arc<Repository>>, base_url: String) -> SourceResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(SourceError::Http)?;

        Ok(Self {
            http,
            credentials: CredentialMinter::new(config.jwt_key.clone(), &config.jwt_secret),
            retry: RetryPolicy::new(),
            base_url,
            user_cache: Mutex::new(UserCache::new(32)),
            repo,
        })
    }

    /// Returns the bearer credential to attach to Sink-facing download URLs.
    pub fn download_token(&self) -> SourceResult<String> {
        self.credentials.get_download_token()
    }

    #[instrument(skip(self))]
    pub async fn get_recording(&self, uuid: &str) -> SourceResult<RecordingObject> {
        let encoded = encode_uuid(uuid);
        let path = format!("/meetings/{encoded}/recordings");
        let value: Value = self.get_json(&path).await?;
        let value = strip_zero_width_typed(value)?;
        let object: RecordingObject = serde_json::from_value(value)?;
        Ok(object)
    }

    /// Lists `user_id`'s meeting recordings in `[from_date, to_date]`
    /// (defaults: seven days ago through today), applying `min_duration`
    /// (minutes) as a post-fetch filter since the provider's API has no
    /// server-side duration filter (§4.2).
    #[instrument(skip(self))]
    pub async fn list_user_recordings(
        &self,
        user_id: &str,
        from_date: Option<chrono::NaiveDate>,
        to_date: Option<chrono::NaiveDate>,
        page_size: Option<u32>,
        min_duration: Option<i64>,
        page_token: Option<&str>,
    ) -> SourceResult<RecordingsPage> {
        let from_date = from_date.unwrap_or_else(|| (chrono::Utc::now() - chrono::Duration::days(7)).date_naive());
        let to_date = to_date.unwrap_or_else(|| chrono::Utc::now().date_naive());
        let page_size = page_size.unwrap_or(30);

        let mut path = format!(
            "/users/{}/recordings?page_size={page_size}&from={from_date}&to={to_date}&type=meeting_recordings",
            utf8_percent_encode(user_id, NON_ALPHANUMERIC)
        );
        if let Some(token) = page_token {
            path.push_str(&format!("&next_page_token={}", utf8_percent_encode(token, NON_ALPHANUMERIC)));
        }

        let mut page: RecordingsPage = self.get_json(&path).await?;
        page = strip_zero_width_typed(page).map_err(SourceError::from)?;
        if let Some(min_duration) = min_duration {
            page.meetings.retain(|m| m.duration >= min_duration);
        }
        Ok(page)
    }

    /// Looks up a user by id or email, consulting (and populating) the
    /// bounded in-memory cache before issuing a request.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id_or_email: &str) -> SourceResult<SourceUser> {
        if let Some(cached) = self.user_cache.lock().expect("user cache mutex poisoned").get(id_or_email) {
            debug!(user = id_or_email, "user cache hit");
            return Ok(cached);
        }

        let path = format!("/users/{}", utf8_percent_encode(id_or_email, NON_ALPHANUMERIC));
        let user: SourceUser = self.get_json(&path).await?;
        let user = strip_zero_width_typed(user)?;

        self.user_cache.lock().expect("user cache mutex poisoned").insert(id_or_email.to_string(), user.clone());

        if let Some(repo) = &self.repo {
            let cached = User {
                user_id: user.id.clone(),
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                updated_at: chrono::Utc::now(),
            };
            if let Err(e) = repo.upsert_user(&cached).await {
                warn!(user = id_or_email, error = %e, "failed to write through user lookup into persistence");
            }
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn search_users(&self, query: &str, page_token: Option<&str>) -> SourceResult<UserSearchPage> {
        let mut path = format!("/users?query={}&page_size=30", utf8_percent_encode(query, NON_ALPHANUMERIC));
        if let Some(token) = page_token {
            path.push_str(&format!("&next_page_token={}", utf8_percent_encode(token, NON_ALPHANUMERIC)));
        }
        let page: UserSearchPage = self.get_json(&path).await?;
        strip_zero_width_typed(page).map_err(SourceError::from)
    }

    async fn get_json<T: for<'de> serde::Deserialize<'de>>(&self, path: &str) -> SourceResult<T> {
        let url = format!("{}{}", self.base_url, path);
        self.retry
            .execute(|| async {
                let token = self.credentials.get_download_token()?;
                let response = self.http.get(&url).bearer_auth(&token).send().await?;
                let status = response.status();
                if status == StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(1);
                    return Err(SourceError::RateLimited { retry_after_secs });
                }
                if status == StatusCode::NOT_FOUND {
                    return Err(SourceError::NotFound(url.clone()));
                }
                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(SourceError::Api { status: status.as_u16(), message });
                }
                response.json::<T>().await.map_err(SourceError::Http)
            })
            .await
    }
}

/// The video-conferencing provider's recording uuids that start with `/` or
/// contain `//` must be percent-encoded twice before use in a URL path
/// segment, or the platform's own router mis-splits the path.
pub fn encode_uuid(uuid: &str) -> String {
    let once = utf8_percent_encode(uuid, NON_ALPHANUMERIC).to_string();
    if uuid.starts_with('/') || uuid.contains("//") {
        utf8_percent_encode(&once, NON_ALPHANUMERIC).to_string()
    } else {
        once
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_uuid_is_encoded_once() {
        let encoded = encode_uuid("abc123==");
        assert_eq!(encoded, "abc123%3D%3D");
    }

    #[test]
    fn uuid_starting_with_slash_is_encoded_twice() {
        let encoded = encode_uuid("/ABC123==");
        let once = utf8_percent_encode("/ABC123==", NON_ALPHANUMERIC).to_string();
        let twice = utf8_percent_encode(&once, NON_ALPHANUMERIC).to_string();
        assert_eq!(encoded, twice);
        assert!(!encoded.contains('/'));
    }

    #[test]
    fn uuid_with_double_slash_is_encoded_twice() {
        let encoded = encode_uuid("AB//CD==");
        assert!(!encoded.contains('/'));
        assert!(encoded.contains("%25"));
    }

    #[test]
    fn user_cache_evicts_oldest_beyond_capacity() {
        let mut cache = UserCache::new(2);
        cache.insert("a".into(), SourceUser { id: "a".into(), email: "a@x".into(), first_name: "A".into(), last_name: "A".into() });
        cache.insert("b".into(), SourceUser { id: "b".into(), email: "b@x".into(), first_name: "B".into(), last_name: "B".into() });
        cache.insert("c".into(), SourceUser { id: "c".into(), email: "c@x".into(), first_name: "C".into(), last_name: "C".into() });

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }
}
