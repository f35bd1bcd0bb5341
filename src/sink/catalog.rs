//! Catalog Cache: four TTL-refreshing in-memory maps of Sink artifacts
//! (§2 item 1, §4.3 Catalogs, §5 Shared state & locking).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tracing::{error, warn};

use super::error::SinkResult;
use super::http::AuthedHttp;

const CATALOG_TTL: Duration = Duration::from_secs(3600);
const MAX_REFRESH_ATTEMPTS: usize = 5;
const REFRESH_BACKOFF_UNIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct AclEntry {
    pub role: String,
    pub action: String,
    pub allow: bool,
}

#[derive(Debug, Clone)]
pub struct AclRecord {
    pub id: String,
    pub name: String,
    pub entries: Vec<AclEntry>,
}

#[derive(Debug, Clone)]
pub struct WorkflowDef {
    pub id: String,
    pub title: String,
}

struct Snapshot<V> {
    data: HashMap<String, V>,
    refreshed_at: Instant,
}

impl<V> Snapshot<V> {
    fn stale(&self) -> bool {
        self.refreshed_at.elapsed() > CATALOG_TTL
    }
}

/// A single TTL-refreshing catalog map, single-writer-per-catalog: a
/// refresh already in flight means other callers simply read the (possibly
/// stale) current snapshot rather than piling on duplicate refreshes.
struct RefreshingCatalog<V: Clone + Send + Sync + 'static> {
    name: &'static str,
    state: RwLock<Option<Arc<Snapshot<V>>>>,
    refresh_lock: AsyncMutex<()>,
}

impl<V: Clone + Send + Sync + 'static> RefreshingCatalog<V> {
    fn new(name: &'static str) -> Self {
        Self { name, state: RwLock::new(None), refresh_lock: AsyncMutex::new(()) }
    }

    /// Returns the current snapshot, refreshing it first if stale or absent
    /// and no refresh is already in flight. A failed refresh leaves the
    /// previous snapshot (if any) in place and only logs.
    async fn get_all<F, Fut>(&self, fetch: F) -> HashMap<String, V>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = SinkResult<HashMap<String, V>>>,
    {
        let needs_refresh = match self.state.read().await.as_ref() {
            None => true,
            Some(snapshot) => snapshot.stale(),
        };

        if needs_refresh {
            if let Ok(_guard) = self.refresh_lock.try_lock() {
                match refresh_with_retry(self.name, fetch).await {
                    Ok(data) => {
                        let snapshot = Arc::new(Snapshot { data, refreshed_at: Instant::now() });
                        *self.state.write().await = Some(snapshot);
                    }
                    Err(e) => {
                        error!(catalog = self.name, error = %e, "catalog refresh exhausted retries, keeping previous snapshot");
                    }
                }
            } else {
                warn!(catalog = self.name, "refresh already in flight, serving stale snapshot");
            }
        }

        self.state.read().await.as_ref().map(|s| s.data.clone()).unwrap_or_default()
    }
}

async fn refresh_with_retry<V, F, Fut>(name: &str, fetch: F) -> SinkResult<HashMap<String, V>>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = SinkResult<HashMap<String, V>>>,
{
    let mut attempts = 0;
    let mut last_error = None;
    while attempts < MAX_REFRESH_ATTEMPTS {
        attempts += 1;
        match fetch().await {
            Ok(data) => return Ok(data),
            Err(e) => {
                warn!(catalog = name, attempt = attempts, error = %e, "catalog refresh attempt failed");
                last_error = Some(e);
                if attempts < MAX_REFRESH_ATTEMPTS {
                    tokio::time::sleep(REFRESH_BACKOFF_UNIT * attempts as u32).await;
                }
            }
        }
    }
    Err(last_error.expect("at least one attempt recorded an error"))
}

/// The four Sink catalogs (§4.3).
pub struct CatalogCache {
    http: Arc<AuthedHttp>,
    workflow_filter: Vec<String>,
    series_filter: Regex,
    acls: RefreshingCatalog<AclRecord>,
    themes: RefreshingCatalog<String>,
    workflows: RefreshingCatalog<String>,
    series: RefreshingCatalog<String>,
}

impl CatalogCache {
    pub fn new(http: Arc<AuthedHttp>, workflow_filter_raw: &str, series_filter_raw: &str) -> SinkResult<Self> {
        let workflow_filter = workflow_filter_raw.split_whitespace().map(|s| s.to_string()).collect();
        let series_filter_pattern = if series_filter_raw.is_empty() { ".*".to_string() } else { series_filter_raw.to_string() };
        let series_filter = Regex::new(&series_filter_pattern).map_err(|e| super::error::SinkError::Config(e.to_string()))?;

        Ok(Self {
            http,
            workflow_filter,
            series_filter,
            acls: RefreshingCatalog::new("acls"),
            themes: RefreshingCatalog::new("themes"),
            workflows: RefreshingCatalog::new("workflows"),
            series: RefreshingCatalog::new("series"),
        })
    }

    pub async fn acls(&self) -> HashMap<String, AclRecord> {
        self.acls.get_all(|| self.fetch_acls()).await
    }

    pub async fn themes(&self) -> HashMap<String, String> {
        self.themes.get_all(|| self.fetch_themes()).await
    }

    pub async fn workflows(&self) -> HashMap<String, String> {
        self.workflows.get_all(|| self.fetch_workflows()).await
    }

    pub async fn series(&self) -> HashMap<String, String> {
        self.series.get_all(|| self.fetch_series()).await
    }

    /// Readiness probe (§10.4): true once every catalog has completed at
    /// least one successful refresh since startup. Never triggers a
    /// refresh itself — a cold cache simply reports not-yet-ready.
    pub async fn has_refreshed_all(&self) -> bool {
        self.acls.state.read().await.is_some()
            && self.themes.state.read().await.is_some()
            && self.workflows.state.read().await.is_some()
            && self.series.state.read().await.is_some()
    }

    pub async fn get_single_acl(&self, id: &str) -> SinkResult<Option<AclRecord>> {
        if let Some(acl) = self.acls().await.get(id) {
            return Ok(Some(acl.clone()));
        }
        let all = self.fetch_acls().await?;
        Ok(all.get(id).cloned())
    }

    async fn fetch_acls(&self) -> SinkResult<HashMap<String, AclRecord>> {
        #[derive(Deserialize)]
        struct WireAce {
            role: String,
            action: String,
            allow: bool,
        }
        #[derive(Deserialize)]
        struct WireAcl {
            id: Value,
            name: String,
            #[serde(default)]
            ace: Vec<WireAce>,
        }
        #[derive(Deserialize)]
        struct WireAcls {
            #[serde(default)]
            acl: Vec<WireAcl>,
        }

        let page: WireAcls = self.http.get_json("/acl-manager/acl/acls.json").await?;
        let mut map = HashMap::new();
        for acl in page.acl {
            let id = value_to_id_string(&acl.id);
            map.insert(
                id.clone(),
                AclRecord {
                    id,
                    name: acl.name,
                    entries: acl.ace.into_iter().map(|a| AclEntry { role: a.role, action: a.action, allow: a.allow }).collect(),
                },
            );
        }
        Ok(map)
    }

    async fn fetch_themes(&self) -> SinkResult<HashMap<String, String>> {
        #[derive(Deserialize)]
        struct WireTheme {
            id: Value,
            name: String,
        }
        #[derive(Deserialize)]
        struct WireThemesPage {
            results: Vec<WireTheme>,
            total: i64,
        }

        let mut map = HashMap::new();
        let mut offset = 0;
        loop {
            let path = format!("/admin-ng/themes/themes.json?limit=100&offset={offset}");
            let page: WireThemesPage = self.http.get_json(&path).await?;
            let got = page.results.len();
            for theme in page.results {
                map.insert(value_to_id_string(&theme.id), theme.name);
            }
            offset += got as i64;
            if got == 0 || offset >= page.total {
                break;
            }
        }
        Ok(map)
    }

    async fn fetch_workflows(&self) -> SinkResult<HashMap<String, String>> {
        #[derive(Deserialize)]
        struct WireWorkflowDef {
            id: String,
            title: String,
        }

        let defs: Vec<WireWorkflowDef> = self.http.get_json("/api/workflow-definitions?filter=tag:upload&filter=tag:schedule").await?;
        let mut map = HashMap::new();
        for def in defs {
            if self.workflow_filter.is_empty() || self.workflow_filter.contains(&def.id) {
                map.insert(def.id, def.title);
            }
        }
        Ok(map)
    }

    async fn fetch_series(&self) -> SinkResult<HashMap<String, String>> {
        #[derive(Deserialize)]
        struct WireSeries {
            id: String,
            title: String,
            #[serde(default)]
            creator: Vec<String>,
            #[serde(default)]
            created: Option<String>,
        }
        #[derive(Deserialize)]
        struct WireSeriesPage {
            #[serde(rename = "catalogs", default)]
            catalogs: Vec<WireSeries>,
            total: i64,
        }

        let mut map = HashMap::new();
        let mut offset = 0;
        loop {
            let path = format!("/api/series/series.json?count=100&offset={offset}");
            let page: WireSeriesPage = self.http.get_json(&path).await?;
            let got = page.catalogs.len();
            for series in page.catalogs {
                let display = format_series_title(&series.title, series.created.as_deref(), &series.creator);
                if self.series_filter.is_match(&series.title) {
                    map.insert(series.id, display);
                }
            }
            offset += got as i64;
            if got == 0 || offset >= page.total {
                break;
            }
        }
        Ok(map)
    }
}

fn value_to_id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `"{title} ({year}) ({creators≤50c})"`, or just `"{title} ({year})"` when
/// there are no creators (§4.3, §8 invariant 8).
pub fn format_series_title(title: &str, created: Option<&str>, creators: &[String]) -> String {
    let year = created.and_then(|c| c.get(0..4)).unwrap_or("????");
    if creators.is_empty() {
        return format!("{title} ({year})");
    }
    let joined = creators.join(", ");
    let creator_list: String = if joined.len() > 50 {
        let mut boundary = 50;
        while !joined.is_char_boundary(boundary) {
            boundary -= 1;
        }
        joined[..boundary].to_string()
    } else {
        joined
    };
    format!("{title} ({year}) ({creator_list})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_series_title_with_year_and_creators() {
        let title = format_series_title("Intro to Rust", Some("2024-02-01T00:00:00Z"), &["Alice".into(), "Bob".into()]);
        assert_eq!(title, "Intro to Rust (2024) (Alice, Bob)");
    }

    #[test]
    fn truncates_long_creator_lists_to_fifty_chars() {
        let creators: Vec<String> = (0..10).map(|i| format!("Creator Number {i}")).collect();
        let title = format_series_title("Long Course", Some("2020-01-01"), &creators);
        let paren_start = title.find('(').unwrap();
        let second_paren_start = title[paren_start + 1..].find('(').unwrap() + paren_start + 1;
        let creators_part = &title[second_paren_start + 1..title.len() - 1];
        assert!(creators_part.len() <= 50);
    }

    #[test]
    fn defaults_unknown_year_when_no_created_date() {
        let title = format_series_title("Untitled", None, &[]);
        assert_eq!(title, "Untitled (????)");
    }

    #[test]
    fn omits_empty_creator_parens_when_no_creators() {
        let title = format_series_title("Intro to Rust", Some("2024-02-01"), &[]);
        assert_eq!(title, "Intro to Rust (2024)");
    }
}
