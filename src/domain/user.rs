use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Write-through cache of a Source user lookup (§3). Used only for display
/// and for stable creator strings; never the system of record for identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}
