//! Management API: environments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::client::{ApiClient, SdkResponse};
use super::region::Region;

/// A reference to another platform object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    /// Referenced object ID.
    pub id: String,
}

impl ObjectReference {
    /// Creates a reference.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A `PingOne` environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    /// Environment ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Hosting region.
    #[serde(default)]
    pub region: Option<Region>,
    /// `PRODUCTION` or `SANDBOX`.
    #[serde(default, rename = "type")]
    pub environment_type: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    /// Reads one environment.
    pub async fn read_one_environment(&self, environment_id: &str) -> SdkResponse<Environment> {
        self.get(&format!("/environments/{environment_id}")).await
    }
}
