//! Persisted environment record
//!
//! One `StoredRecord` per environment identity. Paths inside a record are
//! kept in portable form (see `paths`) so a record can be replayed from a
//! different filesystem root. Fields are optional so older store files keep
//! loading as the format grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Declarative settings saved for one environment identity.
///
/// `project_path` is double-optional: a missing field means "never
/// recorded" (defaults apply on merge), while an explicit JSON `null` means
/// "recorded as having no project" (anonymous/VM environments).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Space-joined runtime invocation, present only when overridden.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub persist: bool,
    /// Host:container port pairs, normalized at save time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_path: Option<Option<String>>,
    /// Socket sharing, present only when explicitly chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

/// Distinguishes a missing field from an explicit `null`.
fn double_option<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}
