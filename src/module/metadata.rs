//! Module metadata and configuration

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of relationship a module encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleCategory {
    Family,
    Team,
    CoParenting,
    Personal,
    Memorial,
    Other,
}

impl ModuleCategory {
    pub fn slug(&self) -> &'static str {
        match self {
            ModuleCategory::Family => "family",
            ModuleCategory::Team => "team",
            ModuleCategory::CoParenting => "co-parenting",
            ModuleCategory::Personal => "personal",
            ModuleCategory::Memorial => "memorial",
            ModuleCategory::Other => "other",
        }
    }
}

impl Default for ModuleCategory {
    fn default() -> Self {
        ModuleCategory::Other
    }
}

impl fmt::Display for ModuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for ModuleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "family" => Ok(ModuleCategory::Family),
            "team" => Ok(ModuleCategory::Team),
            "co-parenting" | "coparenting" | "co_parenting" => Ok(ModuleCategory::CoParenting),
            "personal" => Ok(ModuleCategory::Personal),
            "memorial" => Ok(ModuleCategory::Memorial),
            "other" => Ok(ModuleCategory::Other),
            _ => Err(format!(
                "Unknown module category '{}'. Valid: family, team, co-parenting, personal, memorial, other",
                s
            )),
        }
    }
}

/// Identity and bookkeeping for a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// Unique module id; doubles as the group id for the missing-node protocol
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Semantic version of the module definition
    pub version: String,

    pub category: ModuleCategory,

    #[serde(default)]
    pub tags: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ModuleMetadata {
    /// New metadata at version 1.0.0, stamped now
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: ModuleCategory) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            category,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Stamp `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Optional module configuration: known keys plus an open map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Whether the hub should sync this module automatically
    #[serde(default)]
    pub auto_sync: bool,

    /// Sync interval when `auto_sync` is on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval_secs: Option<u64>,

    /// Whether the module accepts messages from other modules
    #[serde(default = "default_true")]
    pub accept_messages: bool,

    #[serde(default, flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}
