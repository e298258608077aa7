//! The synchronized document: named packing profiles plus sync metadata.
//!
//! Field names follow the wire format used by all PackTrack clients
//! (camelCase for the structural fields, the original snake_case for the
//! per-profile settings). Every mapping is a `BTreeMap` so that a document
//! always serializes to the same bytes regardless of insertion order; the
//! merge engine relies on that for deterministic output.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// All per-item timestamps and sync watermarks use this resolution.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Top-level sync metadata carried by every document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    /// When the document was last pushed or merged, in epoch milliseconds
    #[serde(rename = "lastSyncAt", default)]
    pub last_sync_at: i64,
    /// Monotonically increasing counter, bumped on every successful cycle
    #[serde(default)]
    pub version: u64,
}

/// Per-profile sync watermark.
///
/// Decides which side's non-mergeable settings win during a merge:
/// the profile whose watermark is strictly newer was synced more recently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSyncMeta {
    #[serde(rename = "lastSyncAt", default)]
    pub last_sync_at: i64,
}

/// One named checklist with its display settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Checklist item values, keyed by item id
    #[serde(rename = "checklistData", default)]
    pub checklist_data: BTreeMap<String, Value>,
    /// Last local mutation time per item, in epoch milliseconds
    #[serde(rename = "checklistTimestamps", default)]
    pub checklist_timestamps: BTreeMap<String, i64>,
    /// Opaque display settings; merged wholesale, never field-by-field
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub style: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub journey: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub hide_completed: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub collapsed: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub map_settings: Value,
    #[serde(rename = "syncMeta", default)]
    pub sync_meta: ProfileSyncMeta,
}

impl Profile {
    /// Sets a checklist item and stamps its mutation time.
    ///
    /// The timestamp invariant lives here: an item value is never written
    /// without its per-item timestamp.
    pub fn set_item(&mut self, item_id: impl Into<String>, value: Value, now_ms: i64) {
        let item_id = item_id.into();
        self.checklist_timestamps.insert(item_id.clone(), now_ms);
        self.checklist_data.insert(item_id, value);
    }

    /// Returns a checklist item value, if present.
    pub fn item(&self, item_id: &str) -> Option<&Value> {
        self.checklist_data.get(item_id)
    }

    /// Returns an item's last mutation time, defaulting to 0 when unstamped.
    pub fn item_timestamp(&self, item_id: &str) -> i64 {
        self.checklist_timestamps.get(item_id).copied().unwrap_or(0)
    }

    /// Copies the non-mergeable settings block (and its watermark) from
    /// another profile.
    pub(crate) fn adopt_settings(&mut self, other: &Profile) {
        self.style = other.style.clone();
        self.journey = other.journey.clone();
        self.hide_completed = other.hide_completed.clone();
        self.collapsed = other.collapsed.clone();
        self.map_settings = other.map_settings.clone();
        self.sync_meta = other.sync_meta.clone();
    }
}

/// The full synchronized state unit: all profiles plus sync metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    #[serde(rename = "syncMeta", default)]
    pub sync_meta: SyncMeta,
}

impl Document {
    /// Serializes to the UTF-8 JSON wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a document from its JSON wire format.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns a profile by name, creating an empty one if absent.
    pub fn profile_mut(&mut self, name: impl Into<String>) -> &mut Profile {
        self.profiles.entry(name.into()).or_default()
    }

    /// Whether two documents hold the same profile data, ignoring the
    /// top-level sync metadata (which changes on every cycle).
    pub fn same_profiles(&self, other: &Document) -> bool {
        self.profiles == other.profiles
    }
}
