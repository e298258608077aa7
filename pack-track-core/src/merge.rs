//! Deterministic two-snapshot merge.
//!
//! Reconciles a local and a remote document into one using last-writer-wins
//! at checklist-item granularity, so interleaved edits to different items
//! on different devices are all preserved. There is no coordination and no
//! user intervention: every conflict resolves through the timestamp rules
//! below, and merging the same two inputs always yields byte-identical
//! output.

use crate::document::Document;

/// Merges a remote snapshot into a local one.
///
/// Rules:
/// - `remote` of `None` means nothing has ever been pushed; the local
///   document is returned unchanged (first sync is push-only).
/// - Profiles present only in the remote are adopted wholesale.
/// - For profiles present on both sides, each item in the remote's
///   checklist is compared by per-item timestamp (missing stamps count
///   as 0): the remote value and stamp are adopted only when the remote
///   stamp is strictly greater. Ties keep local, so a merged timestamp
///   never decreases.
/// - The non-mergeable settings block (style, journey, hide_completed,
///   collapsed, map_settings) is taken wholesale from whichever profile
///   has the strictly newer per-profile sync watermark; item-level merge
///   is meaningless for these, so the last synced device wins.
/// - When a remote exists, the result's version is
///   `max(local, remote) + 1` and its `lastSyncAt` is `now_ms`.
pub fn merge(local: &Document, remote: Option<&Document>, now_ms: i64) -> Document {
    let Some(remote) = remote else {
        return local.clone();
    };

    let mut merged = local.clone();

    for (name, remote_profile) in &remote.profiles {
        match merged.profiles.get_mut(name) {
            None => {
                merged.profiles.insert(name.clone(), remote_profile.clone());
            }
            Some(local_profile) => {
                for (item_id, remote_value) in &remote_profile.checklist_data {
                    let remote_ts = remote_profile.item_timestamp(item_id);
                    let local_ts = local_profile.item_timestamp(item_id);
                    if remote_ts > local_ts {
                        local_profile
                            .checklist_data
                            .insert(item_id.clone(), remote_value.clone());
                        local_profile
                            .checklist_timestamps
                            .insert(item_id.clone(), remote_ts);
                    }
                }

                if remote_profile.sync_meta.last_sync_at > local_profile.sync_meta.last_sync_at {
                    local_profile.adopt_settings(remote_profile);
                }
            }
        }
    }

    merged.sync_meta.version = local.sync_meta.version.max(remote.sync_meta.version) + 1;
    merged.sync_meta.last_sync_at = now_ms;
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Profile;
    use serde_json::json;

    fn doc_with_item(profile: &str, item: &str, value: serde_json::Value, ts: i64) -> Document {
        let mut doc = Document::default();
        doc.profile_mut(profile).set_item(item, value, ts);
        doc
    }

    #[test]
    fn test_null_remote_returns_local_unchanged() {
        // First-ever sync is push-only.
        let local = doc_with_item("Trip", "itemX", json!(true), 100);
        let merged = merge(&local, None, 999);
        assert_eq!(merged, local);
    }

    #[test]
    fn test_local_newer_wins() {
        let local = doc_with_item("Trip", "itemX", json!(true), 200);
        let remote = doc_with_item("Trip", "itemX", json!(false), 100);

        let merged = merge(&local, Some(&remote), 999);
        let profile = &merged.profiles["Trip"];
        assert_eq!(profile.item("itemX"), Some(&json!(true)));
        assert_eq!(profile.item_timestamp("itemX"), 200);
    }

    #[test]
    fn test_remote_newer_wins() {
        let local = doc_with_item("Trip", "itemX", json!(true), 100);
        let remote = doc_with_item("Trip", "itemX", json!(false), 200);

        let merged = merge(&local, Some(&remote), 999);
        let profile = &merged.profiles["Trip"];
        assert_eq!(profile.item("itemX"), Some(&json!(false)));
        assert_eq!(profile.item_timestamp("itemX"), 200);
    }

    #[test]
    fn test_tie_keeps_local() {
        let local = doc_with_item("Trip", "itemX", json!("local"), 150);
        let remote = doc_with_item("Trip", "itemX", json!("remote"), 150);

        let merged = merge(&local, Some(&remote), 999);
        assert_eq!(merged.profiles["Trip"].item("itemX"), Some(&json!("local")));
    }

    #[test]
    fn test_remote_only_profile_adopted_verbatim() {
        let local = doc_with_item("Trip", "itemA", json!(true), 100);
        let mut remote = Document::default();
        remote.profile_mut("Trip2").set_item("tent", json!(true), 50);
        remote.profile_mut("Trip2").style = json!({"theme": "forest"});

        let merged = merge(&local, Some(&remote), 999);
        assert_eq!(merged.profiles["Trip2"], remote.profiles["Trip2"]);
        assert!(merged.profiles.contains_key("Trip"));
    }

    #[test]
    fn test_no_loss_on_disjoint_edits() {
        // Both sides derive from a common ancestor and edit different items.
        let mut ancestor = Document::default();
        ancestor.profile_mut("Trip").set_item("itemA", json!(false), 10);
        ancestor.profile_mut("Trip").set_item("itemB", json!(false), 10);

        let mut local = ancestor.clone();
        local.profile_mut("Trip").set_item("itemA", json!(true), 100);
        let mut remote = ancestor.clone();
        remote.profile_mut("Trip").set_item("itemB", json!(true), 120);

        let merged = merge(&local, Some(&remote), 999);
        let profile = &merged.profiles["Trip"];
        assert_eq!(profile.item("itemA"), Some(&json!(true)));
        assert_eq!(profile.item("itemB"), Some(&json!(true)));
    }

    #[test]
    fn test_merged_timestamp_is_max_of_sides() {
        let local = doc_with_item("Trip", "itemX", json!(1), 300);
        let remote = doc_with_item("Trip", "itemX", json!(2), 700);

        let merged = merge(&local, Some(&remote), 999);
        assert_eq!(merged.profiles["Trip"].item_timestamp("itemX"), 700);

        let merged = merge(&remote, Some(&local), 999);
        assert_eq!(merged.profiles["Trip"].item_timestamp("itemX"), 700);
    }

    #[test]
    fn test_self_merge_is_idempotent_on_profiles() {
        let mut doc = doc_with_item("Trip", "itemX", json!(true), 100);
        doc.profile_mut("Trip").collapsed = json!(["section1"]);
        doc.profile_mut("Other").set_item("itemY", json!("packed"), 55);

        let merged = merge(&doc, Some(&doc), 999);
        assert!(merged.same_profiles(&doc));
    }

    #[test]
    fn test_repeated_merge_byte_identical() {
        let local = doc_with_item("Trip", "itemA", json!(true), 100);
        let remote = doc_with_item("Trip", "itemB", json!(false), 200);

        let first = merge(&local, Some(&remote), 424242);
        let second = merge(&local, Some(&remote), 424242);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_settings_follow_newer_watermark() {
        let mut local = Document::default();
        let mut local_profile = Profile::default();
        local_profile.style = json!({"theme": "dark"});
        local_profile.hide_completed = json!(false);
        local_profile.sync_meta.last_sync_at = 100;
        local.profiles.insert("Trip".to_string(), local_profile);

        let mut remote = local.clone();
        let remote_profile = remote.profiles.get_mut("Trip").unwrap();
        remote_profile.style = json!({"theme": "light"});
        remote_profile.hide_completed = json!(true);
        remote_profile.sync_meta.last_sync_at = 200;

        let merged = merge(&local, Some(&remote), 999);
        let profile = &merged.profiles["Trip"];
        assert_eq!(profile.style, json!({"theme": "light"}));
        assert_eq!(profile.hide_completed, json!(true));
        assert_eq!(profile.sync_meta.last_sync_at, 200);
    }

    #[test]
    fn test_settings_tie_keeps_local() {
        let mut local = Document::default();
        local.profile_mut("Trip").style = json!("local");
        local.profile_mut("Trip").sync_meta.last_sync_at = 100;

        let mut remote = Document::default();
        remote.profile_mut("Trip").style = json!("remote");
        remote.profile_mut("Trip").sync_meta.last_sync_at = 100;

        let merged = merge(&local, Some(&remote), 999);
        assert_eq!(merged.profiles["Trip"].style, json!("local"));
    }

    #[test]
    fn test_version_is_max_plus_one() {
        let mut local = doc_with_item("Trip", "x", json!(1), 1);
        local.sync_meta.version = 3;
        let mut remote = doc_with_item("Trip", "y", json!(2), 2);
        remote.sync_meta.version = 7;

        let merged = merge(&local, Some(&remote), 555);
        assert_eq!(merged.sync_meta.version, 8);
        assert_eq!(merged.sync_meta.last_sync_at, 555);
    }

    #[test]
    fn test_remote_item_unknown_locally_is_adopted() {
        let local = doc_with_item("Trip", "itemA", json!(true), 100);
        let remote = doc_with_item("Trip", "itemNew", json!("rope"), 5);

        let merged = merge(&local, Some(&remote), 999);
        // Local has no stamp for itemNew (0), remote stamp 5 wins.
        assert_eq!(merged.profiles["Trip"].item("itemNew"), Some(&json!("rope")));
    }
}
