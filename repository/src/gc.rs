use std::collections::HashSet;

use anyhow::{Context, Result};
use deadpool_postgres::Pool;

/// One row of the information GC needs about a live (non-soft-deleted) workspace.
pub struct GcCandidate {
    pub workspace_id: String,
    pub archive_key: Option<String>,
    pub archive_op_id: Option<String>,
}

pub async fn load_gc_candidates(pool: &Pool) -> Result<Vec<GcCandidate>> {
    let client = pool.get().await.context("failed to get db connection")?;
    let rows = client
        .query(
            r#"
            SELECT id::text AS workspace_id, archive_key, archive_op_id
            FROM workspaces
            WHERE deleted_at IS NULL
            "#,
            &[],
        )
        .await
        .context("failed to load GC candidates")?;

    Ok(rows
        .iter()
        .map(|r| GcCandidate {
            workspace_id: r.get("workspace_id"),
            archive_key: r.get("archive_key"),
            archive_op_id: r.get("archive_op_id"),
        })
        .collect())
}

/// Computes the protection set from the database's view of live workspaces (§4.6): every
/// committed `archive_key`, and every `{workspace_id}/{archive_op_id}/` prefix for a
/// workspace with an in-flight or retained `archive_op_id`. Once `deleted_at` is set for a
/// workspace, both protections lift — `load_gc_candidates` already excludes those rows.
pub fn compute_protected_paths(candidates: &[GcCandidate]) -> HashSet<String> {
    let mut protected = HashSet::new();
    for candidate in candidates {
        if let Some(archive_key) = &candidate.archive_key {
            protected.insert(archive_key.clone());
        }
        if let Some(archive_op_id) = &candidate.archive_op_id {
            protected.insert(format!("{}/{}/", candidate.workspace_id, archive_op_id));
        }
    }
    protected
}

/// Given every object key under the archive prefix and the protection set, returns the keys
/// eligible for deletion: not protected directly, and not nested under a protected prefix.
pub fn eligible_for_deletion(all_keys: &[String], protected: &HashSet<String>) -> Vec<String> {
    all_keys
        .iter()
        .filter(|key| {
            if protected.contains(key.as_str()) {
                return false;
            }
            !protected.iter().any(|prefix| key.starts_with(prefix))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(workspace_id: &str, archive_key: Option<&str>, archive_op_id: Option<&str>) -> GcCandidate {
        GcCandidate {
            workspace_id: workspace_id.to_string(),
            archive_key: archive_key.map(str::to_string),
            archive_op_id: archive_op_id.map(str::to_string),
        }
    }

    #[test]
    fn protects_committed_archive_key() {
        let candidates = vec![candidate("ws1", Some("ws1/op1/home.tar.zst"), None)];
        let protected = compute_protected_paths(&candidates);
        assert!(protected.contains("ws1/op1/home.tar.zst"));
    }

    #[test]
    fn protects_in_flight_archive_op_prefix() {
        let candidates = vec![candidate("ws1", None, Some("op2"))];
        let protected = compute_protected_paths(&candidates);
        assert!(protected.contains("ws1/op2/"));
    }

    #[test]
    fn orphan_under_no_protected_prefix_is_eligible() {
        let candidates = vec![candidate("ws1", Some("ws1/op1/home.tar.zst"), None)];
        let protected = compute_protected_paths(&candidates);
        let all_keys = vec![
            "ws1/op1/home.tar.zst".to_string(),
            "ws1/op1/home.tar.zst.meta".to_string(),
            "ws1/stale-op/home.tar.zst".to_string(),
        ];
        let eligible = eligible_for_deletion(&all_keys, &protected);
        assert_eq!(eligible, vec!["ws1/stale-op/home.tar.zst".to_string()]);
    }

    #[test]
    fn committed_archive_meta_sidecar_is_protected_by_prefix_match() {
        let candidates = vec![candidate("ws1", Some("ws1/op1/home.tar.zst"), None)];
        let protected = compute_protected_paths(&candidates);
        let all_keys = vec!["ws1/op1/home.tar.zst.meta".to_string()];
        assert!(eligible_for_deletion(&all_keys, &protected).is_empty());
    }
}
