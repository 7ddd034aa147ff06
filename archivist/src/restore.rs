use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::args::RestoreArgs;
use crate::s3;

#[derive(Debug, Serialize, Deserialize)]
struct RestoreMarker {
    restore_op_id: String,
    archive_key: String,
    restored_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RestoreError {
    restore_op_id: String,
    archive_key: String,
    failed_at: chrono::DateTime<Utc>,
    reason: String,
}

fn marker_key(workspace_id: &str) -> String {
    format!("{workspace_id}/.restore_marker")
}

fn error_key(workspace_id: &str) -> String {
    format!("{workspace_id}/.restore_error")
}

/// Runs the restore job contract (§6.4): idempotency check against `.restore_marker`,
/// download + sha256 verify against `.meta`, extract to a staging dir, atomic rename into the
/// volume mount, marker written last. Writes `.restore_error` on failure, clears it on success.
pub async fn run(args: &RestoreArgs) -> Result<()> {
    let client = s3::create_client(&args.s3).await?;
    let bucket = args.s3.bucket.as_str();
    let marker_key = marker_key(&args.workspace_id);

    if let Some(marker) = read_marker(&client, bucket, &marker_key).await? {
        if marker.restore_op_id == args.restore_op_id {
            info!(restore_op_id = %args.restore_op_id, "restore already committed, skipping");
            return Ok(());
        }
    }

    match do_restore(&client, bucket, args).await {
        Ok(()) => {
            let error_key = error_key(&args.workspace_id);
            if s3::object_exists(&client, bucket, &error_key).await.unwrap_or(false) {
                s3::delete_object(&client, bucket, &error_key).await.ok();
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, restore_op_id = %args.restore_op_id, "restore failed");
            let sidecar = RestoreError {
                restore_op_id: args.restore_op_id.clone(),
                archive_key: args.archive_key.clone(),
                failed_at: Utc::now(),
                reason: format!("{e:#}"),
            };
            let body = serde_json::to_vec(&sidecar).context("failed to encode .restore_error")?;
            s3::put_object_bytes(&client, bucket, &error_key(&args.workspace_id), body).await.ok();
            Err(e)
        }
    }
}

async fn do_restore(client: &aws_sdk_s3::Client, bucket: &str, args: &RestoreArgs) -> Result<()> {
    let meta_key = format!("{}.meta", args.archive_key);
    let expected_sha256 = read_meta_digest(client, bucket, &meta_key).await?;

    info!(archive_key = %args.archive_key, "downloading archive");
    let data = s3::get_object_bytes(client, bucket, &args.archive_key).await?;

    let actual = hex::encode(Sha256::digest(&data));
    if actual != expected_sha256 {
        bail!("sha256 mismatch for {}: expected {expected_sha256}, got {actual}", args.archive_key);
    }

    let staging = tempfile::tempdir_in(
        Path::new(&args.volume_path)
            .parent()
            .unwrap_or_else(|| Path::new("/tmp")),
    )
    .context("failed to create staging dir")?;

    extract_tar_zstd(&data, staging.path())?;

    let volume_path = Path::new(&args.volume_path);
    if volume_path.exists() {
        std::fs::remove_dir_all(volume_path).context("failed to clear existing volume contents")?;
    }
    std::fs::rename(staging.path(), volume_path).context("failed to atomically swap staged restore into volume mount")?;
    staging.into_path(); // already renamed away; don't let the guard try to remove it again

    let marker = RestoreMarker {
        restore_op_id: args.restore_op_id.clone(),
        archive_key: args.archive_key.clone(),
        restored_at: Utc::now(),
    };
    let marker_body = serde_json::to_vec(&marker).context("failed to encode .restore_marker")?;
    s3::put_object_bytes(client, bucket, &marker_key(&args.workspace_id), marker_body).await?;

    info!(restore_op_id = %args.restore_op_id, "restore complete");
    Ok(())
}

async fn read_marker(client: &aws_sdk_s3::Client, bucket: &str, key: &str) -> Result<Option<RestoreMarker>> {
    if !s3::object_exists(client, bucket, key).await? {
        return Ok(None);
    }
    let bytes = s3::get_object_bytes(client, bucket, key).await?;
    let marker: RestoreMarker = serde_json::from_slice(&bytes).context("failed to decode .restore_marker")?;
    Ok(Some(marker))
}

async fn read_meta_digest(client: &aws_sdk_s3::Client, bucket: &str, meta_key: &str) -> Result<String> {
    let bytes = s3::get_object_bytes(client, bucket, meta_key)
        .await
        .with_context(|| format!("missing commit marker {meta_key}"))?;
    let text = String::from_utf8(bytes).context("commit marker is not valid utf-8")?;
    parse_meta_digest(text.trim())
}

fn parse_meta_digest(line: &str) -> Result<String> {
    line.strip_prefix("sha256:")
        .map(str::to_string)
        .with_context(|| format!("malformed commit marker: {line}"))
}

fn extract_tar_zstd(data: &[u8], dest: &Path) -> Result<()> {
    let decoder = zstd::stream::read::Decoder::new(data).context("failed to open zstd stream")?;
    let mut archive = tar::Archive::new(decoder);
    for entry in archive.entries().context("failed to read tar entries")? {
        let mut entry = entry.context("failed to read tar entry")?;
        let path = entry.path().context("failed to read entry path")?.into_owned();
        if path.is_absolute() || path.components().any(|c| c == std::path::Component::ParentDir) {
            bail!("refusing to extract unsafe path entry: {}", path.display());
        }
    }
    // `entries()` can only be consumed once; reopen for the actual unpack after validation.
    let decoder = zstd::stream::read::Decoder::new(data).context("failed to reopen zstd stream")?;
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest).context("failed to unpack archive into staging dir")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_digest_line() {
        assert_eq!(parse_meta_digest("sha256:abc123").unwrap(), "abc123");
    }

    #[test]
    fn rejects_malformed_digest_line() {
        assert!(parse_meta_digest("abc123").is_err());
        assert!(parse_meta_digest("md5:abc123").is_err());
    }

    #[test]
    fn extract_rejects_archives_with_parent_traversal() {
        let encoder = zstd::stream::write::Encoder::new(Vec::new(), 3).unwrap();
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(0);
        header.set_cksum();
        builder.append_data(&mut header, "../evil", std::io::empty()).unwrap();
        let encoder = builder.into_inner().unwrap();
        let data = encoder.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        assert!(extract_tar_zstd(&data, dir.path()).is_err());
    }
}
