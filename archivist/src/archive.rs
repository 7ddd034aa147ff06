use std::path::Path;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::args::ArchiveArgs;
use crate::s3;

/// Runs the archive job contract (§6.3, §6.4): idempotency check, tar+zstd the volume,
/// compute sha256, upload `tar.zst` first then the `.meta` commit marker.
pub async fn run(args: &ArchiveArgs) -> Result<()> {
    let client = s3::create_client(&args.s3).await?;
    let bucket = args.s3.bucket.as_str();
    let data_key = data_key(&args.s3.prefix, &args.workspace_id, &args.archive_op_id);
    let meta_key = meta_key(&data_key);

    if s3::object_exists(&client, bucket, &data_key).await?
        && s3::object_exists(&client, bucket, &meta_key).await?
    {
        info!(%data_key, "archive already committed, skipping");
        return Ok(());
    }

    let volume_path = Path::new(&args.volume_path);
    if !volume_path.is_dir() {
        bail!("volume path {} is not a directory", args.volume_path);
    }

    info!(volume = %args.volume_path, level = args.zstd_level, "compressing volume");
    let archive_bytes = tar_zstd(volume_path, args.zstd_level)?;

    let digest = Sha256::digest(&archive_bytes);
    let meta_body = format!("sha256:{}", hex::encode(digest)).into_bytes();

    info!(%data_key, bytes = archive_bytes.len(), "uploading archive data");
    s3::put_object_bytes(&client, bucket, &data_key, archive_bytes).await?;

    info!(%meta_key, "committing archive marker");
    s3::put_object_bytes(&client, bucket, &meta_key, meta_body).await?;

    info!(%data_key, "archive complete");
    Ok(())
}

pub fn data_key(prefix: &str, workspace_id: &str, archive_op_id: &str) -> String {
    format!("{prefix}{workspace_id}/{archive_op_id}/home.tar.zst")
}

pub fn meta_key(data_key: &str) -> String {
    format!("{data_key}.meta")
}

/// Streams a tar archive of `root` through a zstd encoder, rejecting entries that escape the
/// volume (absolute paths, `..`) or aren't plain files/directories/symlinks (§6.4).
fn tar_zstd(root: &Path, level: i32) -> Result<Vec<u8>> {
    let encoder = zstd::stream::write::Encoder::new(Vec::new(), level)
        .context("failed to create zstd encoder")?;
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    append_dir(&mut builder, root, root)?;
    let encoder = builder.into_inner().context("failed to finish tar stream")?;
    encoder.finish().context("failed to finish zstd stream")
}

fn append_dir<W: std::io::Write>(builder: &mut tar::Builder<W>, root: &Path, dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        let relative = path.strip_prefix(root).context("entry outside archive root")?;

        if relative.is_absolute() || relative.components().any(|c| c == std::path::Component::ParentDir) {
            bail!("refusing to archive unsafe path entry: {}", relative.display());
        }

        if file_type.is_dir() {
            builder.append_dir(relative, path.as_path())?;
            append_dir(builder, root, &path)?;
        } else if file_type.is_file() {
            let mut file = std::fs::File::open(&path)?;
            builder.append_file(relative, &mut file)?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(&path)?;
            let metadata = std::fs::symlink_metadata(&path)?;
            let mut header = tar::Header::new_gnu();
            header.set_metadata(&metadata);
            builder.append_link(&mut header, relative, target.as_path())?;
        }
        // device/socket/fifo entries are silently excluded per §6.4.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_key_joins_prefix_workspace_and_op() {
        assert_eq!(data_key("", "ws1", "op1"), "ws1/op1/home.tar.zst");
        assert_eq!(data_key("codehub/", "ws1", "op1"), "codehub/ws1/op1/home.tar.zst");
    }

    #[test]
    fn meta_key_appends_suffix() {
        assert_eq!(meta_key("ws1/op1/home.tar.zst"), "ws1/op1/home.tar.zst.meta");
    }

    #[test]
    fn round_trips_a_small_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"world").unwrap();

        let archive = tar_zstd(dir.path(), 3).unwrap();
        assert!(!archive.is_empty());

        let decoder = zstd::stream::read::Decoder::new(archive.as_slice()).unwrap();
        let mut tar = tar::Archive::new(decoder);
        let names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().any(|n| n.contains("a.txt")));
        assert!(names.iter().any(|n| n.contains("b.txt")));
    }
}
