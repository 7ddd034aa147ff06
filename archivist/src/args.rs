use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compress a workspace's home volume and commit it to object storage.
    Archive(ArchiveArgs),

    /// Restore a workspace's home volume from a committed archive.
    Restore(RestoreArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct S3Args {
    #[arg(long, env = "ARCHIVE_BUCKET", required = true)]
    pub bucket: String,

    /// Key prefix under the bucket, e.g. `codehub/` (§6.3). Empty by default.
    #[arg(long, env = "ARCHIVE_KEY_PREFIX", default_value = "")]
    pub prefix: String,

    #[arg(long, env = "S3_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub region: String,
}

#[derive(Parser, Debug, Clone)]
pub struct ArchiveArgs {
    #[command(flatten)]
    pub s3: S3Args,

    #[arg(long, env = "WORKSPACE_ID")]
    pub workspace_id: String,

    /// Opaque id the Workspace Controller minted for this archive attempt (§4.4 invariants).
    #[arg(long, env = "ARCHIVE_OP_ID")]
    pub archive_op_id: String,

    /// Mount point of the workspace's home volume.
    #[arg(long, env = "VOLUME_PATH")]
    pub volume_path: String,

    /// zstd compression level, 1-22. Default 3 (speed/ratio balance).
    #[arg(long, env = "ZSTD_LEVEL", default_value_t = 3)]
    pub zstd_level: i32,
}

#[derive(Parser, Debug, Clone)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub s3: S3Args,

    #[arg(long, env = "WORKSPACE_ID")]
    pub workspace_id: String,

    /// Full key of the committed `home.tar.zst` to restore, e.g.
    /// `{workspace_id}/{archive_op_id}/home.tar.zst`.
    #[arg(long, env = "ARCHIVE_KEY")]
    pub archive_key: String,

    #[arg(long, env = "RESTORE_OP_ID")]
    pub restore_op_id: String,

    /// Mount point of the workspace's home volume.
    #[arg(long, env = "VOLUME_PATH")]
    pub volume_path: String,
}
