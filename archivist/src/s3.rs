use anyhow::{Context, Result};
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;

use crate::args::S3Args;

/// Mirrors `compiler::s3::create_s3_client`: region + optional endpoint override for
/// S3-compatible storage, credentials resolved from the default AWS provider chain.
pub async fn create_client(args: &S3Args) -> Result<S3Client> {
    let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(args.region.clone()));

    if let Some(endpoint) = &args.endpoint {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let config = config_loader.load().await;
    Ok(S3Client::new(&config))
}

pub async fn object_exists(client: &S3Client, bucket: &str, key: &str) -> Result<bool> {
    match client.head_object().bucket(bucket).key(key).send().await {
        Ok(_) => Ok(true),
        Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
        Err(e) => Err(e).context(format!("failed to head S3 object {key}")),
    }
}

pub async fn get_object_bytes(client: &S3Client, bucket: &str, key: &str) -> Result<Bytes> {
    let response = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .with_context(|| format!("failed to get S3 object {key}"))?;
    let body = response
        .body
        .collect()
        .await
        .with_context(|| format!("failed to read S3 object body {key}"))?;
    Ok(body.into_bytes())
}

pub async fn put_object_bytes(client: &S3Client, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(body))
        .send()
        .await
        .with_context(|| format!("failed to put S3 object {key}"))?;
    Ok(())
}

pub async fn delete_object(client: &S3Client, bucket: &str, key: &str) -> Result<()> {
    client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .with_context(|| format!("failed to delete S3 object {key}"))?;
    Ok(())
}
