use crate::args::PostgresArgs;
use deadpool_postgres::{Config as PgConfig, ManagerConfig, Pool, RecyclingMethod};
use postgres::NoTls;
use std::env;
use tokio_postgres::{Client, Config as PostgresConfig};

pub async fn create_pool(pg_args: &PostgresArgs) -> Pool {
    let mut pg_pool_cfg = PgConfig::new();
    pg_pool_cfg.dbname = Some(pg_args.postgres_database.clone());
    pg_pool_cfg.host = Some(pg_args.postgres_host.clone());
    pg_pool_cfg.port = Some(pg_args.postgres_port);
    pg_pool_cfg.user = Some(pg_args.postgres_username.clone());
    pg_pool_cfg.password = resolve_password(pg_args);
    pg_pool_cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    pg_pool_cfg
        .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
        .expect("Failed to create Postgres pool")
}

/// A dedicated, non-pooled connection. Leader election and the EventListener both need a
/// session whose lifetime they fully control: `pg_advisory_lock` is tied to the connection that
/// took it, and `LISTEN` notifications only arrive on the connection that issued the `LISTEN`.
pub async fn connect_raw(pg_args: &PostgresArgs) -> anyhow::Result<Client> {
    let mut pg_cfg = PostgresConfig::new();
    pg_cfg.host(&pg_args.postgres_host);
    pg_cfg.port(pg_args.postgres_port);
    pg_cfg.dbname(&pg_args.postgres_database);
    pg_cfg.user(&pg_args.postgres_username);
    if let Some(pw) = resolve_password(pg_args) {
        pg_cfg.password(pw);
    }
    let (client, connection) = pg_cfg.connect(NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("postgres connection error: {e}");
        }
    });
    Ok(client)
}

fn resolve_password(pg_args: &PostgresArgs) -> Option<String> {
    pg_args
        .postgres_password
        .clone()
        .or_else(|| env::var("POSTGRES_PASSWORD").ok())
}

pub fn strip_sql_comments(input: &str) -> String {
    let mut output = String::new();
    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        if let Some(pos) = line.find("--") {
            output.push_str(&line[..pos]);
            output.push('\n');
        } else {
            output.push_str(line);
            output.push('\n');
        }
    }
    output
}
