use std::time::Duration;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};
use tokio_postgres::NoTls;
use tracing::info;

use super::postgres::PgBackend;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
    /// Accept invalid/self-signed certificates. Use with caution.
    /// Ignored for `verify-ca` and `verify-full`.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Optional path to a custom CA certificate file (PEM format).
    /// If not set, the system CA store is used.
    #[serde(default)]
    pub ca_cert_path: Option<String>,
}

/// SSL/TLS connection modes for PostgreSQL.
///
/// These match the standard PostgreSQL sslmode parameter:
/// - `Disable`: No SSL (unencrypted)
/// - `Prefer`: Try SSL first, fall back to non-SSL (default)
/// - `Require`: Require SSL but don't verify certificate
/// - `VerifyCa`: Require SSL and verify the server certificate is signed by a trusted CA
/// - `VerifyFull`: Like VerifyCa, but also verify the server hostname matches the certificate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl ConnectionConfig {
    pub fn display_string(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }

    fn pg_config(&self, connect_timeout: Duration) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.username)
            .password(&self.password)
            .connect_timeout(connect_timeout)
            .ssl_mode(match self.ssl_mode {
                SslMode::Disable => tokio_postgres::config::SslMode::Disable,
                SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
                SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                    tokio_postgres::config::SslMode::Require
                }
            });
        config
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 5432,
            database: String::from("postgres"),
            username: String::from("postgres"),
            password: String::new(),
            ssl_mode: SslMode::default(),
            accept_invalid_certs: false,
            ca_cert_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_conn: usize,
    pub wait_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_conn: 100,
            wait_timeout_ms: 3000,
            connect_timeout_ms: 3000,
        }
    }
}

/// Build a connection pool for `config`. No connection is opened until first use.
pub fn connect(config: &ConnectionConfig, pool: &PoolConfig) -> Result<PgBackend> {
    let pg_config = pg_config_with_timeout(config, pool);
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let manager = match config.ssl_mode {
        SslMode::Disable => Manager::from_config(pg_config, NoTls, manager_config),
        SslMode::Prefer | SslMode::Require => {
            let tls = build_tls_connector(config, false)?;
            Manager::from_config(pg_config, tls, manager_config)
        }
        SslMode::VerifyCa | SslMode::VerifyFull => {
            let tls = build_tls_connector(config, true)?;
            Manager::from_config(pg_config, tls, manager_config)
        }
    };

    let connect_timeout = Duration::from_millis(pool.connect_timeout_ms);
    let pg_pool = Pool::builder(manager)
        .max_size(pool.max_conn)
        .wait_timeout(Some(Duration::from_millis(pool.wait_timeout_ms)))
        .create_timeout(Some(connect_timeout))
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| Error::Config(format!("failed to build connection pool: {}", e)))?;

    info!(
        target = %config.display_string(),
        max_conn = pool.max_conn,
        ssl_mode = ?config.ssl_mode,
        "created connection pool"
    );
    Ok(PgBackend::new(pg_pool))
}

fn pg_config_with_timeout(config: &ConnectionConfig, pool: &PoolConfig) -> tokio_postgres::Config {
    config.pg_config(Duration::from_millis(pool.connect_timeout_ms))
}

/// Build a TLS connector with appropriate certificate configuration.
///
/// # Arguments
/// * `config` - Connection configuration
/// * `strict_verify` - If true, always verify certificates (for verify-ca/verify-full modes)
fn build_tls_connector(config: &ConnectionConfig, strict_verify: bool) -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();

    if config.accept_invalid_certs && !strict_verify {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else {
        if config.ssl_mode == SslMode::VerifyCa {
            builder.danger_accept_invalid_hostnames(true);
        }
        if let Some(ca_path) = &config.ca_cert_path {
            let ca_data = std::fs::read(ca_path).map_err(|e| {
                Error::Config(format!("failed to read CA certificate file {}: {}", ca_path, e))
            })?;
            add_ca_certificates(&mut builder, &ca_data)?;
        }
    }

    let connector = builder
        .build()
        .map_err(|e| Error::Config(format!("failed to build TLS connector: {}", e)))?;

    Ok(MakeTlsConnector::new(connector))
}

/// Add every certificate of a PEM bundle to the TLS builder.
fn add_ca_certificates(
    builder: &mut native_tls::TlsConnectorBuilder,
    pem_data: &[u8],
) -> Result<()> {
    let blocks = split_pem_certificates(pem_data)?;
    for block in blocks {
        let cert = native_tls::Certificate::from_pem(block.as_bytes())
            .map_err(|e| Error::Config(format!("failed to parse certificate: {}", e)))?;
        builder.add_root_certificate(cert);
    }
    Ok(())
}

/// Split a PEM bundle into individual certificate blocks.
fn split_pem_certificates(pem_data: &[u8]) -> Result<Vec<String>> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let pem_str = std::str::from_utf8(pem_data)
        .map_err(|_| Error::Config("CA certificate file is not valid UTF-8".into()))?;

    let mut certs = Vec::new();
    let mut current: Option<String> = None;
    for line in pem_str.lines() {
        let line = line.trim();
        if line == BEGIN {
            current = Some(format!("{}\n", BEGIN));
        } else if line == END {
            if let Some(mut block) = current.take() {
                block.push_str(END);
                block.push('\n');
                certs.push(block);
            }
        } else if let Some(block) = current.as_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }

    if certs.is_empty() {
        return Err(Error::Config(
            "no valid certificates found in PEM data".into(),
        ));
    }
    Ok(certs)
}
