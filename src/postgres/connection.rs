// ABOUTME: PostgreSQL connection setup with configurable TLS policy
// ABOUTME: Spawns the connection driver task and hands back the client

use anyhow::{Context, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::sync::OnceLock;
use tokio_postgres::Client;

use crate::utils::strip_password_from_url;

static ALLOW_SELF_SIGNED: OnceLock<bool> = OnceLock::new();

/// Set the process-wide TLS policy. Only the first call has any effect.
pub fn init_tls_policy(allow_self_signed_certs: bool) {
    if ALLOW_SELF_SIGNED.set(allow_self_signed_certs).is_err() {
        tracing::debug!("TLS policy already initialised; ignoring later setting");
    }
    if allow_self_signed_certs {
        tracing::warn!("Accepting self-signed TLS certificates; use only for testing");
    }
}

fn allow_self_signed() -> bool {
    ALLOW_SELF_SIGNED.get().copied().unwrap_or(false)
}

fn make_tls_connector() -> Result<MakeTlsConnector> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(allow_self_signed())
        .build()
        .context("Failed to build TLS connector")?;
    Ok(MakeTlsConnector::new(connector))
}

/// Open a connection to a PostgreSQL database.
///
/// The connection driver runs on its own task and ends when the returned
/// client is dropped, so dropping the client closes the connection.
/// TLS is negotiated according to the URL's `sslmode` (default `prefer`).
pub async fn connect(url: &str) -> Result<Client> {
    let tls = make_tls_connector()?;
    let (client, connection) = tokio_postgres::connect(url, tls)
        .await
        .with_context(|| format!("Failed to connect to {}", strip_password_from_url(url)))?;

    let display_url = strip_password_from_url(url);
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("PostgreSQL connection to {} failed: {}", display_url, e);
        }
    });

    Ok(client)
}
