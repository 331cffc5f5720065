pub mod config;

use tokio_postgres::NoTls;
use tracing::{Level, event};

use crate::core::{DbError, Result};
use crate::session::PgSession;
use config::ConnectionConfig;

/// Opens a single connection and wraps it in a [`PgSession`].
///
/// The connection driver runs on a spawned task; it logs and exits when the
/// server closes the connection. Pooling is left to the caller.
pub async fn connect(config: &ConnectionConfig) -> Result<PgSession> {
    config.validate()?;

    let (client, connection) = config
        .to_pg_config()
        .connect(NoTls)
        .await
        .map_err(|err| DbError::Connectivity(format!("{}: {}", config.to_url(), err)))?;

    tokio::spawn(async move {
        if let Err(err) = connection.await {
            event!(Level::ERROR, error = %err, "backing store connection closed");
        }
    });

    event!(Level::DEBUG, url = %config.to_url(), "backing store connected");
    Ok(PgSession::new(client))
}
