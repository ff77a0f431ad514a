use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::{Client, Config, SimpleQueryMessage};
use tokio_postgres_rustls::MakeRustlsConnect;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{QueryBackend, RowSet, TaskError, tls};
use crate::core::config::ConnectionConfig;
use crate::core::registry::Endpoint;

/// Backend that opens a fresh PostgreSQL connection per task and runs the
/// statement over the simple query protocol, so every cell arrives as text.
pub struct PostgresBackend {
    settings: ConnectionConfig,
    tls: MakeRustlsConnect,
}

impl PostgresBackend {
    pub fn new(settings: ConnectionConfig) -> Result<Self, rustls::Error> {
        Ok(Self {
            settings,
            tls: tls::connector()?,
        })
    }

    fn pg_config(&self, endpoint: &Endpoint) -> Config {
        let mut config = Config::new();
        config
            .host(&endpoint.host)
            .port(endpoint.port)
            .dbname(&endpoint.database)
            .user(&endpoint.credentials.username)
            .password(endpoint.credentials.password())
            .application_name(&self.settings.application_name)
            .connect_timeout(Duration::from_secs(self.settings.connect_timeout_secs))
            .ssl_mode(tls::ssl_mode(self.settings.ssl_mode));
        if self.settings.statement_timeout_ms > 0 {
            config.options(&format!(
                "-c statement_timeout={}",
                self.settings.statement_timeout_ms
            ));
        }
        config
    }

    async fn connect(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<Client, TaskError> {
        let config = self.pg_config(endpoint);
        let connecting = config.connect(self.tls.clone());

        let (client, connection) = tokio::select! {
            _ = cancel.cancelled() => return Err(TaskError::Cancelled),
            result = connecting => result.map_err(|e| TaskError::Connection {
                endpoint: endpoint.name.clone(),
                message: describe(&e),
            })?,
        };

        let name = endpoint.name.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Connection to {} closed with error: {}", name, e);
            }
        });

        Ok(client)
    }
}

#[async_trait]
impl QueryBackend for PostgresBackend {
    async fn execute(
        &self,
        endpoint: &Endpoint,
        sql: &str,
        cancel: CancellationToken,
    ) -> Result<RowSet, TaskError> {
        let client = self.connect(endpoint, &cancel).await?;

        tokio::select! {
            result = client.simple_query(sql) => {
                let messages = result.map_err(|e| TaskError::QueryExecution(describe(&e)))?;
                Ok(collect_rows(messages.into_iter().filter_map(Frame::from_message)))
            }
            _ = cancel.cancelled() => {
                // Ask the server to stop the statement; dropping the client closes the socket.
                if let Err(e) = client.cancel_token().cancel_query(self.tls.clone()).await {
                    warn!("Cancel request to {} failed: {}", endpoint.name, e);
                }
                Err(TaskError::Cancelled)
            }
        }
    }
}

/// The parts of a simple-query response that shape the result.
#[derive(Debug)]
enum Frame {
    Columns(Vec<String>),
    Row(Vec<Option<String>>),
    Complete,
}

impl Frame {
    fn from_message(message: SimpleQueryMessage) -> Option<Self> {
        match message {
            SimpleQueryMessage::RowDescription(columns) => Some(Frame::Columns(
                columns.iter().map(|c| c.name().to_string()).collect(),
            )),
            SimpleQueryMessage::Row(row) => Some(Frame::Row(
                (0..row.len()).map(|i| row.get(i).map(str::to_string)).collect(),
            )),
            SimpleQueryMessage::CommandComplete(_) => Some(Frame::Complete),
            _ => None,
        }
    }
}

/// Keeps the rows of the last statement that produced a result set.
fn collect_rows(frames: impl IntoIterator<Item = Frame>) -> RowSet {
    let mut last: Option<RowSet> = None;
    let mut columns: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<Option<String>>> = Vec::new();

    for frame in frames {
        match frame {
            Frame::Columns(described) => {
                columns = Some(described);
                rows.clear();
            }
            Frame::Row(cells) => rows.push(cells),
            Frame::Complete => {
                // Statements without a row description (SET, UPDATE) leave `last` alone.
                if let Some(described) = columns.take() {
                    last = Some(RowSet::new(described, std::mem::take(&mut rows)));
                }
            }
        }
    }

    if let Some(described) = columns {
        return RowSet::new(described, rows);
    }
    last.unwrap_or_else(RowSet::empty)
}

fn describe(err: &tokio_postgres::Error) -> String {
    match err.as_db_error() {
        Some(db) => format!("{} (SQLSTATE {})", db.message(), db.code().code()),
        None => err.to_string(),
    }
}
