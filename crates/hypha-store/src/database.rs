//! Connection handling for the relational store
//!
//! Two ways in: a scoped connection carrying the caller's JWT claims, which
//! row-level security policies read, and the admin connection used by
//! webhook reconciliation. Callers choose explicitly; a scoped connection
//! never falls back to admin.

use crate::auth::AuthInfo;
use crate::entity::spaces;
use crate::error::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaOrmDatabase, DatabaseConnection,
    DatabaseTransaction, DbBackend, EntityTrait, PaginatorTrait, Statement, TransactionTrait,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SET_CLAIMS_SQL: &str = "SELECT set_config('request.jwt.claims', $1, true), \
     set_config('role', 'authenticated', true)";

/// Store database connection wrapper
#[derive(Clone)]
pub struct Database {
    connection: Arc<DatabaseConnection>,
}

impl Database {
    /// Connect with retries
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to Postgres...");

        let mut attempts = 0;
        const MAX_ATTEMPTS: u32 = 3;
        const RETRY_DELAY: Duration = Duration::from_secs(2);

        loop {
            attempts += 1;

            let mut opt = ConnectOptions::new(database_url.to_string());
            opt.max_connections(20)
                .min_connections(2)
                .connect_timeout(Duration::from_secs(10))
                .acquire_timeout(Duration::from_secs(30))
                .idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(3600))
                .sqlx_logging(false);

            match SeaOrmDatabase::connect(opt).await {
                Ok(connection) => {
                    info!("Connected to Postgres (max connections: 20)");
                    return Ok(Self::from_connection(connection));
                }
                Err(e) if attempts < MAX_ATTEMPTS => {
                    warn!(
                        "Failed to connect to Postgres (attempt {}/{}): {}",
                        attempts, MAX_ATTEMPTS, e
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    error!("Failed to connect to Postgres after {} attempts", MAX_ATTEMPTS);
                    return Err(anyhow::anyhow!("Database connection failed: {}", e));
                }
            }
        }
    }

    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self {
            connection: Arc::new(connection),
        }
    }

    /// Privileged connection that bypasses row-level security
    pub fn admin(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Open a transaction bound to the caller's claims
    pub async fn scoped(&self, auth: &AuthInfo) -> Result<ScopedConnection> {
        let txn = self.connection.begin().await?;
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            SET_CLAIMS_SQL,
            [auth.claims_json().into()],
        ))
        .await?;
        debug!("Opened scoped connection for {}", auth.user_id);
        Ok(ScopedConnection { txn })
    }

    pub async fn health_check(&self) -> Result<()> {
        spaces::Entity::find()
            .paginate(self.connection.as_ref(), 1)
            .fetch_page(0)
            .await?;
        Ok(())
    }
}

/// Transaction carrying `request.jwt.claims` and the `authenticated` role.
///
/// The settings are transaction-local; dropping without [`finish`] rolls back.
///
/// [`finish`]: ScopedConnection::finish
pub struct ScopedConnection {
    txn: DatabaseTransaction,
}

impl ScopedConnection {
    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn finish(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }
}
