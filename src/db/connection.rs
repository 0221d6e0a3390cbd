use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use tracing::debug;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("PORTAL_DB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("PORTAL_DB_NAMESPACE").unwrap_or_else(|_| "alumni".to_string()),
            database: env::var("PORTAL_DB_DATABASE").unwrap_or_else(|_| "portal".to_string()),
            username: env::var("PORTAL_DB_USERNAME").ok(),
            password: env::var("PORTAL_DB_PASSWORD").ok(),
        }
    }
}

impl DatabaseConfig {
    /// Embedded in-memory database, used by tests and throwaway local runs.
    pub fn memory() -> Self {
        Self {
            url: "memory".to_string(),
            namespace: "alumni".to_string(),
            database: "portal".to_string(),
            username: None,
            password: None,
        }
    }

    /// Whether data written through this config is lost when the process exits.
    pub fn is_ephemeral(&self) -> bool {
        self.url == "memory" || self.url.starts_with("mem://")
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // Credential store. Optional profile fields are simply absent when unset.
        "DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS uid ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS email ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS password_hash ON TABLE user TYPE string;
         DEFINE FIELD IF NOT EXISTS is_admin ON TABLE user TYPE bool DEFAULT false;",

        // Dated entitlements. Dates are ISO `YYYY-MM-DD` strings.
        "DEFINE TABLE IF NOT EXISTS membership SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS mid ON TABLE membership TYPE string;
         DEFINE FIELD IF NOT EXISTS user_id ON TABLE membership TYPE string;
         DEFINE FIELD IF NOT EXISTS start_date ON TABLE membership TYPE string;
         DEFINE FIELD IF NOT EXISTS end_date ON TABLE membership TYPE string;
         DEFINE FIELD IF NOT EXISTS is_active ON TABLE membership TYPE bool DEFAULT true;",

        "DEFINE TABLE IF NOT EXISTS audit_log SCHEMALESS;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE audit_log VALUE time::now();",

        // Indexes
        "DEFINE INDEX IF NOT EXISTS user_email ON TABLE user COLUMNS email UNIQUE;
         DEFINE INDEX IF NOT EXISTS user_uid ON TABLE user COLUMNS uid UNIQUE;
         DEFINE INDEX IF NOT EXISTS membership_user ON TABLE membership COLUMNS user_id;
         DEFINE INDEX IF NOT EXISTS membership_mid ON TABLE membership COLUMNS mid UNIQUE;
         DEFINE INDEX IF NOT EXISTS audit_log_user ON TABLE audit_log COLUMNS user_id;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    debug!("Schema ensured");
    Ok(())
}
