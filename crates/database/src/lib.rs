//! SQLite persistence layer for practice sessions.
//!
//! This crate provides async database operations for sessions, transcripts
//! (chat and coach messages), scenarios, the knowledge corpus, and keyed
//! prompt templates, using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{session::NewSession, scenario::NewScenario, session, scenario, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:practice.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let scenario = scenario::create_scenario(
//!         db.pool(),
//!         &NewScenario {
//!             name: "Difficult feedback",
//!             description: "Deliver feedback about missed deadlines.",
//!             llm_instructions: "• Name: Amira\n• Personality: defensive at first",
//!             recommended_for: "New managers",
//!             category: "Feedback",
//!             duration_minutes: 5,
//!             model: None,
//!         },
//!     )
//!     .await?;
//!
//!     let session = session::create_session(
//!         db.pool(),
//!         &NewSession {
//!             tenant_id: "tenant-1",
//!             scenario_id: &scenario.id,
//!             operator_id: "manager-1",
//!             system_prompt: "You are the simulated character...",
//!             model: None,
//!         },
//!     )
//!     .await?;
//!     println!("session {} is #{}", session.id, session.session_number);
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod knowledge;
pub mod message;
pub mod models;
pub mod prompt_template;
pub mod scenario;
pub mod session;

pub use error::{DatabaseError, Result};
pub use models::{ChatMessage, CoachMessage, KnowledgeItem, PromptTemplate, Scenario, Session};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Set high enough to handle concurrent turns and review tasks.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/practice.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
