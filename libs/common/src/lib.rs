//! Storage plumbing shared by the workspace services
//!
//! PostgreSQL pooling and migrations live in [`database`], a namespaced
//! Redis client in [`cache`], and [`error::DatabaseError`] is what both
//! the pool helpers and the service repositories return.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, health_check, init_pool};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = init_pool(&DatabaseConfig::from_env()?).await?;
//! assert!(health_check(&pool).await?);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod database;
pub mod error;
