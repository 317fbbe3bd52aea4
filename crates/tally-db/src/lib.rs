//! Tally DB - Database abstractions
//!
//! SQLx-based database layer for Tally services.
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_db::{create_pool, Repositories, Stores};
//!
//! let pool = create_pool("postgres://localhost/tally").await?;
//! let stores: Stores = Repositories::new(pool).into();
//!
//! let account = stores.accounts.find_by_email("owner@example.com").await?;
//! ```

pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, create_pool_with_options, DbPool, PoolOptions};
pub use repo::*;
