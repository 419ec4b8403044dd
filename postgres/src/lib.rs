//! `PostgreSQL` order store for Orderflow.
//!
//! [`PostgresOrderRepository`] implements the durable store with optimistic
//! versioning: every write is conditional on the version the caller read,
//! so concurrent writers to the same order never silently overwrite each
//! other.
//!
//! # Example
//!
//! ```no_run
//! use orderflow_postgres::PostgresOrderRepository;
//!
//! # async fn example() -> Result<(), orderflow_core::OrderError> {
//! let repository = PostgresOrderRepository::new("postgres://localhost/orders").await?;
//! repository.migrate().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod order_repository;

pub use order_repository::PostgresOrderRepository;
