//! Database layer for devicehub
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - A [`Store`](crate::store::Store) implementation over a single connection

pub mod repo;
pub mod schema;

pub use repo::Database;
