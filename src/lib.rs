//! RoostDB - the transactional core of a small social network
//!
//! An in-memory row store with an append-only commit log, an executor for
//! atomic units of work over it, and the social operations built on top:
//! - `store`: record types, tables and the reader/writer traits
//! - `txn`: atomic units with rollback and commit logging
//! - `aof`: the commit log
//! - `social`: follow, unfollow, like, unlike and friends
//! - `auth` and `web`: a thin authenticated HTTP surface

pub mod aof;
pub mod auth;
pub mod config;
pub mod error;
pub mod social;
pub mod store;
pub mod txn;
pub mod web;

/// Re-export commonly used types
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use social::Social;
pub use txn::{Database, Transaction};
