//! # Strongroom
//!
//! A PII vault core: typed collections of records encrypted at rest, read
//! back only through named projections (`plain`, `masked`, `last_four`, …),
//! with every operation mediated by a default-deny policy engine.
//!
//! The HTTP surface and production storage backends live outside this crate;
//! storage is the [`store::VaultStore`] trait and a bundled SQLite reference
//! backend is provided for embedding and tests.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strongroom::crypto::AesPrivatiser;
//! use strongroom::store::SqliteStore;
//! use strongroom::vault::Vault;
//!
//! let store = SqliteStore::open("./data/strongroom.db").unwrap();
//! store.initialize().unwrap();
//!
//! let privatiser = AesPrivatiser::new(&master_key).unwrap();
//! let vault = Vault::new(Arc::new(store), Arc::new(privatiser));
//! // Serve it behind your transport of choice...
//! ```

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod id;
pub mod ptypes;
pub mod store;
pub mod types;
pub mod validate;
pub mod vault;

pub use error::{Error, Result};
pub use vault::Vault;
