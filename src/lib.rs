//! # Foxden
//!
//! A content registry with fine-grained authorization. Organizations own
//! applications, applications own files, and every file holds versioned
//! content that may reference templates, variables, conditions and functions.
//! Publishing a version resolves its whole relation graph first.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use foxden::server::{AppState, create_router};
//! use foxden::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/foxden.db").unwrap();
//! store.initialize().unwrap();
//!
//! let router = create_router(Arc::new(AppState::new(Arc::new(store))));
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `foxden` binary.

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod service;
pub mod store;
pub mod types;
