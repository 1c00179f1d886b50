//! Remote storage adapters
//!
//! The SQLite repositories live next to their traits in
//! [`crate::repositories`]; this module holds implementations backed by the
//! hosted backend.

pub mod rest;

pub use rest::{RestBookRepository, RestClient, RestLibraryRepository, RestProgressRepository};
