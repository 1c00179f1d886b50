//! # Library Module
//!
//! Typed records and repositories for the audiobook catalogue and each
//! user's listening state.
//!
//! ## Overview
//!
//! This crate manages:
//! - `Book`, `ListeningProgress` and like/save records
//! - Repository traits for `listening_progress`, `books`, `book_likes` and
//!   `book_saves`
//! - An SQLite schema with migrations for local persistence and tests
//! - A REST adapter for the hosted backend implementing the same traits

pub mod adapters;
pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{Book, ListeningProgress, MarkKind};
