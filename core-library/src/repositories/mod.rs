//! # Repository Pattern Implementation
//!
//! Repository traits for the audiobook tables with SQLite implementations.
//! REST implementations against the hosted backend live in
//! [`crate::adapters::rest`] and implement the same traits.
//!
//! ## Available Repositories
//!
//! - `ProgressRepository` - One listening checkpoint per (user, book)
//! - `BookRepository` - Catalogue lookup and search
//! - `LibraryRepository` - Likes and saves

pub mod book;
pub mod library;
pub mod pagination;
pub mod progress;

pub use book::{BookRepository, SqliteBookRepository};
pub use library::{LibraryRepository, SqliteLibraryRepository};
pub use pagination::{Page, PageRequest};
pub use progress::{ProgressRepository, SqliteProgressRepository};
