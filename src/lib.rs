//! Workspace placeholder crate.
//!
//! This crate exposes shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-playback`, `core-library`).
//! Host applications can depend on `listenbook-workspace` and enable the
//! documented features without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "playback")]
pub use core_playback;

#[cfg(feature = "library")]
pub use core_library;
