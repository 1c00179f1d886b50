//! # Host Bridge Traits
//!
//! Capability contracts the host application implements for the audiobook
//! core.
//!
//! ## Overview
//!
//! The core never talks to a browser, an audio device or the hosted backend
//! directly. Each capability it needs is described by a trait in this crate
//! and injected at construction time, which keeps the playback state machines
//! testable with fakes and portable across desktop, mobile and web hosts.
//!
//! ## Traits
//!
//! ### Networking & Backend
//! - [`HttpClient`](http::HttpClient) - Async HTTP for REST tables and reachability probes
//! - [`ObjectStore`](storage::ObjectStore) - Public URL resolution for bucket objects
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and link quality
//!
//! ### Playback
//! - [`AudioOutput`](playback::AudioOutput) - Media element with transport and events
//!
//! ### Identity & Device
//! - [`SessionProvider`](auth::SessionProvider) - Current authenticated user
//! - [`DeviceInfo`](device::DeviceInfo) - User agent and touch capabilities
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Fallible bridge operations return [`BridgeError`](error::BridgeError).
//! Playback start failures use the dedicated [`PlayError`](playback::PlayError)
//! so the core can tell autoplay blocks from unsupported formats.
//!
//! ## Thread Safety
//!
//! On native targets every bridge trait requires `Send + Sync`; on `wasm32`
//! those bounds are relaxed through [`platform::PlatformSendSync`].

pub mod auth;
pub mod device;
pub mod error;
pub mod http;
pub mod network;
pub mod platform;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use auth::{SessionProvider, UserSession};
pub use device::DeviceInfo;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use network::{
    EffectiveConnectionType, NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus,
    NetworkType,
};
pub use playback::{AudioOutput, OutputEvent, OutputEventStream, PlayError};
pub use storage::ObjectStore;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
