//! Object Storage Abstraction
//!
//! Audio and cover assets live in buckets of the hosted backend. The core
//! only ever needs the public URL of an object; uploads and signed access
//! belong to the admin tooling.

use crate::platform::PlatformSendSync;

/// Resolves bucket/key pairs to publicly readable URLs.
///
/// Implementations must be pure: no network access, no existence check.
/// A well-formed URL may still point at a missing or access-denied object,
/// which is why callers probe reachability separately.
pub trait ObjectStore: PlatformSendSync {
    /// Public URL for `key` inside `bucket`.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}
