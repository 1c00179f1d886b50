//! Public bucket URLs for the hosted object store.

use bridge_traits::storage::ObjectStore;

/// Builds `{base}/storage/v1/object/public/{bucket}/{key}` URLs.
///
/// Key segments are percent-encoded individually so nested keys such as
/// `books/42/chapter 1.mp3` keep their `/` separators.
#[derive(Debug, Clone)]
pub struct PublicBucketStore {
    base_url: String,
}

impl PublicBucketStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ObjectStore for PublicBucketStore {
    fn public_url(&self, bucket: &str, key: &str) -> String {
        let encoded_key = key
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encoded_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_public_url() {
        let store = PublicBucketStore::new("https://abc.backend.example/");
        assert_eq!(
            store.public_url("audiobooks", "books/42/part-1.mp3"),
            "https://abc.backend.example/storage/v1/object/public/audiobooks/books/42/part-1.mp3"
        );
    }

    #[test]
    fn encodes_segments_but_keeps_separators() {
        let store = PublicBucketStore::new("https://abc.backend.example");
        assert_eq!(
            store.public_url("audiobooks", "/Moby Dick/ch 1.mp3"),
            "https://abc.backend.example/storage/v1/object/public/audiobooks/Moby%20Dick/ch%201.mp3"
        );
    }
}
