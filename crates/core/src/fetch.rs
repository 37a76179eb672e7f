//! The fetch-and-cache primitive consumed by the scheduler.

use async_trait::async_trait;

use crate::error::FetchError;

/// Retrieves one item and places it in the host's cache.
///
/// Implementations must be safe to call concurrently and should make a
/// repeated call for an already-cached id cheap. The scheduler calls this at
/// most once per item per pass and never retries a failure.
#[async_trait]
pub trait FetchAndCache: Send + Sync {
    async fn fetch_and_cache(&self, id: &str) -> Result<(), FetchError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FetchAndCache for Recording {
        async fn fetch_and_cache(&self, id: &str) -> Result<(), FetchError> {
            self.seen.lock().unwrap().push(id.to_string());
            if id.starts_with("bad") {
                return Err(FetchError::Status {
                    id: id.to_string(),
                    status: 404,
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let fetcher: Box<dyn FetchAndCache> = Box::new(Recording {
            seen: Mutex::new(Vec::new()),
        });
        assert!(fetcher.fetch_and_cache("slice-1").await.is_ok());
        let err = fetcher.fetch_and_cache("bad-2").await.unwrap_err();
        assert_eq!(err.to_string(), "unexpected status 404 for bad-2");
    }
}
