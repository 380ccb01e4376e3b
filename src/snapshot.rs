//! Finite, non-restartable results of list reads.

use crate::error::ClientError;

/// One read of a list endpoint.
///
/// A failed read still yields a snapshot: empty, with the error kept beside
/// it so the caller can show a warning instead of an endless loading state.
/// Call the read again to refresh.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub items: Vec<T>,
    pub error: Option<ClientError>,
}

impl<T> Snapshot<T> {
    pub fn ok(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    pub fn degraded(error: ClientError) -> Self {
        Self {
            items: Vec::new(),
            error: Some(error),
        }
    }

    pub fn from_result(result: Result<Vec<T>, ClientError>) -> Self {
        match result {
            Ok(items) => Self::ok(items),
            Err(err) => Self::degraded(err),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Surface the error, if any, as a `Result`
    pub fn into_result(self) -> Result<Vec<T>, ClientError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}
