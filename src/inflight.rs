//! Per-form "submitting" flag.
//!
//! A form holds an [`InFlight`] and calls [`InFlight::begin`] before it
//! submits. While the returned guard is alive a second submission is refused
//! with [`ClientError::Busy`]. Dropping the guard clears the flag, so it is
//! cleared on success, on error, and when the submitting future is dropped
//! half-way.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ClientError;

#[derive(Debug, Default)]
pub struct InFlight {
    busy: AtomicBool,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, action: &'static str) -> Result<InFlightGuard<'_>, ClientError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlightGuard { flag: &self.busy })
            .map_err(|_| ClientError::Busy(action))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
