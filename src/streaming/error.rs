use tracing::warn;

use crate::io::IoError;

/// Policy for row-level errors met while reading a CSV stream
///
/// Only row-level errors are offered to the policy; IO failures always
/// end the stream.
pub trait ErrorPolicy: Send + Sync {
    /// Return true to skip the row and continue, false to abort
    fn handle_row_error(&self, error: &IoError) -> bool;
}

impl<P: ErrorPolicy + ?Sized> ErrorPolicy for &P {
    fn handle_row_error(&self, error: &IoError) -> bool {
        (**self).handle_row_error(error)
    }
}

/// Skip bad rows without logging
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSkip;

impl ErrorPolicy for SilentSkip {
    fn handle_row_error(&self, _error: &IoError) -> bool {
        true
    }
}

/// Skip bad rows and log each one
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipRows;

impl ErrorPolicy for SkipRows {
    fn handle_row_error(&self, error: &IoError) -> bool {
        warn!(%error, "Skipping row");
        true
    }
}

/// Abort on the first bad row
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortOnError;

impl ErrorPolicy for AbortOnError {
    fn handle_row_error(&self, error: &IoError) -> bool {
        warn!(%error, "Aborting on row error");
        false
    }
}
