pub mod batching;
pub mod error;
pub mod progress;

// Re-export commonly used types
pub use batching::BatchStream;
pub use error::{AbortOnError, ErrorPolicy, SilentSkip, SkipRows};
pub use progress::{
    BroadcastNotifier, LoadStage, LogNotifier, Notification, Notifications, Notifier,
    ProgressReporter,
};
