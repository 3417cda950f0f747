use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

use crate::domain::Entity;

/// Event emitted for every load progress update
pub const LOAD_PROGRESS_EVENT: &str = "data:loading:progress";

/// Number of stages a load goes through (users, cards, transactions, indexing)
pub const TOTAL_STAGES: u8 = 4;

/// Transactions assumed when estimating percent complete
pub const DEFAULT_EXPECTED_TRANSACTIONS: u64 = 13_300_000;

/// A named event with a JSON payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub event: String,
    pub payload: Value,
}

/// Receives notifications; delivery must never block the caller
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes each notification to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        info!(event = %notification.event, payload = %notification.payload, "Notification");
    }
}

/// Fans notifications out to any number of subscribers
///
/// Sending with no live subscriber is not an error; the event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.sender.send(notification);
    }
}

/// Optional notifier handle shared by the pipeline and the harness
#[derive(Clone, Default)]
pub struct Notifications {
    notifier: Option<Arc<dyn Notifier>>,
}

impl Notifications {
    pub fn new(notifier: impl Notifier + 'static) -> Self {
        Self {
            notifier: Some(Arc::new(notifier)),
        }
    }

    /// A handle that emits nothing
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.notifier.is_some()
    }

    pub fn emit(&self, event: &str, payload: Value) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(Notification {
                event: event.to_string(),
                payload,
            });
        }
    }
}

impl fmt::Debug for Notifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifications")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Load stages as reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    Started,
    Users,
    UsersComplete,
    Cards,
    CardsComplete,
    TransactionsStart,
    Transactions,
    TransactionsComplete,
    Indexing,
    Complete,
}

impl LoadStage {
    /// Position out of [`TOTAL_STAGES`]
    pub fn index(&self) -> u8 {
        match self {
            Self::Started => 0,
            Self::Users | Self::UsersComplete => 1,
            Self::Cards | Self::CardsComplete => 2,
            Self::TransactionsStart | Self::Transactions | Self::TransactionsComplete => 3,
            Self::Indexing | Self::Complete => 4,
        }
    }

    fn in_progress(entity: Entity) -> Self {
        match entity {
            Entity::Users => Self::Users,
            Entity::Cards => Self::Cards,
            Entity::Transactions => Self::Transactions,
        }
    }

    fn completed(entity: Entity) -> Self {
        match entity {
            Entity::Users => Self::UsersComplete,
            Entity::Cards => Self::CardsComplete,
            Entity::Transactions => Self::TransactionsComplete,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadProgress {
    stage: LoadStage,
    message: String,
    current_stage: u8,
    total_stages: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    items_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    percent_complete: Option<u64>,
    timestamp: i64,
}

/// Default reporting interval, in records, per entity
pub fn default_interval(entity: Entity) -> u64 {
    match entity {
        Entity::Users => 100,
        Entity::Cards => 500,
        Entity::Transactions => 50_000,
    }
}

/// Turns batch completions into load progress notifications
///
/// Updates are throttled per entity: one is sent each time the running
/// count crosses a multiple of the entity's interval.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    notifications: Notifications,
    expected_transactions: u64,
    last_reported: u64,
}

impl ProgressReporter {
    pub fn new(notifications: Notifications) -> Self {
        Self {
            notifications,
            expected_transactions: DEFAULT_EXPECTED_TRANSACTIONS,
            last_reported: 0,
        }
    }

    pub fn with_expected_transactions(mut self, expected: u64) -> Self {
        self.expected_transactions = expected;
        self
    }

    /// Announce a stage without counts
    pub fn stage(&mut self, stage: LoadStage, message: impl Into<String>) {
        self.last_reported = 0;
        self.send(stage, message.into(), None, None);
    }

    /// Report `processed` records of `entity` written so far
    pub fn batch_written(&mut self, entity: Entity, processed: u64) {
        let interval = default_interval(entity);
        if processed / interval <= self.last_reported / interval {
            return;
        }
        self.last_reported = processed;

        let (message, percent) = match entity {
            Entity::Transactions => (
                format!("Loading transactions: {processed} processed"),
                Some(self.percent_of_expected(processed)),
            ),
            _ => (format!("Loading {entity}: {processed} processed"), None),
        };
        self.send(LoadStage::in_progress(entity), message, Some(processed), percent);
    }

    /// Report the final count for `entity`
    pub fn entity_complete(&mut self, entity: Entity, total: u64) {
        self.last_reported = 0;
        let percent = (entity == Entity::Transactions).then_some(100);
        self.send(
            LoadStage::completed(entity),
            format!("Completed loading {total} {entity}"),
            Some(total),
            percent,
        );
    }

    fn percent_of_expected(&self, processed: u64) -> u64 {
        if self.expected_transactions == 0 {
            return 100;
        }
        let percent = (processed as f64 / self.expected_transactions as f64 * 100.0).round();
        (percent as u64).min(100)
    }

    fn send(
        &self,
        stage: LoadStage,
        message: String,
        items_processed: Option<u64>,
        percent_complete: Option<u64>,
    ) {
        if !self.notifications.is_enabled() {
            return;
        }

        let progress = LoadProgress {
            stage,
            message,
            current_stage: stage.index(),
            total_stages: TOTAL_STAGES,
            items_processed,
            percent_complete,
            timestamp: Utc::now().timestamp_millis(),
        };
        match serde_json::to_value(&progress) {
            Ok(payload) => self.notifications.emit(LOAD_PROGRESS_EVENT, payload),
            Err(error) => tracing::warn!(%error, "Could not encode progress"),
        }
    }
}
