use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, error, info};

use super::error::{EngineError, LoadFailure};
use crate::domain::{
    BatchAccumulator, DEFAULT_BATCH_SIZE, DomainError, Entity, LoadStats, Record, RowDialect,
};
use crate::io::{CsvRecordStream, DataFiles, RawCardRow, RawRow, RawTransactionRow, RawUserRow};
use crate::storage::{BulkSink, DualSinkWriter, WriteError};
use crate::streaming::{BatchStream, ErrorPolicy, LoadStage, ProgressReporter, SilentSkip};

/// Where a load is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    Idle,
    DroppingExisting,
    CreatingSchemas,
    LoadingUsers,
    LoadingCards,
    LoadingTransactions,
    CreatingIndexes,
    Done,
    Failed,
}

impl LoadState {
    fn loading(entity: Entity) -> Self {
        match entity {
            Entity::Users => Self::LoadingUsers,
            Entity::Cards => Self::LoadingCards,
            Entity::Transactions => Self::LoadingTransactions,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::DroppingExisting => "dropping existing data",
            Self::CreatingSchemas => "creating schemas",
            Self::LoadingUsers => "loading users",
            Self::LoadingCards => "loading cards",
            Self::LoadingTransactions => "loading transactions",
            Self::CreatingIndexes => "creating indexes",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Knobs for a single load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub batch_size: usize,
    /// Stop after this many transactions; users and cards are never capped
    pub transaction_limit: Option<u64>,
    pub dialect: RowDialect,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            transaction_limit: None,
            dialect: RowDialect::default(),
        }
    }
}

/// Outcome of a completed load
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub total_users: u64,
    pub total_cards: u64,
    pub total_transactions: u64,
    pub elapsed_seconds: f64,
    pub databases: Vec<String>,
    pub files_processed: usize,
    pub skipped_rows: u64,
    /// Records each destination reports holding after the final refresh
    pub destination_counts: BTreeMap<String, BTreeMap<Entity, u64>>,
}

/// Loads users, cards and transactions into both destinations, in that order
///
/// Every existing collection and index is dropped first, so running a load
/// twice over the same input leaves the same data behind. Batches are
/// written one at a time; the next batch is not read until both
/// destinations have settled the current one.
pub struct IngestionPipeline<D, S, P = SilentSkip> {
    writer: DualSinkWriter<D, S>,
    options: LoadOptions,
    policy: P,
    progress: ProgressReporter,
    state: LoadState,
    stats: LoadStats,
    skipped: u64,
}

impl<D, S> IngestionPipeline<D, S, SilentSkip>
where
    D: BulkSink,
    S: BulkSink,
{
    pub fn new(writer: DualSinkWriter<D, S>, options: LoadOptions) -> Self {
        Self {
            writer,
            options,
            policy: SilentSkip,
            progress: ProgressReporter::new(Default::default()),
            state: LoadState::Idle,
            stats: LoadStats::new(),
            skipped: 0,
        }
    }
}

impl<D, S, P> IngestionPipeline<D, S, P>
where
    D: BulkSink,
    S: BulkSink,
    P: ErrorPolicy,
{
    /// Replace the row error policy
    pub fn with_policy<Q: ErrorPolicy>(self, policy: Q) -> IngestionPipeline<D, S, Q> {
        IngestionPipeline {
            writer: self.writer,
            options: self.options,
            policy,
            progress: self.progress,
            state: self.state,
            stats: self.stats,
            skipped: self.skipped,
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn writer(&self) -> &DualSinkWriter<D, S> {
        &self.writer
    }

    /// Run a full load from the CSV files in `data_dir`
    pub async fn run(&mut self, data_dir: &Path) -> Result<LoadSummary, LoadFailure> {
        match self.execute(data_dir).await {
            Ok(summary) => Ok(summary),
            Err(error) => {
                let state = self.state;
                self.state = LoadState::Failed;
                error!(%state, %error, "Load failed");
                Err(LoadFailure {
                    state,
                    error,
                    stats: self.stats.clone(),
                })
            }
        }
    }

    async fn execute(&mut self, data_dir: &Path) -> Result<LoadSummary, EngineError> {
        let started = Instant::now();
        self.state = LoadState::Idle;
        self.stats = LoadStats::new();
        self.skipped = 0;

        // Nothing is touched until the input and both destinations check out
        if self.options.batch_size == 0 {
            return Err(DomainError::InvalidBatchSize(0).into());
        }
        let files = DataFiles::discover(data_dir).map_err(EngineError::from_discovery)?;
        self.writer.ping().await?;

        let destinations: Vec<String> = self.writer.names().map(str::to_string).to_vec();
        info!(
            data_dir = %data_dir.display(),
            batch_size = self.options.batch_size,
            transaction_limit = ?self.options.transaction_limit,
            dialect = %self.options.dialect,
            "Starting load"
        );
        self.progress.stage(LoadStage::Started, "Starting data load");

        self.state = LoadState::DroppingExisting;
        for entity in Entity::ALL {
            self.writer.drop_existing(entity).await?;
        }

        self.state = LoadState::CreatingSchemas;
        for entity in Entity::ALL {
            self.writer.create_schema(entity).await?;
        }

        self.load_entity::<RawUserRow>(&files.users, None).await?;
        self.load_entity::<RawCardRow>(&files.cards, None).await?;

        self.progress.stage(
            LoadStage::TransactionsStart,
            "Starting to load transactions",
        );
        self.load_entity::<RawTransactionRow>(&files.transactions, self.options.transaction_limit)
            .await?;

        self.state = LoadState::CreatingIndexes;
        self.progress
            .stage(LoadStage::Indexing, "Creating database indexes");
        for entity in Entity::ALL {
            self.writer.create_indexes(entity).await?;
        }

        self.writer.refresh(&Entity::ALL).await?;

        let mut destination_counts: BTreeMap<String, BTreeMap<Entity, u64>> = BTreeMap::new();
        for entity in Entity::ALL {
            let counts = self.writer.counts(entity).await?;
            let [document, search] = self.writer.names();
            destination_counts
                .entry(document.to_string())
                .or_default()
                .insert(entity, counts.document);
            destination_counts
                .entry(search.to_string())
                .or_default()
                .insert(entity, counts.search);
        }

        self.state = LoadState::Done;
        let elapsed_seconds = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        let summary = LoadSummary {
            total_users: self.stats.entity_total(Entity::Users),
            total_cards: self.stats.entity_total(Entity::Cards),
            total_transactions: self.stats.entity_total(Entity::Transactions),
            elapsed_seconds,
            databases: destinations,
            files_processed: files.csv_files.len(),
            skipped_rows: self.skipped,
            destination_counts,
        };

        self.progress.stage(
            LoadStage::Complete,
            format!("Data load complete in {elapsed_seconds}s"),
        );
        info!(
            users = summary.total_users,
            cards = summary.total_cards,
            transactions = summary.total_transactions,
            elapsed_seconds,
            "Load complete"
        );
        Ok(summary)
    }

    async fn load_entity<W: RawRow>(
        &mut self,
        path: &Path,
        cap: Option<u64>,
    ) -> Result<u64, EngineError> {
        let entity = <W::Output as Record>::ENTITY;
        self.state = LoadState::loading(entity);
        debug!(%entity, path = %path.display(), ?cap, "Loading entity");

        let source = CsvRecordStream::<W>::from_file(path, self.options.dialect).await?;
        let accumulator = BatchAccumulator::new(self.options.batch_size)?.with_cap(cap);
        let mut batches = BatchStream::new(source, accumulator, &self.policy);
        let [document_name, search_name] = self.writer.names();

        let mut loaded = 0u64;
        while let Some(batch) = batches.next().await {
            let batch = batch?;

            let ack = match self.writer.write(&batch).await {
                Ok(ack) => ack,
                Err(error) => {
                    if let WriteError::Partial {
                        succeeded,
                        accepted,
                        ..
                    } = &error
                    {
                        self.stats.record_destination(entity, succeeded, *accepted);
                    }
                    self.skipped += batches.skipped();
                    return Err(error.into());
                }
            };

            self.stats
                .record_entity(entity, ack.document.min(ack.search));
            self.stats
                .record_destination(entity, document_name, ack.document);
            self.stats.record_destination(entity, search_name, ack.search);

            loaded += batch.len() as u64;
            self.progress.batch_written(entity, loaded);
        }

        self.skipped += batches.skipped();
        self.progress.entity_complete(entity, loaded);
        info!(%entity, loaded, skipped = batches.skipped(), "Entity loaded");
        Ok(loaded)
    }
}
