use std::mem;

use super::error::DomainError;

/// Default number of records per bulk write
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// An ordered, bounded group of records of one type
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<R> {
    sequence: u64,
    records: Vec<R>,
}

impl<R> Batch<R> {
    pub fn new(sequence: u64, records: Vec<R>) -> Self {
        Self { sequence, records }
    }

    /// Zero-based position of this batch within its stream
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

/// Buffers records into batches of a fixed size, with an optional global cap
///
/// Once the cap is reached the accumulator stops accepting input and the
/// current (possibly short) batch is released immediately.
#[derive(Debug)]
pub struct BatchAccumulator<R> {
    buffer: Vec<R>,
    batch_size: usize,
    cap: Option<u64>,
    accepted: u64,
    next_sequence: u64,
    capped: bool,
}

impl<R> BatchAccumulator<R> {
    /// Create an accumulator yielding batches of `batch_size` records
    pub fn new(batch_size: usize) -> Result<Self, DomainError> {
        if batch_size == 0 {
            return Err(DomainError::InvalidBatchSize(batch_size));
        }

        Ok(Self {
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            cap: None,
            accepted: 0,
            next_sequence: 0,
            capped: false,
        })
    }

    /// Limit the total number of records accepted across all batches
    pub fn with_cap(mut self, cap: Option<u64>) -> Self {
        self.cap = cap;
        self.capped = cap == Some(0);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Total records accepted so far
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// True once the cap has been reached; the source should stop producing
    pub fn is_capped(&self) -> bool {
        self.capped
    }

    /// Accept one record, returning a batch when one is ready
    ///
    /// Records pushed after the cap is reached are dropped.
    pub fn push(&mut self, record: R) -> Option<Batch<R>> {
        if self.capped {
            return None;
        }

        self.buffer.push(record);
        self.accepted += 1;

        if self.cap.is_some_and(|cap| self.accepted >= cap) {
            self.capped = true;
            return self.take();
        }

        if self.buffer.len() >= self.batch_size {
            return self.take();
        }

        None
    }

    /// Release the remaining partial batch at end of input
    pub fn finish(&mut self) -> Option<Batch<R>> {
        self.take()
    }

    fn take(&mut self) -> Option<Batch<R>> {
        if self.buffer.is_empty() {
            return None;
        }

        let records = mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let batch = Batch::new(self.next_sequence, records);
        self.next_sequence += 1;
        Some(batch)
    }
}
