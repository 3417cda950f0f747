use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use pin_project_lite::pin_project;

use super::error::ErrorPolicy;
use crate::domain::{Batch, BatchAccumulator};
use crate::io::IoError;

pin_project! {
    /// Groups a record stream into batches
    ///
    /// The source is only polled while the consumer is waiting for the next
    /// batch, so a slow writer holds back reading. Once the accumulator's
    /// cap is reached the source is never polled again.
    pub struct BatchStream<S, R, P> {
        #[pin]
        source: S,
        accumulator: BatchAccumulator<R>,
        policy: P,
        skipped: u64,
        done: bool,
    }
}

impl<S, R, P> BatchStream<S, R, P>
where
    S: Stream<Item = Result<R, IoError>>,
    P: ErrorPolicy,
{
    pub fn new(source: S, accumulator: BatchAccumulator<R>, policy: P) -> Self {
        Self {
            source,
            accumulator,
            policy,
            skipped: 0,
            done: false,
        }
    }

    /// Rows dropped by the error policy so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Records accepted into batches so far
    pub fn accepted(&self) -> u64 {
        self.accumulator.accepted()
    }
}

impl<S, R, P> Stream for BatchStream<S, R, P>
where
    S: Stream<Item = Result<R, IoError>>,
    P: ErrorPolicy,
{
    type Item = Result<Batch<R>, IoError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        loop {
            if this.accumulator.is_capped() {
                *this.done = true;
                return Poll::Ready(this.accumulator.finish().map(Ok));
            }

            match ready!(this.source.as_mut().poll_next(cx)) {
                Some(Ok(record)) => {
                    if let Some(batch) = this.accumulator.push(record) {
                        return Poll::Ready(Some(Ok(batch)));
                    }
                }
                Some(Err(error)) => {
                    if error.is_row_level() && this.policy.handle_row_error(&error) {
                        *this.skipped += 1;
                        continue;
                    }
                    *this.done = true;
                    return Poll::Ready(Some(Err(error)));
                }
                None => {
                    *this.done = true;
                    return Poll::Ready(this.accumulator.finish().map(Ok));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::error::{AbortOnError, SilentSkip};
    use futures::{StreamExt, stream};
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn ok_records(n: u32) -> impl Stream<Item = Result<u32, IoError>> {
        stream::iter((0..n).map(Ok))
    }

    fn sizes(batches: &[Result<Batch<u32>, IoError>]) -> Vec<usize> {
        batches
            .iter()
            .map(|b| b.as_ref().map(Batch::len).unwrap_or(0))
            .collect()
    }

    #[tokio::test]
    async fn yields_full_batches_then_remainder() {
        let accumulator = BatchAccumulator::new(10).unwrap();
        let batches: Vec<_> = BatchStream::new(ok_records(25), accumulator, SilentSkip)
            .collect()
            .await;

        assert_eq!(sizes(&batches), vec![10, 10, 5]);
        let sequences: Vec<_> = batches
            .iter()
            .map(|b| b.as_ref().unwrap().sequence())
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn exact_multiple_has_no_empty_tail() {
        let accumulator = BatchAccumulator::new(10).unwrap();
        let batches: Vec<_> = BatchStream::new(ok_records(20), accumulator, SilentSkip)
            .collect()
            .await;

        assert_eq!(sizes(&batches), vec![10, 10]);
    }

    #[tokio::test]
    async fn cap_stops_pulling_the_source() {
        let pulled = Arc::new(AtomicU64::new(0));
        let counter = pulled.clone();
        let source = stream::iter(0..1_000u32)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .map(Ok);

        let accumulator = BatchAccumulator::new(10).unwrap().with_cap(Some(25));
        let batches: Vec<_> = BatchStream::new(source, accumulator, SilentSkip)
            .collect()
            .await;

        assert_eq!(sizes(&batches), vec![10, 10, 5]);
        assert_eq!(pulled.load(Ordering::SeqCst), 25);
    }

    #[tokio::test]
    async fn zero_cap_yields_nothing() {
        let pulled = Arc::new(AtomicU64::new(0));
        let counter = pulled.clone();
        let source = stream::iter(0..10u32)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .map(Ok);

        let accumulator = BatchAccumulator::new(10).unwrap().with_cap(Some(0));
        let batches: Vec<_> = BatchStream::new(source, accumulator, SilentSkip)
            .collect()
            .await;

        assert!(batches.is_empty());
        assert_eq!(pulled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn row_errors_are_skipped_and_counted() {
        let source = stream::iter(vec![
            Ok(1u32),
            Err(IoError::MissingField("id".to_string())),
            Ok(2),
            Ok(3),
        ]);
        let accumulator = BatchAccumulator::new(10).unwrap();
        let mut batches = BatchStream::new(source, accumulator, SilentSkip);

        let batch = batches.next().await.unwrap().unwrap();
        assert_eq!(batch.records(), &[1, 2, 3]);
        assert!(batches.next().await.is_none());
        assert_eq!(batches.skipped(), 1);
        assert_eq!(batches.accepted(), 3);
    }

    #[tokio::test]
    async fn abort_policy_surfaces_row_error() {
        let source = stream::iter(vec![
            Ok(1u32),
            Err(IoError::MissingField("id".to_string())),
            Ok(2),
        ]);
        let accumulator = BatchAccumulator::new(10).unwrap();
        let batches: Vec<_> = BatchStream::new(source, accumulator, AbortOnError)
            .collect()
            .await;

        assert_eq!(batches.len(), 1);
        assert!(matches!(batches[0], Err(IoError::MissingField(_))));
    }

    #[tokio::test]
    async fn io_errors_are_always_fatal() {
        let source = stream::iter(vec![
            Ok(1u32),
            Err(IoError::Io(io::Error::new(io::ErrorKind::Other, "disk"))),
            Ok(2),
        ]);
        let accumulator = BatchAccumulator::new(10).unwrap();
        let batches: Vec<_> = BatchStream::new(source, accumulator, SilentSkip)
            .collect()
            .await;

        assert_eq!(batches.len(), 1);
        assert!(matches!(batches[0], Err(IoError::Io(_))));
    }

    #[test]
    fn partial_batch_waits_for_source_to_end() {
        use futures::channel::mpsc;
        use tokio_test::{assert_pending, assert_ready, task};

        let (sender, receiver) = mpsc::unbounded::<Result<u32, IoError>>();
        let accumulator = BatchAccumulator::new(10).unwrap();
        let mut batches = task::spawn(BatchStream::new(receiver, accumulator, SilentSkip));

        for n in 0..3 {
            sender.unbounded_send(Ok(n)).unwrap();
        }
        assert_pending!(batches.poll_next());

        drop(sender);
        assert!(batches.is_woken());
        let batch = assert_ready!(batches.poll_next()).unwrap().unwrap();
        assert_eq!(batch.len(), 3);
        assert!(assert_ready!(batches.poll_next()).is_none());
    }
}
