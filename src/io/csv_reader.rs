use std::marker::PhantomData;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio_util::compat::TokioAsyncReadCompatExt;

use super::error::IoError;
use super::parse::RawRow;
use crate::domain::RowDialect;

/// Async stream of typed records read one CSV row at a time
///
/// Row-level failures surface as `Err` items; what to do with them is left
/// to the consumer's error policy.
pub struct CsvRecordStream<W>
where
    W: RawRow,
{
    inner: Pin<Box<dyn Stream<Item = Result<W::Output, IoError>> + Send>>,
    _row: PhantomData<fn() -> W>,
}

impl<W> CsvRecordStream<W>
where
    W: RawRow,
{
    /// Create a new record stream from an async reader
    pub fn new<R>(reader: R, dialect: RowDialect) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let csv_reader = AsyncReaderBuilder::new()
            .trim(csv_async::Trim::All)
            .flexible(true)
            .create_deserializer(reader);

        let stream = csv_reader
            .into_deserialize::<W>()
            .map(move |result| {
                result
                    .map_err(IoError::from)
                    .and_then(|raw| raw.parse(dialect))
            });

        Self {
            inner: Box::pin(stream),
            _row: PhantomData,
        }
    }

    /// Create a new record stream from a file path
    ///
    /// Opens the file asynchronously and handles tokio-futures compatibility internally.
    ///
    /// # Example
    /// ```rust,ignore
    /// let users = CsvRecordStream::<RawUserRow>::from_file("users_data.csv", RowDialect::Loader).await?;
    /// ```
    pub async fn from_file(path: impl AsRef<Path>, dialect: RowDialect) -> Result<Self, IoError> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self::new(file.compat(), dialect))
    }
}

impl<W> Stream for CsvRecordStream<W>
where
    W: RawRow,
{
    type Item = Result<W::Output, IoError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
