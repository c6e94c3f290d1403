//! Record sources: the origin of a chain's records.

use crate::chain::Chain;
use crate::error::PipelineError;
use crate::stage::Stage;

/// A boxed lazy sequence of records, each pull either a record or the
/// failure raised at that pull.
pub(crate) type RecordIter<R> = Box<dyn Iterator<Item = Result<R, PipelineError>>>;

/// The origin of a chain's records.
///
/// A source wraps an iterator and yields its items lazily; it never
/// copies or caches them. Whether a source's data can be traversed more
/// than once is entirely a property of the wrapped iterator — the
/// library guarantees single-pass consumption only.
pub struct Source<R> {
    records: RecordIter<R>,
}

impl<R: 'static> Source<R> {
    /// Wrap an infallible sequence of records.
    pub fn new<I>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        I::IntoIter: 'static,
    {
        Source {
            records: Box::new(records.into_iter().map(Ok)),
        }
    }

    /// Wrap a fallible sequence, such as `io::Lines`.
    ///
    /// An error from the underlying iterator propagates unmodified to
    /// the consumer at the pull that raised it.
    pub fn from_results<I, E>(records: I) -> Self
    where
        I: IntoIterator<Item = Result<R, E>>,
        I::IntoIter: 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Source {
            records: Box::new(
                records
                    .into_iter()
                    .map(|r| r.map_err(PipelineError::upstream)),
            ),
        }
    }

    /// Bind the first stage, producing a chain rooted at this source.
    pub fn append(self, stage: Stage<R>) -> Chain<R> {
        Chain::rooted(self).append(stage)
    }

    pub(crate) fn into_records(self) -> RecordIter<R> {
        self.records
    }
}

impl<R> IntoIterator for Source<R> {
    type Item = Result<R, PipelineError>;
    type IntoIter = RecordIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records
    }
}
