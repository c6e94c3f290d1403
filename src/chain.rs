//! Chain composition and lazy evaluation.
//!
//! A chain binds an ordered list of stages to at most one source and
//! exposes the combined operation as a lazy record sequence. Every
//! composer consumes its receiver and returns the extended chain, so a
//! chain value is never mutated while another owner can observe it.
//!
//! Evaluation is pull-based and single-threaded. Streaming stages
//! (transforms, outputs) apply record by record in strict upstream
//! order; an aggregate stage forms a barrier that absorbs the entire
//! upstream at the first downstream pull before its own records flow on
//! through the remaining stages.

use crate::error::PipelineError;
use crate::source::{RecordIter, Source};
use crate::stage::{Aggregate, Stage};

/// An ordered composition of stages, optionally bound to a source.
///
/// A chain without a source is a reusable sub-chain: it can be spliced
/// into another chain with [`Chain::concat`] or given a source later
/// with [`Chain::with_source`].
pub struct Chain<R> {
    source: Option<Source<R>>,
    stages: Vec<Stage<R>>,
}

impl<R: 'static> Chain<R> {
    /// A sourceless chain with no stages.
    pub fn new() -> Self {
        Chain {
            source: None,
            stages: Vec::new(),
        }
    }

    /// A sourceless chain holding a single stage.
    pub fn from_stage(stage: Stage<R>) -> Self {
        Chain::new().append(stage)
    }

    pub(crate) fn rooted(source: Source<R>) -> Self {
        Chain {
            source: Some(source),
            stages: Vec::new(),
        }
    }

    /// Append one stage, preserving the order of all prior stages.
    pub fn append(mut self, stage: Stage<R>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Splice another chain onto the end of this one.
    ///
    /// The other chain's stages become a single opaque element: the
    /// resulting chain's [`stage_count`](Chain::stage_count) grows by
    /// exactly one, and records passing through it see all of the other
    /// chain's stages applied in their original order.
    ///
    /// Fails at composition time if `other` is bound to its own source;
    /// a chain pulls from exactly one origin.
    pub fn concat(mut self, other: Chain<R>) -> Result<Self, PipelineError> {
        if other.source.is_some() {
            return Err(PipelineError::InvalidComposition(
                "cannot splice a chain that is bound to its own source".to_string(),
            ));
        }
        self.stages.push(Stage::Spliced(other.stages));
        Ok(self)
    }

    /// Bind a source to a sourceless chain.
    ///
    /// Fails at composition time if a source is already bound.
    pub fn with_source(mut self, source: Source<R>) -> Result<Self, PipelineError> {
        if self.source.is_some() {
            return Err(PipelineError::InvalidComposition(
                "chain is already bound to a source".to_string(),
            ));
        }
        self.source = Some(source);
        Ok(self)
    }

    /// Whether a source is bound.
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// The number of stage elements, counting a spliced sub-chain as
    /// one element.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// The chain's lazy record sequence.
    ///
    /// Nothing is pulled from the source until the returned iterator
    /// is. Fails if the chain has no source.
    pub fn records(self) -> Result<ChainIter<R>, PipelineError> {
        let source = self.source.ok_or_else(|| {
            PipelineError::InvalidComposition("chain has no source".to_string())
        })?;
        Ok(ChainIter {
            inner: attach_stages(source.into_records(), self.stages),
            done: false,
        })
    }

    /// Pull every record and collect the results in source order.
    pub fn collect(self) -> Result<Vec<R>, PipelineError> {
        self.records()?.collect()
    }

    /// Pull every record through the full stage list and discard the
    /// results, relying on output stages' accumulated side effects.
    pub fn run(self) -> Result<(), PipelineError> {
        for record in self.records()? {
            record?;
        }
        Ok(())
    }
}

impl<R: 'static> Default for Chain<R> {
    fn default() -> Self {
        Chain::new()
    }
}

impl<R> std::fmt::Debug for Chain<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("has_source", &self.source.is_some())
            .field("stages", &self.stages.iter().map(Stage::name).collect::<Vec<_>>())
            .finish()
    }
}

impl<R: 'static> IntoIterator for Chain<R> {
    type Item = Result<R, PipelineError>;
    type IntoIter = ChainIter<R>;

    fn into_iter(self) -> ChainIter<R> {
        match self.records() {
            Ok(iter) => iter,
            Err(err) => ChainIter {
                inner: Box::new(std::iter::once(Err(err))),
                done: false,
            },
        }
    }
}

/// Layer each stage over the upstream sequence, in list order.
fn attach_stages<R: 'static>(mut upstream: RecordIter<R>, stages: Vec<Stage<R>>) -> RecordIter<R> {
    for stage in stages {
        upstream = match stage {
            Stage::Transform(mut transform) => {
                Box::new(upstream.map(move |r| r.and_then(|rec| transform.process(rec))))
            }
            Stage::Output(mut output) => Box::new(upstream.map(move |r| {
                r.and_then(|rec| {
                    output.out(&rec)?;
                    Ok(rec)
                })
            })),
            Stage::Aggregate(aggregate) => Box::new(Drain::new(upstream, aggregate)),
            Stage::Spliced(inner) => attach_stages(upstream, inner),
        };
    }
    upstream
}

/// Absorbs its entire upstream into an aggregate at the first pull,
/// then yields the aggregate's extracted records one at a time.
struct Drain<R> {
    upstream: Option<RecordIter<R>>,
    aggregate: Box<dyn Aggregate<R>>,
    extracted: std::vec::IntoIter<R>,
}

impl<R> Drain<R> {
    fn new(upstream: RecordIter<R>, aggregate: Box<dyn Aggregate<R>>) -> Self {
        Drain {
            upstream: Some(upstream),
            aggregate,
            extracted: Vec::new().into_iter(),
        }
    }
}

impl<R> Iterator for Drain<R> {
    type Item = Result<R, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(mut upstream) = self.upstream.take() {
            for record in upstream.by_ref() {
                match record {
                    Ok(rec) => {
                        if let Err(err) = self.aggregate.accumulate(rec) {
                            return Some(Err(err));
                        }
                    }
                    // An upstream failure surfaces here; the dropped
                    // upstream leaves this drain exhausted.
                    Err(err) => return Some(Err(err)),
                }
            }
            self.extracted = self.aggregate.extract().into_iter();
        }
        self.extracted.next().map(Ok)
    }
}

/// Pull-based iterator over a chain's records.
///
/// Yields `Err` at the pull where the source or a stage failed; after
/// an error the iterator is exhausted and further pulls return `None`.
pub struct ChainIter<R> {
    inner: RecordIter<R>,
    done: bool,
}

impl<R> Iterator for ChainIter<R> {
    type Item = Result<R, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
