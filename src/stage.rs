//! Stage contracts and the tagged stage variants a chain executes.
//!
//! A stage is one of three shapes, selected at construction so the
//! chain's evaluation can switch on the variant deterministically:
//!
//! - [`Transform`] - pure one-to-one mapping, one call per record.
//! - [`Aggregate`] - consumes the entire upstream sequence before
//!   emitting anything (grouping, counting).
//! - [`Output`] - terminal side effect; the record passes through
//!   unchanged, so outputs are usable mid-chain.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::PipelineError;

/// One-to-one record transform, invoked once per incoming record, in
/// order, with no buffering.
pub trait Transform<R> {
    /// Name used in contract-violation error messages.
    fn name(&self) -> &str {
        "transform"
    }

    /// Process a single record.
    ///
    /// The default body fails with [`PipelineError::Unimplemented`]:
    /// every concrete transform must override it.
    fn process(&mut self, record: R) -> Result<R, PipelineError> {
        drop(record);
        Err(PipelineError::Unimplemented {
            stage: self.name().to_string(),
        })
    }
}

/// Whole-sequence aggregation: sees every upstream record before any
/// output becomes visible downstream.
pub trait Aggregate<R> {
    /// Name used in error messages.
    fn name(&self) -> &str {
        "aggregate"
    }

    /// Fold one upstream record into internal state.
    fn accumulate(&mut self, record: R) -> Result<(), PipelineError>;

    /// Emit the aggregated records once upstream is exhausted.
    ///
    /// The emission order must be deterministic and documented by each
    /// concrete aggregator.
    fn extract(&mut self) -> Vec<R>;
}

/// Terminal side effect. The chain calls `out` once per record, in
/// record order, then forwards the record unchanged.
pub trait Output<R> {
    /// Name used in error messages.
    fn name(&self) -> &str {
        "output"
    }

    /// Observe one record for its side effect.
    fn out(&mut self, record: &R) -> Result<(), PipelineError>;
}

/// A unit of work inside a chain, tagged by composition behavior.
pub enum Stage<R> {
    /// Per-record streaming transform.
    Transform(Box<dyn Transform<R>>),
    /// Materialize upstream, then emit.
    Aggregate(Box<dyn Aggregate<R>>),
    /// Pass-through side effect.
    Output(Box<dyn Output<R>>),
    /// An entire sub-chain spliced in as one opaque element.
    Spliced(Vec<Stage<R>>),
}

impl<R> Stage<R> {
    /// The display name of this stage.
    pub fn name(&self) -> &str {
        match self {
            Stage::Transform(t) => t.name(),
            Stage::Aggregate(a) => a.name(),
            Stage::Output(o) => o.name(),
            Stage::Spliced(_) => "spliced",
        }
    }

    /// Wrap a closure as a transform stage.
    pub fn transform_fn<F>(name: &'static str, f: F) -> Self
    where
        F: FnMut(R) -> Result<R, PipelineError> + 'static,
    {
        Stage::Transform(Box::new(FnTransform { name, f }))
    }

    /// Wrap a closure as an output stage.
    pub fn output_fn<F>(name: &'static str, f: F) -> Self
    where
        F: FnMut(&R) -> Result<(), PipelineError> + 'static,
    {
        Stage::Output(Box::new(FnOutput { name, f }))
    }
}

struct FnTransform<F> {
    name: &'static str,
    f: F,
}

impl<R, F> Transform<R> for FnTransform<F>
where
    F: FnMut(R) -> Result<R, PipelineError>,
{
    fn name(&self) -> &str {
        self.name
    }

    fn process(&mut self, record: R) -> Result<R, PipelineError> {
        (self.f)(record)
    }
}

struct FnOutput<F> {
    name: &'static str,
    f: F,
}

impl<R, F> Output<R> for FnOutput<F>
where
    F: FnMut(&R) -> Result<(), PipelineError>,
{
    fn name(&self) -> &str {
        self.name
    }

    fn out(&mut self, record: &R) -> Result<(), PipelineError> {
        (self.f)(record)
    }
}

/// Groups records by a caller-supplied key, emitting one built record
/// per distinct key in first-seen key order.
///
/// State is additive across traversals: `extract` does not clear the
/// groups, so an instance whose state is shared by two separately run
/// chains carries the first run's groups into the second. Call
/// [`GroupBy::reset`] between independent runs when that is not wanted.
pub struct GroupBy<R, K, KeyFn, BuildFn> {
    key: KeyFn,
    build: BuildFn,
    order: Vec<K>,
    groups: HashMap<K, Vec<R>>,
}

impl<R, K, KeyFn, BuildFn> GroupBy<R, K, KeyFn, BuildFn>
where
    K: Eq + Hash + Clone,
    KeyFn: FnMut(&R) -> K,
    BuildFn: FnMut(&K, &[R]) -> R,
{
    /// `key` extracts the grouping key from a record; `build` turns one
    /// (key, group) pair into an emitted record.
    pub fn new(key: KeyFn, build: BuildFn) -> Self {
        GroupBy {
            key,
            build,
            order: Vec::new(),
            groups: HashMap::new(),
        }
    }

    /// Discard all accumulated groups, making the instance safe to
    /// reuse in an independent run.
    pub fn reset(&mut self) {
        self.order.clear();
        self.groups.clear();
    }
}

impl<R, K, KeyFn, BuildFn> Aggregate<R> for GroupBy<R, K, KeyFn, BuildFn>
where
    K: Eq + Hash + Clone,
    KeyFn: FnMut(&R) -> K,
    BuildFn: FnMut(&K, &[R]) -> R,
{
    fn name(&self) -> &str {
        "group-by"
    }

    fn accumulate(&mut self, record: R) -> Result<(), PipelineError> {
        let key = (self.key)(&record);
        if !self.groups.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.groups.entry(key).or_default().push(record);
        Ok(())
    }

    fn extract(&mut self) -> Vec<R> {
        self.order
            .iter()
            .map(|key| (self.build)(key, &self.groups[key]))
            .collect()
    }
}
