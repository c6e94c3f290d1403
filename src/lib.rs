//! # streamchain
//!
//! Lazy, record-oriented stream pipeline composition.
//!
//! A pipeline is built by appending reusable stages to a [`Source`],
//! producing a [`Chain`]. Stages come in three shapes:
//!
//! - **Transforms** map one record to one record, streaming.
//! - **Aggregates** consume the entire upstream sequence before
//!   emitting anything (grouping, counting).
//! - **Outputs** observe each record for its side effect and pass it
//!   through unchanged.
//!
//! Chains evaluate lazily: nothing is pulled from the source until the
//! chain is iterated, collected, or run. Already-built sourceless
//! chains can be spliced into new chains with [`Chain::concat`].
//!
//! ## Example
//!
//! ```
//! use streamchain::{Source, Stage};
//!
//! let chain = Source::new([2_i64, 3])
//!     .append(Stage::transform_fn("add2", |n| Ok(n + 2)))
//!     .append(Stage::transform_fn("mul2", |n| Ok(n * 2)));
//!
//! assert_eq!(chain.collect().unwrap(), vec![8, 10]);
//! ```

pub mod chain;
pub mod error;
pub mod source;
pub mod stage;

pub use chain::{Chain, ChainIter};
pub use error::PipelineError;
pub use source::Source;
pub use stage::{Aggregate, GroupBy, Output, Stage, Transform};
