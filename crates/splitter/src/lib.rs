pub mod batcher;
pub mod error;
pub mod pipeline;
pub mod writer;

pub use batcher::{BatchBound, SequenceBatcher, SplitSummary, measure};
pub use error::SplitError;
pub use pipeline::split_collection;
pub use writer::BatchWriter;
