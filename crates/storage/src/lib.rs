pub mod error;
pub mod line_source;
pub mod location;
pub mod probe;
pub mod read;
pub mod staging;
pub mod store;

pub use error::StorageError;
pub use line_source::ReadableLineSource;
pub use location::{Packing, Scheme, SourceLocation};
pub use read::{RemoteConfig, open_line_source};
pub use staging::StagingArea;
pub use store::{MemoryStore, ObjectStore, store_for};
