pub mod invalidation;

pub use invalidation::{CacheInvalidator, InvalidationReport};
