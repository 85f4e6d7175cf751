pub mod embedding;

pub use embedding::{EmbeddingUpdater, entity_text};
