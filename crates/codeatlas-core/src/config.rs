use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default)]
    pub quarantine: QuarantineConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineConfig {
    /// Files larger than this are quarantined without a parse attempt.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Maximum BFS depth over inbound `calls` edges.
    #[serde(default = "default_cascade_max_depth")]
    pub max_depth: usize,
    /// An entity with more callers than this stops the traversal at that node.
    #[serde(default = "default_hub_caller_cutoff")]
    pub hub_caller_cutoff: usize,
    /// Hard ceiling on the merged queue size.
    #[serde(default = "default_max_queue")]
    pub max_queue: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Upper bound on the textual representation handed to the embedder.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
}

fn default_max_file_bytes() -> u64 {
    1024 * 1024
}

fn default_cascade_max_depth() -> usize {
    3
}

fn default_hub_caller_cutoff() -> usize {
    25
}

fn default_max_queue() -> usize {
    500
}

fn default_max_text_chars() -> usize {
    2000
}

fn default_embed_batch_size() -> usize {
    64
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_depth: default_cascade_max_depth(),
            hub_caller_cutoff: default_hub_caller_cutoff(),
            max_queue: default_max_queue(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            max_text_chars: default_max_text_chars(),
            batch_size: default_embed_batch_size(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            quarantine: QuarantineConfig::default(),
            cascade: CascadeConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl IndexingConfig {
    /// Layered load: defaults, then an optional `codeatlas.toml`, then
    /// `CODEATLAS_*` environment overrides (e.g. `CODEATLAS_CASCADE__MAX_DEPTH`).
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("codeatlas").required(false))
            .add_source(config::Environment::with_prefix("CODEATLAS").separator("__"))
            .build()?;
        let cfg = settings.try_deserialize()?;
        Ok(cfg)
    }
}
