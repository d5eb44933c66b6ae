pub mod client;
pub mod layers;
pub mod processor;
pub mod prompt;

pub use client::{ClientError, GenerationClient, JsonGenerator};
pub use layers::{default_layers, LlmLayer};
pub use processor::{resolve_conflicts, resolve_files, Reasoner, ResolveOptions, ResolveSummary};
