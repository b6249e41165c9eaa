pub mod engine;
pub mod resolver;

pub use engine::{DeferredAck, ScoringEngine};
pub use resolver::{DatasetResolver, HttpDatasetResolver, StaticDatasetResolver};
