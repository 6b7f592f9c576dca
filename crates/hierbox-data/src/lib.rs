//! Adapters around the hierarchy engine
//!
//! Loading "Open Images" style annotation rows, exporting resolved objects as
//! JSON, and generating synthetic nested annotations for testing.

pub mod export;
pub mod openimages;
pub mod synth;

// Re-export commonly used types
pub use export::JsonExporter;
pub use openimages::{OpenImagesLoader, OpenImagesRow};
pub use synth::{SynthConfig, SynthExample, SynthGenerator};

// Error handling
pub type Result<T> = anyhow::Result<T>;
