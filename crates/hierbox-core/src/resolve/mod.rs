//! Duplicate and parent resolution passes

pub mod config;
pub mod duplicates;
pub mod parents;

pub use config::{LabelPair, ResolveConfig, DUPLICATE_IOU_THRESHOLD};
pub use duplicates::{find_duplicates, resolve_image_duplicates};
pub use parents::{assign_image_parents, find_parent, PairOutcome};
