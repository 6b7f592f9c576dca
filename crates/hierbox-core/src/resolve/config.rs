//! Resolution configuration

use serde::{Deserialize, Serialize};
use std::fmt;

/// IoU above which two same-label annotations describe the same object
pub const DUPLICATE_IOU_THRESHOLD: f64 = 0.5;

/// Settings shared by every pass of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub duplicate_iou_threshold: f64,
    /// Process images on the rayon pool when the `parallel` feature is on
    pub parallel_images: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            duplicate_iou_threshold: DUPLICATE_IOU_THRESHOLD,
            parallel_images: false,
        }
    }
}

impl ResolveConfig {
    /// One image after the other on the calling thread
    pub fn sequential() -> Self {
        Self::default()
    }

    /// Images spread across the rayon pool
    pub fn parallel() -> Self {
        Self {
            parallel_images: true,
            ..Default::default()
        }
    }
}

/// A declared (child label, parent label) relationship
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelPair {
    pub child: String,
    pub parent: String,
}

impl LabelPair {
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }
}

impl fmt::Display for LabelPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.child, self.parent)
    }
}

impl<C: Into<String>, P: Into<String>> From<(C, P)> for LabelPair {
    fn from((child, parent): (C, P)) -> Self {
        Self::new(child, parent)
    }
}
