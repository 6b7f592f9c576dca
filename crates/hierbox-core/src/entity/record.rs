use crate::error::HierError;
use serde::{Deserialize, Serialize};

/// Normalized input for one annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub image_id: String,
    pub label: String,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl ObjectRecord {
    pub fn new(
        image_id: impl Into<String>,
        label: impl Into<String>,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            label: label.into(),
            x0,
            y0,
            x1,
            y1,
        }
    }
}

/// Conversion from an annotation source into a normalized record.
///
/// Adapters for a particular annotation schema implement this so that the
/// store can ingest their rows directly.
pub trait ToRecord {
    type Error: From<HierError>;

    fn to_record(&self) -> Result<ObjectRecord, Self::Error>;
}

impl ToRecord for ObjectRecord {
    type Error = HierError;

    fn to_record(&self) -> Result<ObjectRecord, HierError> {
        Ok(self.clone())
    }
}
