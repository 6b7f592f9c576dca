//! "Open Images" annotation rows

pub mod loader;

pub use loader::{LoadStats, OpenImagesLoader};

use hierbox_core::{HierError, ObjectRecord, ToRecord};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One annotation row with coordinates kept as the text found in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenImagesRow {
    #[serde(rename = "ImageID")]
    pub image_id: String,
    #[serde(rename = "LabelName")]
    pub label_name: String,
    #[serde(rename = "XMin")]
    pub x_min: String,
    #[serde(rename = "XMax")]
    pub x_max: String,
    #[serde(rename = "YMin")]
    pub y_min: String,
    #[serde(rename = "YMax")]
    pub y_max: String,
}

/// Problems turning a row into a record
#[derive(Debug, Error)]
pub enum RowError {
    #[error("column {column} has value {value:?} which is not a number")]
    BadCoordinate { column: &'static str, value: String },
    #[error(transparent)]
    Invalid(#[from] HierError),
}

fn parse_coordinate(column: &'static str, value: &str) -> Result<f64, RowError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| RowError::BadCoordinate {
            column,
            value: value.to_string(),
        })
}

impl OpenImagesRow {
    pub fn new(
        image_id: impl Into<String>,
        label_name: impl Into<String>,
        (x_min, x_max, y_min, y_max): (f64, f64, f64, f64),
    ) -> Self {
        Self {
            image_id: image_id.into(),
            label_name: label_name.into(),
            x_min: x_min.to_string(),
            x_max: x_max.to_string(),
            y_min: y_min.to_string(),
            y_max: y_max.to_string(),
        }
    }
}

impl ToRecord for OpenImagesRow {
    type Error = RowError;

    fn to_record(&self) -> Result<ObjectRecord, RowError> {
        Ok(ObjectRecord::new(
            self.image_id.clone(),
            self.label_name.clone(),
            parse_coordinate("XMin", &self.x_min)?,
            parse_coordinate("YMin", &self.y_min)?,
            parse_coordinate("XMax", &self.x_max)?,
            parse_coordinate("YMax", &self.y_max)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hierbox_core::ObjectStore;

    #[test]
    fn test_row_to_record() {
        let row = OpenImagesRow {
            image_id: "1".into(),
            label_name: "Object".into(),
            x_min: "0.2".into(),
            x_max: "0.4".into(),
            y_min: " 0.3".into(),
            y_max: "0.5".into(),
        };
        let record = row.to_record().unwrap();
        assert_eq!(record, ObjectRecord::new("1", "Object", 0.2, 0.3, 0.4, 0.5));
    }

    #[test]
    fn test_bad_coordinate() {
        let mut row = OpenImagesRow::new("1", "eye", (0.1, 0.2, 0.1, 0.2));
        row.y_max = "tall".into();
        match row.to_record() {
            Err(RowError::BadCoordinate { column, value }) => {
                assert_eq!(column, "YMax");
                assert_eq!(value, "tall");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_store_rejects_inverted_row() {
        let mut store = ObjectStore::new();
        let row = OpenImagesRow::new("1", "eye", (0.3, 0.2, 0.1, 0.2));
        assert!(matches!(
            store.insert_from(&row),
            Err(RowError::Invalid(HierError::InvalidBox { .. }))
        ));
    }
}
