//! JSON export of resolved objects
//!
//! Overlap facts point back at the other object; only its index is written so
//! the output never expands recursively.

use crate::Result;
use anyhow::Context;
use hierbox_core::{HierObject, ObjectStore, Rect, Relations};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Serialize)]
struct ObjectJson<'a> {
    #[serde(rename = "imageID")]
    image_id: &'a str,
    label: &'a str,
    index: usize,
    #[serde(flatten)]
    rect: &'a Rect,
    #[serde(flatten)]
    relations: &'a Relations,
}

/// Serializes objects with their geometry and relations
#[derive(Debug, Clone)]
pub struct JsonExporter {
    overlap_info: bool,
    pretty: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            overlap_info: true,
            pretty: true,
        }
    }
}

impl JsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the per-label overlap facts of each object
    pub fn with_overlap_info(mut self, overlap_info: bool) -> Self {
        self.overlap_info = overlap_info;
        self
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// One object as a JSON value with sorted keys
    pub fn object_value(&self, object: &HierObject) -> Result<Value> {
        let view = ObjectJson {
            image_id: object.image_id(),
            label: object.label(),
            index: object.index(),
            rect: object.geometry(),
            relations: object.relations(),
        };
        let mut value = serde_json::to_value(view)
            .with_context(|| format!("Failed to serialize object {}", object.key()))?;

        if !self.overlap_info {
            if let Value::Object(fields) = &mut value {
                fields.remove("overlap");
            }
        }
        Ok(value)
    }

    /// All objects, nested as image id, then label, then index order
    pub fn store_value(&self, store: &ObjectStore) -> Result<Value> {
        let mut images = Map::new();
        for image in store.images() {
            let mut labels = Map::new();
            for label in image.labels() {
                let objects = image
                    .objects(label)
                    .iter()
                    .map(|object| self.object_value(object))
                    .collect::<Result<Vec<_>>>()?;
                labels.insert(label.to_string(), Value::Array(objects));
            }
            images.insert(image.image_id().to_string(), Value::Object(labels));
        }
        Ok(Value::Object(images))
    }

    pub fn to_string(&self, store: &ObjectStore) -> Result<String> {
        let value = self.store_value(store)?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        text.context("Failed to serialize objects")
    }

    /// Write every object of the store to `output_path`
    pub fn write<P: AsRef<Path>>(&self, store: &ObjectStore, output_path: P) -> Result<()> {
        let output_path = output_path.as_ref();
        let json = self.to_string(store)?;
        std::fs::write(output_path, json + "\n")
            .with_context(|| format!("Failed to write JSON to: {:?}", output_path))?;
        Ok(())
    }
}
