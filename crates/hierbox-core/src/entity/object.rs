use crate::error::{HierError, Result};
use crate::geometry::Rect;
use crate::overlap::OverlapFact;
use crate::entity::ObjectRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Handle to one object: image, label and position within that label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub image_id: String,
    pub label: String,
    pub index: usize,
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.label, self.index, self.image_id)
    }
}

/// Facts filled in by the resolution passes.
///
/// `None` means the pass that owns the field has not touched this object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Relations {
    /// Overlap facts keyed by the other object's label, in comparison order
    pub overlap: Option<BTreeMap<String, Vec<OverlapFact>>>,
    pub duplicate: Option<bool>,
    /// Parent index keyed by parent label
    pub parent: Option<BTreeMap<String, usize>>,
    /// Child indices keyed by child label
    pub children: Option<BTreeMap<String, Vec<usize>>>,
}

/// An annotation with fixed geometry and relations found later
#[derive(Debug, Clone, PartialEq)]
pub struct HierObject {
    image_id: String,
    label: String,
    index: usize,
    rect: Rect,
    pub(crate) relations: Relations,
}

impl HierObject {
    pub(crate) fn new(record: ObjectRecord, index: usize) -> Result<Self> {
        let ObjectRecord {
            image_id,
            label,
            x0,
            y0,
            x1,
            y1,
        } = record;

        let rect = match Rect::new(x0, y0, x1, y1) {
            Ok(rect) => rect,
            Err(source) => {
                return Err(HierError::InvalidBox {
                    image_id,
                    label,
                    x0,
                    y0,
                    x1,
                    y1,
                    source,
                });
            }
        };

        Ok(Self {
            image_id,
            label,
            index,
            rect,
            relations: Relations::default(),
        })
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey {
            image_id: self.image_id.clone(),
            label: self.label.clone(),
            index: self.index,
        }
    }

    pub fn geometry(&self) -> &Rect {
        &self.rect
    }

    pub fn bbox(&self) -> (f64, f64, f64, f64) {
        self.rect.bbox()
    }

    pub fn rect(&self) -> (f64, f64, f64, f64) {
        self.rect.rect()
    }

    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Overlap facts against objects labelled `label`
    pub fn overlaps_with(&self, label: &str) -> &[OverlapFact] {
        self.relations
            .overlap
            .as_ref()
            .and_then(|overlap| overlap.get(label))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True only once the object has been flagged as a duplicate
    pub fn is_duplicate(&self) -> bool {
        self.relations.duplicate == Some(true)
    }

    pub fn parent(&self, parent_label: &str) -> Option<usize> {
        self.relations.parent.as_ref()?.get(parent_label).copied()
    }

    pub fn children(&self, child_label: &str) -> &[usize] {
        self.relations
            .children
            .as_ref()
            .and_then(|children| children.get(child_label))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True if an object of this label with a larger index overlaps this one
    /// with IoU above `threshold`, which makes this annotation redundant.
    pub fn redundant_and_not_last(&self, threshold: f64) -> bool {
        self.overlaps_with(&self.label)
            .iter()
            .any(|fact| fact.iou > threshold && fact.index > self.index)
    }
}

impl fmt::Display for HierObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x0={:5.3} x1={:5.3} y0={:5.3} y1={:5.3} lbl={} {} img={}",
            self.rect.x0, self.rect.x1, self.rect.y0, self.rect.y1, self.label, self.index, self.image_id
        )
    }
}
