//! Synthetic nested annotations
//!
//! Builds pseudo random images whose objects nest the way real annotations
//! do (groups holding heads holding eyes), together with the relations the
//! generator intended. Used to exercise the engine on inputs nobody wrote by
//! hand.

pub mod allocate;
pub mod generator;

pub use allocate::Bounds;
pub use generator::SynthGenerator;

use hierbox_core::{LabelPair, ObjectKey, ObjectRecord, ObjectStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How to generate the objects of one kind at one hierarchy level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectParams {
    /// Class label, or `None` for a group of overlapping objects that is not
    /// itself annotated
    pub label: Option<String>,
    /// Inclusive range of objects per parent
    pub count: (usize, usize),
    /// Inclusive range of extra annotations per object
    pub duplicates: Option<(usize, usize)>,
    /// Space is never split below this width or height
    pub min_size: f64,
    /// Space is preferably not split below this width or height
    pub suggested_min_size: f64,
    /// Largest width and height relative to the parent
    pub ratio: f64,
}

impl ObjectParams {
    pub fn group(count: (usize, usize)) -> Self {
        Self {
            label: None,
            count,
            duplicates: None,
            min_size: 0.02,
            suggested_min_size: 0.1,
            ratio: 0.99,
        }
    }

    pub fn labelled(label: &str, count: (usize, usize), duplicates: (usize, usize)) -> Self {
        Self {
            label: Some(label.to_string()),
            count,
            duplicates: Some(duplicates),
            min_size: 0.02,
            suggested_min_size: 0.1,
            ratio: 0.99,
        }
    }

    pub fn sizes(mut self, min_size: f64, suggested_min_size: f64, ratio: f64) -> Self {
        self.min_size = min_size;
        self.suggested_min_size = suggested_min_size;
        self.ratio = ratio;
        self
    }
}

/// Object kinds generated side by side at one level
pub type Level = Vec<ObjectParams>;

/// Generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Candidate hierarchies, outermost level first; one is picked per example
    pub hierarchies: Vec<Vec<Level>>,
    pub total: Bounds,
    pub image_id: String,
    /// Smallest IoU between an object and its duplicate annotations
    pub min_duplicate_iou: f64,
}

fn leaves() -> Level {
    vec![
        ObjectParams::labelled("eye", (0, 3), (0, 1)).sizes(0.01, 0.05, 0.5),
        ObjectParams::labelled("nose", (0, 2), (0, 1)).sizes(0.01, 0.05, 0.5),
    ]
}

impl Default for SynthConfig {
    fn default() -> Self {
        let group = || vec![ObjectParams::group((1, 20))];
        let head = || vec![ObjectParams::labelled("head", (1, 5), (0, 1))];
        let face_root = vec![ObjectParams::labelled("face", (1, 5), (0, 1)).sizes(0.02, 0.1, 1.0)];
        let face_inside = vec![ObjectParams::labelled("face", (1, 1), (0, 1))];

        Self {
            hierarchies: vec![
                vec![group(), head(), leaves()],
                vec![group(), face_root, leaves()],
                vec![group(), head(), face_inside, leaves()],
                vec![leaves()],
            ],
            total: Bounds::UNIT,
            image_id: "1".to_string(),
            min_duplicate_iou: 0.8,
        }
    }
}

impl SynthConfig {
    /// Three groups of two heads with two eyes each, no duplicates
    pub fn small() -> Self {
        Self {
            hierarchies: vec![vec![
                vec![ObjectParams::group((3, 3))],
                vec![ObjectParams::labelled("head", (2, 2), (0, 0))],
                vec![ObjectParams::labelled("eye", (2, 2), (0, 0)).sizes(0.01, 0.05, 0.5)],
            ]],
            ..Default::default()
        }
    }
}

/// Relations the generator built an object to have
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expected {
    /// Creation order of the object
    pub idx: usize,
    pub label: String,
    pub xc: f64,
    pub yc: f64,
    /// Objects holding this one's center, by label, as creation indices
    pub parents: BTreeMap<String, Vec<usize>>,
    /// The subset of `parents` holding this whole object
    pub enclosing: BTreeMap<String, Vec<usize>>,
    /// Objects whose center this one holds, by label, as creation indices
    pub children: BTreeMap<String, Vec<usize>>,
    /// Same-label annotations overlapping this one with IoU above the
    /// duplicate threshold, including the ones generated as its duplicates
    pub duplicates: Vec<usize>,
}

/// A generated annotation and what it was meant to be
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthObject {
    pub record: ObjectRecord,
    pub expected: Expected,
}

/// One generated image, objects in shuffled order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthExample {
    pub objects: Vec<SynthObject>,
    /// Every (child, parent) label pair the chosen hierarchy allows
    pub pairs: Vec<LabelPair>,
}

impl SynthExample {
    /// Insert the objects in their shuffled order, returning the handle of
    /// each by creation index
    pub fn load_into(&self, store: &mut ObjectStore) -> hierbox_core::Result<BTreeMap<usize, ObjectKey>> {
        let mut keys = BTreeMap::new();
        for object in &self.objects {
            let key = store.insert(object.record.clone())?;
            keys.insert(object.expected.idx, key);
        }
        Ok(keys)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
