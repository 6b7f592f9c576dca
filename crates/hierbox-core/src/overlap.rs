//! Pairwise overlap facts
//!
//! Every pair of objects in an image is compared once, whatever their labels.
//! Each intersecting pair leaves one fact on both objects, filed under the
//! other object's label. Pairs that do not intersect leave nothing.

use crate::entity::{HierObject, ObjectKey};
use crate::error::{HierError, Result};
use crate::geometry::{iom, iou, round5};
use crate::store::{ImageObjects, ObjectStore};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// How an object overlaps one other object, seen from the first object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapFact {
    /// Index of the other object within its label
    pub index: usize,
    pub self_inside_other: bool,
    #[serde(rename = "center_of_self")]
    pub center_of_self_inside_other: bool,
    pub other_inside_self: bool,
    #[serde(rename = "center_of_other")]
    pub center_of_other_inside_self: bool,
    #[serde(rename = "intersection")]
    pub intersection_area: f64,
    pub iou: f64,
    pub iom: f64,
    /// The other object; never serialized
    #[serde(skip)]
    pub other: ObjectKey,
}

/// Compare two objects, returning the fact for each side if they intersect
pub fn compare(a: &HierObject, b: &HierObject) -> Option<(OverlapFact, OverlapFact)> {
    let (ra, rb) = (a.geometry(), b.geometry());
    if !ra.intersects(rb) {
        return None;
    }

    let center_a = ra.center_is_inside(rb);
    let center_b = rb.center_is_inside(ra);
    let inside_a = ra.is_inside(rb);
    let inside_b = rb.is_inside(ra);
    let intersection = ra.intersection_area(rb);
    let iou = iou(intersection, ra.area, rb.area);
    let iom = iom(intersection, ra.area, rb.area);
    let intersection = round5(intersection);

    let for_a = OverlapFact {
        index: b.index(),
        self_inside_other: inside_a,
        center_of_self_inside_other: center_a,
        other_inside_self: inside_b,
        center_of_other_inside_self: center_b,
        intersection_area: intersection,
        iou,
        iom,
        other: b.key(),
    };
    let for_b = OverlapFact {
        index: a.index(),
        self_inside_other: inside_b,
        center_of_self_inside_other: center_b,
        other_inside_self: inside_a,
        center_of_other_inside_self: center_a,
        intersection_area: intersection,
        iou,
        iom,
        other: a.key(),
    };
    Some((for_a, for_b))
}

/// Record overlap facts for every pair of objects in one image.
///
/// Returns the number of facts stored. Fails if the image was already
/// indexed, since a second run would store every fact twice.
pub fn index_image(image: &mut ImageObjects) -> Result<usize> {
    if image.state.overlaps_indexed {
        return Err(HierError::OverlapsAlreadyIndexed {
            image_id: image.image_id().to_string(),
        });
    }

    let flat: Vec<&HierObject> = image.iter().collect();
    let mut pending = Vec::new();
    for (i, a) in flat.iter().enumerate() {
        for b in &flat[i + 1..] {
            if let Some((for_a, for_b)) = compare(a, b) {
                pending.push((a.key(), for_a));
                pending.push((b.key(), for_b));
            }
        }
    }

    for object in image.iter_mut() {
        object.relations.overlap = Some(BTreeMap::new());
    }

    let stored = pending.len();
    for (owner, fact) in pending {
        if let Some(object) = image.get_mut(&owner.label, owner.index) {
            object
                .relations
                .overlap
                .get_or_insert_with(BTreeMap::new)
                .entry(fact.other.label.clone())
                .or_default()
                .push(fact);
        }
    }

    image.state.overlaps_indexed = true;
    debug!(
        image = image.image_id(),
        objects = image.len(),
        facts = stored,
        "indexed overlaps"
    );
    Ok(stored)
}

/// Index overlaps of every image in the store
pub fn index_overlaps(store: &mut ObjectStore) -> Result<usize> {
    let mut total = 0;
    for image in store.images_mut() {
        total += index_image(image)?;
    }
    Ok(total)
}

fn sort_desc_by<K, F>(facts: &[OverlapFact], mut key: F) -> Vec<OverlapFact>
where
    F: FnMut(&OverlapFact) -> K,
    K: PartialOrd,
{
    let mut sorted = facts.to_vec();
    sorted.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted
}

/// Copy of `facts` ordered by IoU, largest first; ties keep their order
pub fn sort_iou(facts: &[OverlapFact]) -> Vec<OverlapFact> {
    sort_desc_by(facts, |fact| fact.iou)
}

/// Copy of `facts` ranked as parent candidates: full containment first,
/// then center containment, then IoM, largest first; ties keep their order
pub fn sort_for_parent(facts: &[OverlapFact]) -> Vec<OverlapFact> {
    sort_desc_by(facts, |fact| {
        (
            fact.self_inside_other,
            fact.center_of_self_inside_other,
            fact.iom,
        )
    })
}
