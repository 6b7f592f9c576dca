//! Duplicate annotation detection
//!
//! Among same-label annotations with IoU above the threshold, the one with the
//! larger index is kept and the other is flagged. The decision is made pair by
//! pair, not over whole clusters.

use super::config::ResolveConfig;
use crate::error::{HierError, Result};
use crate::store::{ImageObjects, ObjectStore};
use tracing::debug;

/// Flag duplicates within one image, returning how many were flagged
pub fn resolve_image_duplicates(image: &mut ImageObjects, config: &ResolveConfig) -> Result<usize> {
    if !image.state.overlaps_indexed {
        return Err(HierError::OverlapsNotIndexed {
            image_id: image.image_id().to_string(),
        });
    }

    let threshold = config.duplicate_iou_threshold;
    let mut flagged = 0;
    for object in image.iter_mut() {
        let duplicate = object.redundant_and_not_last(threshold);
        if duplicate {
            flagged += 1;
        }
        object.relations.duplicate = Some(duplicate);
    }

    image.state.duplicates_resolved = true;
    debug!(image = image.image_id(), flagged, "resolved duplicates");
    Ok(flagged)
}

/// Flag duplicates in every image of the store
pub fn find_duplicates(store: &mut ObjectStore, config: &ResolveConfig) -> Result<usize> {
    let mut total = 0;
    for image in store.images_mut() {
        total += resolve_image_duplicates(image, config)?;
    }
    Ok(total)
}
