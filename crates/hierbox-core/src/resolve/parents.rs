//! Parent assignment for one declared (child label, parent label) pair
//!
//! A child only considers parents whose box holds the child's center and that
//! are not duplicates. When several qualify and at least one holds the whole
//! child, the partial ones are dropped. A parent is assigned only if a single
//! candidate is left; otherwise the child stays without a parent for that
//! label.

use super::config::LabelPair;
use crate::entity::HierObject;
use crate::error::{HierError, Result};
use crate::overlap::{sort_for_parent, OverlapFact};
use crate::store::{ImageObjects, ObjectStore};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Tally of what happened to the children of one label pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PairOutcome {
    /// Children that got exactly one parent
    pub assigned: usize,
    /// Children left without a parent because several candidates tied
    pub ambiguous: usize,
    /// Children with no candidate parent at all
    pub no_candidates: usize,
    /// Children skipped as duplicates
    pub duplicates: usize,
}

impl PairOutcome {
    pub fn merge(&mut self, other: &PairOutcome) {
        self.assigned += other.assigned;
        self.ambiguous += other.ambiguous;
        self.no_candidates += other.no_candidates;
        self.duplicates += other.duplicates;
    }
}

enum Choice {
    Duplicate,
    NoCandidates,
    Ambiguous(usize),
    Parent(usize),
}

/// Pick the parent of `child` among objects labelled `parent_label`
fn choose_parent(image: &ImageObjects, child: &HierObject, parent_label: &str) -> Choice {
    if child.is_duplicate() {
        return Choice::Duplicate;
    }

    let mut candidates: Vec<OverlapFact> = child
        .overlaps_with(parent_label)
        .iter()
        .filter(|fact| fact.center_of_self_inside_other)
        .filter(|fact| {
            image
                .get(parent_label, fact.index)
                .is_some_and(|parent| !parent.is_duplicate())
        })
        .cloned()
        .collect();

    if candidates.is_empty() {
        return Choice::NoCandidates;
    }

    if candidates.len() > 1 {
        candidates = sort_for_parent(&candidates);
        if candidates[0].self_inside_other {
            candidates.retain(|fact| fact.self_inside_other);
        }
    }

    match candidates.as_slice() {
        [only] => Choice::Parent(only.index),
        _ => Choice::Ambiguous(candidates.len()),
    }
}

/// Assign parents for one label pair within one image.
///
/// Overlaps and duplicates must already be resolved for the image, and the
/// pair must not have been assigned before.
pub fn assign_image_parents(image: &mut ImageObjects, pair: &LabelPair) -> Result<PairOutcome> {
    let image_id = image.image_id().to_string();
    if !image.state.overlaps_indexed {
        return Err(HierError::OverlapsNotIndexed { image_id });
    }
    if !image.state.duplicates_resolved {
        return Err(HierError::DuplicatesNotResolved { image_id });
    }
    let pair_key = (pair.child.clone(), pair.parent.clone());
    if image.state.resolved_pairs.contains(&pair_key) {
        return Err(HierError::PairAlreadyResolved {
            image_id,
            child: pair.child.clone(),
            parent: pair.parent.clone(),
        });
    }
    image.state.resolved_pairs.push(pair_key);

    let mut outcome = PairOutcome::default();
    if image.objects(&pair.child).is_empty() || image.objects(&pair.parent).is_empty() {
        return Ok(outcome);
    }

    let choices: Vec<(usize, Choice)> = image
        .objects(&pair.child)
        .iter()
        .map(|child| (child.index(), choose_parent(image, child, &pair.parent)))
        .collect();

    if let Some(parents) = image.objects_mut(&pair.parent) {
        for parent in parents.iter_mut() {
            parent.relations.children.get_or_insert_with(BTreeMap::new);
        }
    }

    for (child_index, choice) in choices {
        if let Some(child) = image.get_mut(&pair.child, child_index) {
            child.relations.parent.get_or_insert_with(BTreeMap::new);
        }

        match choice {
            Choice::Duplicate => outcome.duplicates += 1,
            Choice::NoCandidates => outcome.no_candidates += 1,
            Choice::Ambiguous(count) => {
                outcome.ambiguous += 1;
                trace!(
                    image = image_id.as_str(),
                    child = pair.child.as_str(),
                    index = child_index,
                    candidates = count,
                    "parent is ambiguous"
                );
            }
            Choice::Parent(parent_index) => {
                outcome.assigned += 1;
                if let Some(child) = image.get_mut(&pair.child, child_index) {
                    child
                        .relations
                        .parent
                        .get_or_insert_with(BTreeMap::new)
                        .insert(pair.parent.clone(), parent_index);
                }
                if let Some(parent) = image.get_mut(&pair.parent, parent_index) {
                    parent
                        .relations
                        .children
                        .get_or_insert_with(BTreeMap::new)
                        .entry(pair.child.clone())
                        .or_default()
                        .push(child_index);
                }
            }
        }
    }

    debug!(
        image = image_id.as_str(),
        pair = %pair,
        assigned = outcome.assigned,
        ambiguous = outcome.ambiguous,
        "assigned parents"
    );
    Ok(outcome)
}

/// Assign parents for one label pair in every image of the store
pub fn find_parent(store: &mut ObjectStore, pair: &LabelPair) -> Result<PairOutcome> {
    let mut total = PairOutcome::default();
    for image in store.images_mut() {
        total.merge(&assign_image_parents(image, pair)?);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectRecord;
    use crate::overlap::index_overlaps;
    use crate::resolve::{find_duplicates, ResolveConfig};

    fn prepared(records: &[(&str, f64, f64, f64, f64)]) -> Result<ObjectStore> {
        let mut store = ObjectStore::new();
        for &(label, x0, y0, x1, y1) in records {
            store.insert(ObjectRecord::new("1", label, x0, y0, x1, y1))?;
        }
        index_overlaps(&mut store)?;
        find_duplicates(&mut store, &ResolveConfig::default())?;
        Ok(store)
    }

    fn object<'a>(store: &'a ObjectStore, label: &str, index: usize) -> &'a HierObject {
        store.image("1").and_then(|i| i.get(label, index)).unwrap()
    }

    #[test]
    fn test_single_container_becomes_parent() -> Result<()> {
        let mut store = prepared(&[("face", 0.0, 0.0, 1.0, 1.0), ("eye", 0.2, 0.2, 0.4, 0.4)])?;
        let outcome = find_parent(&mut store, &LabelPair::new("eye", "face"))?;

        assert_eq!(outcome.assigned, 1);
        assert_eq!(object(&store, "eye", 0).parent("face"), Some(0));
        assert_eq!(object(&store, "face", 0).children("eye"), &[0]);
        Ok(())
    }

    #[test]
    fn test_center_outside_gets_no_parent() -> Result<()> {
        let mut store = prepared(&[
            ("Object", 0.2, 0.3, 0.4, 0.5),
            ("Object", 0.1, 0.4, 0.3, 0.8),
            ("Group", 0.1, 0.1, 0.5, 0.5),
        ])?;
        let outcome = find_parent(&mut store, &LabelPair::new("Object", "Group"))?;

        assert_eq!(outcome.assigned, 1);
        assert_eq!(outcome.no_candidates, 1);
        assert_eq!(object(&store, "Object", 0).parent("Group"), Some(0));
        assert_eq!(object(&store, "Object", 1).parent("Group"), None);
        assert_eq!(object(&store, "Object", 1).relations().parent, Some(BTreeMap::new()));
        assert_eq!(object(&store, "Group", 0).children("Object"), &[0]);
        assert_eq!(object(&store, "Group", 0).relations().parent, None);
        assert_eq!(object(&store, "Object", 0).relations().children, None);
        Ok(())
    }

    #[test]
    fn test_equal_containers_are_ambiguous() -> Result<()> {
        // heads overlap too little to be duplicates but both hold the eye
        let mut store = prepared(&[
            ("head", 0.0, 0.0, 0.6, 1.0),
            ("head", 0.4, 0.0, 1.0, 1.0),
            ("eye", 0.45, 0.4, 0.55, 0.5),
        ])?;
        let outcome = find_parent(&mut store, &LabelPair::new("eye", "head"))?;

        assert_eq!(outcome.ambiguous, 1);
        assert_eq!(object(&store, "eye", 0).parent("head"), None);
        assert!(object(&store, "head", 0).children("eye").is_empty());
        assert!(object(&store, "head", 1).children("eye").is_empty());
        Ok(())
    }

    #[test]
    fn test_full_containment_beats_center_only() -> Result<()> {
        let mut store = prepared(&[
            ("head", 0.0, 0.0, 0.5, 0.5),
            ("head", 0.3, 0.3, 0.9, 0.9),
            ("eye", 0.32, 0.32, 0.48, 0.48),
            ("eye", 0.25, 0.35, 0.45, 0.45),
        ])?;
        find_parent(&mut store, &LabelPair::new("eye", "head"))?;

        // eye 0 lies whole in both heads with IoM 1.0 each
        assert_eq!(object(&store, "eye", 0).parent("head"), None);
        // eye 1 is whole in head 0 and only centered in head 1
        assert_eq!(object(&store, "eye", 1).parent("head"), Some(0));
        assert_eq!(object(&store, "head", 0).children("eye"), &[1]);
        Ok(())
    }

    #[test]
    fn test_duplicate_parent_is_not_a_candidate() -> Result<()> {
        let mut store = prepared(&[
            ("face", 0.0, 0.0, 1.0, 1.0),
            ("face", 0.02, 0.0, 1.0, 1.0),
            ("eye", 0.01, 0.2, 0.3, 0.4),
        ])?;
        assert!(object(&store, "face", 0).is_duplicate());
        find_parent(&mut store, &LabelPair::new("eye", "face"))?;

        // only the kept face remains and it holds the eye's center
        assert_eq!(object(&store, "eye", 0).parent("face"), Some(1));
        assert!(object(&store, "face", 0).children("eye").is_empty());
        Ok(())
    }

    #[test]
    fn test_sole_duplicate_parent_leaves_child_unassigned() -> Result<()> {
        let mut store = prepared(&[
            ("face", 0.0, 0.0, 0.5, 0.5),
            ("face", 0.02, 0.02, 0.52, 0.52),
            ("eye", 0.005, 0.1, 0.015, 0.2),
        ])?;
        assert!(object(&store, "face", 0).is_duplicate());
        let outcome = find_parent(&mut store, &LabelPair::new("eye", "face"))?;

        assert_eq!(outcome.no_candidates, 1);
        assert_eq!(object(&store, "eye", 0).parent("face"), None);
        Ok(())
    }

    #[test]
    fn test_duplicate_child_is_skipped() -> Result<()> {
        let mut store = prepared(&[
            ("face", 0.0, 0.0, 1.0, 1.0),
            ("eye", 0.2, 0.2, 0.4, 0.4),
            ("eye", 0.21, 0.2, 0.41, 0.4),
        ])?;
        let outcome = find_parent(&mut store, &LabelPair::new("eye", "face"))?;

        assert_eq!(outcome.duplicates, 1);
        assert_eq!(object(&store, "eye", 0).parent("face"), None);
        assert_eq!(object(&store, "eye", 1).parent("face"), Some(0));
        assert_eq!(object(&store, "face", 0).children("eye"), &[1]);
        Ok(())
    }

    #[test]
    fn test_missing_label_skips_image() -> Result<()> {
        let mut store = prepared(&[("face", 0.0, 0.0, 1.0, 1.0)])?;
        let outcome = find_parent(&mut store, &LabelPair::new("eye", "face"))?;
        assert_eq!(outcome, PairOutcome::default());
        assert_eq!(object(&store, "face", 0).relations().children, None);
        Ok(())
    }

    #[test]
    fn test_preconditions_are_enforced() -> Result<()> {
        let pair = LabelPair::new("eye", "face");

        let mut store = ObjectStore::new();
        store.insert(ObjectRecord::new("1", "face", 0.0, 0.0, 1.0, 1.0))?;
        assert!(matches!(
            find_parent(&mut store, &pair),
            Err(HierError::OverlapsNotIndexed { .. })
        ));

        index_overlaps(&mut store)?;
        assert!(matches!(
            find_parent(&mut store, &pair),
            Err(HierError::DuplicatesNotResolved { .. })
        ));

        find_duplicates(&mut store, &ResolveConfig::default())?;
        find_parent(&mut store, &pair)?;
        assert!(matches!(
            find_parent(&mut store, &pair),
            Err(HierError::PairAlreadyResolved { .. })
        ));
        Ok(())
    }
}
