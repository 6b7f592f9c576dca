//! Hierarchy orchestration
//!
//! Runs overlap indexing, duplicate resolution and then parent assignment for
//! each declared label pair, image by image. Images never reference each
//! other, so with the `parallel` feature they can be spread across threads;
//! the work inside one image always runs in order.

use crate::error::Result;
use crate::overlap::index_image;
use crate::resolve::{assign_image_parents, resolve_image_duplicates, LabelPair, PairOutcome, ResolveConfig};
use crate::store::{ImageObjects, ObjectStore};
use serde::Serialize;
use tracing::info;

/// Counts gathered while resolving one image
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageReport {
    pub objects: usize,
    pub overlap_facts: usize,
    pub duplicates: usize,
    /// One outcome per label pair, in the order the pairs were given
    pub pairs: Vec<PairOutcome>,
}

/// Summary of a whole run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchyReport {
    pub images: usize,
    pub objects: usize,
    pub overlap_facts: usize,
    pub duplicates: usize,
    pub pairs: Vec<(LabelPair, PairOutcome)>,
}

impl HierarchyReport {
    fn collect(pairs: &[LabelPair], images: Vec<ImageReport>) -> Self {
        let mut report = Self {
            images: images.len(),
            pairs: pairs
                .iter()
                .map(|pair| (pair.clone(), PairOutcome::default()))
                .collect(),
            ..Default::default()
        };

        for image in images {
            report.objects += image.objects;
            report.overlap_facts += image.overlap_facts;
            report.duplicates += image.duplicates;
            for ((_, total), outcome) in report.pairs.iter_mut().zip(&image.pairs) {
                total.merge(outcome);
            }
        }
        report
    }

    /// Children that got a parent, over all label pairs
    pub fn assigned(&self) -> usize {
        self.pairs.iter().map(|(_, outcome)| outcome.assigned).sum()
    }

    /// Children left unassigned because of ties, over all label pairs
    pub fn ambiguous(&self) -> usize {
        self.pairs.iter().map(|(_, outcome)| outcome.ambiguous).sum()
    }
}

/// Run every pass on a single image
pub fn resolve_image(
    image: &mut ImageObjects,
    pairs: &[LabelPair],
    config: &ResolveConfig,
) -> Result<ImageReport> {
    let overlap_facts = index_image(image)?;
    let duplicates = resolve_image_duplicates(image, config)?;
    let pairs = pairs
        .iter()
        .map(|pair| assign_image_parents(image, pair))
        .collect::<Result<Vec<_>>>()?;

    Ok(ImageReport {
        objects: image.len(),
        overlap_facts,
        duplicates,
        pairs,
    })
}

fn resolve_sequential(
    store: &mut ObjectStore,
    pairs: &[LabelPair],
    config: &ResolveConfig,
) -> Result<Vec<ImageReport>> {
    store
        .images_mut()
        .map(|image| resolve_image(image, pairs, config))
        .collect()
}

#[cfg(feature = "parallel")]
fn resolve_images(
    store: &mut ObjectStore,
    pairs: &[LabelPair],
    config: &ResolveConfig,
) -> Result<Vec<ImageReport>> {
    use rayon::prelude::*;

    if !config.parallel_images {
        return resolve_sequential(store, pairs, config);
    }
    store
        .images_map_mut()
        .par_values_mut()
        .map(|image| resolve_image(image, pairs, config))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn resolve_images(
    store: &mut ObjectStore,
    pairs: &[LabelPair],
    config: &ResolveConfig,
) -> Result<Vec<ImageReport>> {
    if config.parallel_images {
        tracing::warn!("built without the `parallel` feature, resolving images sequentially");
    }
    resolve_sequential(store, pairs, config)
}

/// Resolve duplicates and parents for every image of the store.
///
/// Overlaps are indexed once, duplicates resolved once, then each label pair
/// is assigned in the order given. Pairs only interact through the shared
/// duplicate flags.
pub fn resolve_hierarchy(
    store: &mut ObjectStore,
    pairs: &[LabelPair],
    config: &ResolveConfig,
) -> Result<HierarchyReport> {
    let images = resolve_images(store, pairs, config)?;
    let report = HierarchyReport::collect(pairs, images);

    info!(
        images = report.images,
        objects = report.objects,
        duplicates = report.duplicates,
        assigned = report.assigned(),
        ambiguous = report.ambiguous(),
        "resolved hierarchy"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ObjectRecord;
    use crate::error::HierError;

    fn three_objects() -> Result<ObjectStore> {
        let mut store = ObjectStore::new();
        store.insert(ObjectRecord::new("i1", "Object", 0.2, 0.3, 0.4, 0.5))?;
        store.insert(ObjectRecord::new("i1", "Object", 0.1, 0.4, 0.3, 0.8))?;
        store.insert(ObjectRecord::new("i1", "Group", 0.1, 0.1, 0.5, 0.5))?;
        Ok(store)
    }

    #[test]
    fn test_object_group_example() -> Result<()> {
        let mut store = three_objects()?;
        let pairs = [LabelPair::new("Object", "Group")];
        let report = resolve_hierarchy(&mut store, &pairs, &ResolveConfig::default())?;

        let image = store.image("i1").unwrap();
        assert_eq!(image.objects("Group")[0].children("Object"), &[0]);
        assert_eq!(image.objects("Object")[0].parent("Group"), Some(0));
        assert_eq!(image.objects("Object")[1].parent("Group"), None);

        assert_eq!(report.images, 1);
        assert_eq!(report.objects, 3);
        assert_eq!(report.overlap_facts, 6);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.assigned(), 1);
        assert_eq!(report.pairs[0].1.no_candidates, 1);
        Ok(())
    }

    #[test]
    fn test_images_are_independent() -> Result<()> {
        let mut store = ObjectStore::new();
        store.insert(ObjectRecord::new("a", "face", 0.0, 0.0, 1.0, 1.0))?;
        store.insert(ObjectRecord::new("b", "eye", 0.2, 0.2, 0.3, 0.3))?;
        let report = resolve_hierarchy(
            &mut store,
            &[LabelPair::new("eye", "face")],
            &ResolveConfig::default(),
        )?;

        assert_eq!(report.overlap_facts, 0);
        assert_eq!(report.assigned(), 0);
        let eye = &store.image("b").unwrap().objects("eye")[0];
        assert_eq!(eye.parent("face"), None);
        Ok(())
    }

    #[test]
    fn test_rerun_needs_reset() -> Result<()> {
        let mut store = three_objects()?;
        let pairs = [LabelPair::new("Object", "Group")];
        let config = ResolveConfig::default();
        let first = resolve_hierarchy(&mut store, &pairs, &config)?;

        assert!(matches!(
            resolve_hierarchy(&mut store, &pairs, &config),
            Err(HierError::OverlapsAlreadyIndexed { .. })
        ));

        store.reset_relations();
        let second = resolve_hierarchy(&mut store, &pairs, &config)?;
        assert_eq!(first, second);
        let group = &store.image("i1").unwrap().objects("Group")[0];
        assert_eq!(group.children("Object"), &[0]);
        Ok(())
    }

    #[test]
    fn test_parallel_matches_sequential() -> Result<()> {
        let build = || -> Result<ObjectStore> {
            let mut store = ObjectStore::new();
            for i in 0..8 {
                let image = format!("img{i}");
                let shift = i as f64 * 0.01;
                store.insert(ObjectRecord::new(&image, "face", 0.1, 0.1, 0.9, 0.9))?;
                store.insert(ObjectRecord::new(&image, "eye", 0.2 + shift, 0.2, 0.4 + shift, 0.4))?;
                store.insert(ObjectRecord::new(&image, "eye", 0.21 + shift, 0.2, 0.41 + shift, 0.4))?;
            }
            Ok(store)
        };
        let pairs = [LabelPair::new("eye", "face")];

        let mut sequential = build()?;
        let mut parallel = build()?;
        let a = resolve_hierarchy(&mut sequential, &pairs, &ResolveConfig::sequential())?;
        let b = resolve_hierarchy(&mut parallel, &pairs, &ResolveConfig::parallel())?;

        assert_eq!(a, b);
        assert_eq!(a.duplicates, 8);
        assert_eq!(a.assigned(), 8);
        let flat_a: Vec<_> = sequential.iter().map(|o| o.relations().clone()).collect();
        let flat_b: Vec<_> = parallel.iter().map(|o| o.relations().clone()).collect();
        assert_eq!(flat_a, flat_b);
        Ok(())
    }
}
