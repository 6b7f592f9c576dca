//! Pseudo random hierarchy generation

use super::allocate::{create_duplicate, create_object_inside, create_overlapping_object, split_bbox, Bounds};
use super::{Expected, Level, SynthConfig, SynthExample, SynthObject};
use hierbox_core::geometry::round5;
use hierbox_core::resolve::DUPLICATE_IOU_THRESHOLD;
use hierbox_core::{LabelPair, ObjectRecord, Rect};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use tracing::debug;

/// One object to create, drawn from its [`super::ObjectParams`]
struct Planned {
    label: Option<String>,
    duplicates: Option<usize>,
    min_size: f64,
    suggested_min_size: f64,
    ratio: f64,
}

/// Objects created so far
#[derive(Default)]
struct Build {
    objects: Vec<SynthObject>,
    bounds: Vec<Bounds>,
    /// Geometry as the engine will see it; `None` if the rounded box is
    /// degenerate
    rects: Vec<Option<Rect>>,
}

/// Seeded generator of [`SynthExample`]s
pub struct SynthGenerator {
    config: SynthConfig,
    rng: StdRng,
}

impl SynthGenerator {
    pub fn new(config: SynthConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Same seed and config give the same examples
    pub fn with_seed(config: SynthConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Generate one image worth of annotations
    pub fn generate(&mut self) -> SynthExample {
        if self.config.hierarchies.is_empty() {
            return SynthExample::default();
        }
        let choice = self.rng.gen_range(0..self.config.hierarchies.len());
        let levels = self.config.hierarchies[choice].clone();

        let mut build = Build::default();
        self.create_parents_and_children(&levels, self.config.total, &mut build, false);
        let pairs = child_parent_pairs(&levels);
        find_parents_children(&mut build, &pairs);
        find_additional_duplicates(&mut build);

        let mut objects = build.objects;
        objects.shuffle(&mut self.rng);
        debug!(hierarchy = choice, objects = objects.len(), "generated example");

        SynthExample {
            objects,
            pairs: pairs.into_iter().collect(),
        }
    }

    fn plan(&mut self, level: &Level) -> Vec<Planned> {
        let mut planned = Vec::new();
        for params in level {
            let (low, high) = params.count;
            let count = self.rng.gen_range(low..=high.max(low));
            for _ in 0..count {
                let duplicates = params
                    .duplicates
                    .map(|(low, high)| self.rng.gen_range(low..=high.max(low)));
                planned.push(Planned {
                    label: params.label.clone(),
                    duplicates,
                    min_size: params.min_size,
                    suggested_min_size: params.suggested_min_size,
                    ratio: params.ratio,
                });
            }
        }
        planned
    }

    /// One region per planned object; fewer if the space runs out
    fn split(&mut self, planned: &[Planned], total: Bounds) -> Vec<Bounds> {
        if planned.len() <= 1 {
            return vec![total];
        }
        let min_size = planned.iter().map(|p| p.min_size).fold(f64::MIN, f64::max);
        let suggested = planned.iter().map(|p| p.suggested_min_size).fold(f64::MIN, f64::max);
        split_bbox(&mut self.rng, total, planned.len(), Some(min_size), Some(suggested))
    }

    fn create_parents_and_children(
        &mut self,
        levels: &[Level],
        parent: Bounds,
        build: &mut Build,
        overlap: bool,
    ) {
        let Some((level, lower)) = levels.split_first() else {
            return;
        };

        let planned = self.plan(level);
        let regions = self.split(&planned, parent);

        for (op, region) in planned.iter().zip(regions) {
            let inner = match &op.label {
                None => region,
                Some(label) => self.create_object_and_duplicates(build, overlap, op, label, region, parent),
            };
            if !lower.is_empty() {
                self.create_parents_and_children(lower, inner, build, op.label.is_none());
            }
        }
    }

    /// Create an object and its duplicate annotations, returning the region
    /// all of them share
    fn create_object_and_duplicates(
        &mut self,
        build: &mut Build,
        overlap: bool,
        op: &Planned,
        label: &str,
        region: Bounds,
        parent: Bounds,
    ) -> Bounds {
        let (placed, max_bounds) = if overlap {
            (create_overlapping_object(&mut self.rng, region, parent), parent)
        } else {
            (create_object_inside(&mut self.rng, region, op.ratio), region)
        };

        let first = build.push(&self.config.image_id, label, placed);
        let original = build.bounds[first];
        let mut shared = original;
        let mut same_object = vec![first];

        for _ in 0..op.duplicates.unwrap_or(0) {
            let placed = create_duplicate(&mut self.rng, original, Some(max_bounds), self.config.min_duplicate_iou);
            let idx = build.push(&self.config.image_id, label, placed);
            shared = shared.intersection(&build.bounds[idx]);
            same_object.push(idx);
        }

        if op.duplicates.is_some() {
            for &i in &same_object {
                build.objects[i].expected.duplicates = same_object.iter().copied().filter(|&j| j != i).collect();
            }
        }
        shared
    }
}

impl Build {
    /// Record an object with coordinates rounded the way annotation files
    /// store them; returns its creation index
    fn push(&mut self, image_id: &str, label: &str, placed: Bounds) -> usize {
        let rounded = Bounds::new(round5(placed.x0), round5(placed.y0), round5(placed.x1), round5(placed.y1));
        let (xc, yc) = placed.center();
        let idx = self.objects.len();

        self.objects.push(SynthObject {
            record: ObjectRecord::new(image_id, label, rounded.x0, rounded.y0, rounded.x1, rounded.y1),
            expected: Expected {
                idx,
                label: label.to_string(),
                xc: round5(xc),
                yc: round5(yc),
                ..Default::default()
            },
        });
        self.bounds.push(rounded);
        self.rects.push(Rect::new(rounded.x0, rounded.y0, rounded.x1, rounded.y1).ok());
        idx
    }

    fn with_label(&self, label: &str) -> Vec<usize> {
        (0..self.objects.len())
            .filter(|&i| self.objects[i].record.label == label && self.rects[i].is_some())
            .collect()
    }
}

/// Every (child, parent) label pair where the parent sits on a higher level
fn child_parent_pairs(levels: &[Level]) -> BTreeSet<LabelPair> {
    let labels = |level: &Level| -> Vec<String> { level.iter().filter_map(|p| p.label.clone()).collect() };

    let mut pairs = BTreeSet::new();
    for (i, upper) in levels.iter().enumerate() {
        for lower in &levels[i + 1..] {
            for parent in labels(upper) {
                for child in labels(lower) {
                    pairs.insert(LabelPair::new(child, parent.clone()));
                }
            }
        }
    }
    pairs
}

/// Note candidate parents: every object of the parent label holding the
/// child's center, and among those the ones holding the whole child
fn find_parents_children(build: &mut Build, pairs: &BTreeSet<LabelPair>) {
    for pair in pairs {
        let children = build.with_label(&pair.child);
        let parents = build.with_label(&pair.parent);

        for &ci in &children {
            let Some(child) = build.rects[ci] else {
                continue;
            };
            let mut holding = Vec::new();
            let mut enclosing = Vec::new();
            for &pi in &parents {
                let Some(parent) = build.rects[pi] else {
                    continue;
                };
                if child.center_is_inside(&parent) {
                    holding.push(pi);
                    if child.is_inside(&parent) {
                        enclosing.push(pi);
                    }
                }
            }
            if holding.is_empty() {
                continue;
            }

            for &pi in &holding {
                build.objects[pi]
                    .expected
                    .children
                    .entry(pair.child.clone())
                    .or_default()
                    .push(ci);
            }
            let expected = &mut build.objects[ci].expected;
            expected.parents.insert(pair.parent.clone(), holding);
            if !enclosing.is_empty() {
                expected.enclosing.insert(pair.parent.clone(), enclosing);
            }
        }
    }
}

/// Same-label objects anywhere in the image that ended up overlapping by
/// chance also count as duplicates of each other
fn find_additional_duplicates(build: &mut Build) {
    for a in 0..build.objects.len() {
        for b in a + 1..build.objects.len() {
            let (Some(ra), Some(rb)) = (build.rects[a], build.rects[b]) else {
                continue;
            };
            if build.objects[a].record.label != build.objects[b].record.label
                || build.objects[a].expected.duplicates.contains(&b)
            {
                continue;
            }
            if ra.iou(&rb) > DUPLICATE_IOU_THRESHOLD {
                build.objects[a].expected.duplicates.push(b);
                build.objects[b].expected.duplicates.push(a);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::ObjectParams;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;

    #[test]
    fn test_same_seed_same_example() {
        let a = SynthGenerator::with_seed(SynthConfig::default(), 42).generate();
        let b = SynthGenerator::with_seed(SynthConfig::default(), 42).generate();
        assert_eq!(a, b);
    }

    #[test]
    fn test_small_config_shape() {
        let mut generator = SynthGenerator::with_seed(SynthConfig::small(), 1);
        for _ in 0..10 {
            let example = generator.generate();
            let heads = example.objects.iter().filter(|o| o.record.label == "head").count();
            let eyes = example.objects.iter().filter(|o| o.record.label == "eye").count();

            assert!(heads <= 6);
            assert!(eyes <= 2 * heads);
            assert_eq!(example.pairs, vec![LabelPair::new("eye", "head")]);
            for object in &example.objects {
                let r = &object.record;
                assert!(r.x0 < r.x1 && r.y0 < r.y1);
                assert!(r.x0 >= 0.0 && r.y0 >= 0.0 && r.x1 <= 1.0 && r.y1 <= 1.0);
            }
        }
    }

    #[test]
    fn test_expectations_are_symmetric() {
        let mut generator = SynthGenerator::with_seed(SynthConfig::default(), 3);
        for _ in 0..20 {
            let example = generator.generate();
            let by_idx: BTreeMap<usize, &Expected> =
                example.objects.iter().map(|o| (o.expected.idx, &o.expected)).collect();

            for expected in by_idx.values() {
                for (label, parents) in &expected.parents {
                    for p in parents {
                        let parent = by_idx[p];
                        assert_eq!(&parent.label, label);
                        assert!(parent.children[&expected.label].contains(&expected.idx));
                    }
                }
                for (label, enclosing) in &expected.enclosing {
                    assert!(enclosing.iter().all(|e| expected.parents[label].contains(e)));
                }
                for d in &expected.duplicates {
                    assert!(by_idx[d].duplicates.contains(&expected.idx));
                    assert_eq!(by_idx[d].label, expected.label);
                }
            }
        }
    }

    #[test]
    fn test_centers_match_records() {
        let mut generator = SynthGenerator::with_seed(SynthConfig::default(), 8);
        for object in generator.generate().objects {
            let r = &object.record;
            assert_abs_diff_eq!(object.expected.xc, (r.x0 + r.x1) / 2.0, epsilon = 1e-4);
            assert_abs_diff_eq!(object.expected.yc, (r.y0 + r.y1) / 2.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_generated_duplicates_are_listed() {
        let config = SynthConfig {
            hierarchies: vec![vec![vec![ObjectParams::labelled("head", (1, 1), (1, 1))]]],
            ..Default::default()
        };
        let mut generator = SynthGenerator::with_seed(config, 21);
        for _ in 0..20 {
            let example = generator.generate();
            assert_eq!(example.len(), 2);
            for object in &example.objects {
                assert_eq!(object.expected.duplicates, vec![1 - object.expected.idx]);
            }
        }
    }

    #[test]
    fn test_pairs_follow_levels() {
        let config = SynthConfig::default();
        let pairs = child_parent_pairs(&config.hierarchies[2]);
        let expected: BTreeSet<LabelPair> = [
            ("eye", "face"),
            ("eye", "head"),
            ("face", "head"),
            ("nose", "face"),
            ("nose", "head"),
        ]
        .into_iter()
        .map(LabelPair::from)
        .collect();
        assert_eq!(pairs, expected);
    }
}
