//! Space allocation for synthetic objects
//!
//! [`split_bbox`] divides a region among objects of one hierarchy level.
//! [`create_object_inside`] and [`create_overlapping_object`] place an object
//! of a lower level in the space of a higher one. [`create_duplicate`] places
//! a second annotation on top of an existing object.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Plain box used while generating, before any rounding or validation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Bounds {
    pub const UNIT: Bounds = Bounds {
        x0: 0.0,
        y0: 0.0,
        x1: 1.0,
        y1: 1.0,
    };

    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        if self.x1 <= self.x0 || self.y1 <= self.y0 {
            return 0.0;
        }
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Overlapping region, collapsed to zero size when there is none
    pub fn intersection(&self, other: &Bounds) -> Bounds {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        Bounds {
            x0,
            y0,
            x1: self.x1.min(other.x1).max(x0),
            y1: self.y1.min(other.y1).max(y0),
        }
    }

    /// Inside `other`, edges included
    pub fn is_inside(&self, other: &Bounds) -> bool {
        other.x0 <= self.x0 && self.x1 <= other.x1 && other.y0 <= self.y0 && self.y1 <= other.y1
    }

    /// Center inside `other`, edges included
    pub fn center_is_inside(&self, other: &Bounds) -> bool {
        let (xc, yc) = self.center();
        other.x0 <= xc && xc <= other.x1 && other.y0 <= yc && yc <= other.y1
    }

    pub fn iou(&self, other: &Bounds) -> f64 {
        let intersection = self.intersection(other).area();
        intersection / (self.area() + other.area() - intersection)
    }
}

/// Random fraction in `[-1, 1]` with a denominator of at most 32
pub fn draw_plus_minus_one<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let denominator = rng.gen_range(1..=32);
    rng.gen_range(-denominator..=denominator) as f64 / denominator as f64
}

/// Random fraction in `[0, 1]` with a denominator of at most 32
pub fn draw_zero_one<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let denominator = rng.gen_range(1..=32);
    rng.gen_range(0..=denominator) as f64 / denominator as f64
}

/// Split `start` into at most `max_splits` non-overlapping boxes whose union
/// is `start`, largest first.
///
/// Uses recursive guillotine cuts, always cutting the largest remaining box.
/// No box gets narrower than `min_size`; cuts that would leave pieces below
/// `suggested_min_size` are avoided while possible.
pub fn split_bbox<R: Rng + ?Sized>(
    rng: &mut R,
    start: Bounds,
    max_splits: usize,
    min_size: Option<f64>,
    suggested_min_size: Option<f64>,
) -> Vec<Bounds> {
    let very_small = min_size.map_or(1e-7, |m| m / 100.0);
    let min_size2 = min_size.map(|m| 2.0 * m);
    let margin = min_size.unwrap_or(very_small);
    let mut suggested_min_size2 = match (suggested_min_size, min_size2) {
        (Some(s), Some(m2)) => Some((2.0 * s).max(m2)),
        (Some(s), None) => Some(2.0 * s),
        (None, m2) => m2,
    };

    let mut boxes = vec![start];
    while boxes.len() < max_splits {
        let largest = boxes
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.area().total_cmp(&b.area()))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let parent = boxes[largest];
        let (w, h) = (parent.width(), parent.height());

        if min_size2.is_some_and(|m2| w.max(h) < m2) {
            // even the largest box cannot be cut
            break;
        }

        let min_hw = w.min(h);
        if let Some(s2) = suggested_min_size2 {
            if min_hw < s2 {
                let lowered = 0.75 * min_hw;
                suggested_min_size2 = Some(min_size2.map_or(lowered, |m2| lowered.max(m2)));
            }
        }
        let hor_cut = match suggested_min_size2 {
            Some(s2) if min_hw < s2 => h > w,
            _ => rng.gen_bool(0.5),
        };

        let (first, second) = if hor_cut {
            let cut = pick_cut(rng, parent.y0, parent.y1, margin, very_small);
            (
                Bounds::new(parent.x0, parent.y0, parent.x1, cut),
                Bounds::new(parent.x0, cut, parent.x1, parent.y1),
            )
        } else {
            let cut = pick_cut(rng, parent.x0, parent.x1, margin, very_small);
            (
                Bounds::new(parent.x0, parent.y0, cut, parent.y1),
                Bounds::new(cut, parent.y0, parent.x1, parent.y1),
            )
        };
        boxes[largest] = first;
        boxes.push(second);
    }

    boxes.sort_by(|a, b| b.area().total_cmp(&a.area()));
    boxes
}

fn pick_cut<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64, margin: f64, very_small: f64) -> f64 {
    let center = (low + high) / 2.0;
    let middle = (high - low) / 2.0 - margin;
    if middle < very_small {
        center
    } else {
        center + middle * draw_plus_minus_one(rng)
    }
}

/// Place an object inside `parent`.
///
/// Its width and height are at most `ratio` times those of `parent` and at
/// least a fifth of that. The object is centered in `parent`.
pub fn create_object_inside<R: Rng + ?Sized>(rng: &mut R, parent: Bounds, ratio: f64) -> Bounds {
    debug_assert!(ratio > 0.0 && ratio <= 1.0);
    const MIN_RATIO: f64 = 5.0;

    let (p_w, p_h) = (parent.width(), parent.height());

    let max_w = ratio * p_w;
    let min_w = max_w / MIN_RATIO;
    let x_offset = (p_w - (min_w + (max_w - min_w) * draw_zero_one(rng))) / 2.0;

    let max_h = ratio * p_h;
    let min_h = max_h / MIN_RATIO;
    let y_offset = (p_h - (min_h + (max_h - min_h) * draw_zero_one(rng))) / 2.0;

    Bounds::new(
        parent.x0 + x_offset,
        parent.y0 + y_offset,
        parent.x1 - x_offset,
        parent.y1 - y_offset,
    )
}

/// Place an object inside `group` whose center lies in `parent` and which
/// spills over `parent` into the rest of `group`. `parent` must lie inside
/// `group`.
pub fn create_overlapping_object<R: Rng + ?Sized>(rng: &mut R, parent: Bounds, group: Bounds) -> Bounds {
    debug_assert!(parent.is_inside(&group));
    // how much bigger than the parent, how much smaller than the group
    const OVERLAP: f64 = 1.4;
    const MARGIN: f64 = 0.9;

    let w = (OVERLAP * parent.width()).min(MARGIN * group.width());
    let x_margin = w / 20.0;
    let w2 = w / 2.0 - x_margin;
    let w8 = w2 / 4.0;
    let h = (OVERLAP * parent.height()).min(MARGIN * group.height());
    let y_margin = h / 20.0;
    let h2 = h / 2.0 - y_margin;
    let h8 = h2 / 4.0;

    let min_xc = (group.x0 + w2).max(parent.x0 + w8) + x_margin;
    let min_yc = (group.y0 + h2).max(parent.y0 + h8) + y_margin;
    let max_xc = (group.x1 - w2).min(parent.x1 - w8) - x_margin;
    let max_yc = (group.y1 - h2).min(parent.y1 - h8) - y_margin;

    let xc = if min_xc < max_xc {
        min_xc + draw_zero_one(rng) * (max_xc - min_xc)
    } else {
        (min_xc + max_xc) / 2.0
    };
    let yc = if min_yc < max_yc {
        min_yc + draw_zero_one(rng) * (max_yc - min_yc)
    } else {
        (min_yc + max_yc) / 2.0
    };

    Bounds::new(xc - w2, yc - h2, xc + w2, yc + h2)
}

/// Place a second annotation of `original` with IoU at least `min_iou`.
///
/// With `max_bounds`, the edges of the duplicate move outward no further
/// than the room left inside `max_bounds`.
pub fn create_duplicate<R: Rng + ?Sized>(
    rng: &mut R,
    original: Bounds,
    max_bounds: Option<Bounds>,
    min_iou: f64,
) -> Bounds {
    debug_assert!(min_iou > 0.4 && min_iou < 0.9999);
    const MAX_SHRINKS: usize = 200;

    let (xc, yc) = original.center();
    let mut dx0 = original.width() * 0.1;
    let mut dy0 = original.height() * 0.1;
    let mut dx1 = dx0;
    let mut dy1 = dy0;

    let f = 1.0 - min_iou / 2.0;
    if let Some(m) = max_bounds {
        dx0 = dx0.min((m.x0 - original.x0).abs() * f).min((xc - original.x0).abs() * f);
        dy0 = dy0.min((m.y0 - original.y0).abs() * f).min((yc - original.y0).abs() * f);
        dx1 = dx1.min((m.x1 - original.x1).abs() * f).min((xc - original.x1).abs() * f);
        dy1 = dy1.min((m.y1 - original.y1).abs() * f).min((yc - original.y1).abs() * f);
    }

    let mut deltas = [
        dx0 * draw_plus_minus_one(rng),
        dy0 * draw_plus_minus_one(rng),
        dx1 * draw_plus_minus_one(rng),
        dy1 * draw_plus_minus_one(rng),
    ];

    for _ in 0..MAX_SHRINKS {
        let candidate = Bounds::new(
            original.x0 + deltas[0],
            original.y0 + deltas[1],
            original.x1 + deltas[2],
            original.y1 + deltas[3],
        );
        if candidate.area() > 0.0 && candidate.iou(&original) >= min_iou {
            return candidate;
        }

        // shrink the largest move and try again
        let max_diff = deltas.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        for delta in deltas.iter_mut() {
            if delta.abs() == max_diff {
                *delta *= 0.7;
            }
        }
    }
    original
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_draws_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let pm = draw_plus_minus_one(&mut rng);
            assert!((-1.0..=1.0).contains(&pm));
            let z = draw_zero_one(&mut rng);
            assert!((0.0..=1.0).contains(&z));
        }
    }

    #[test]
    fn test_split_covers_start_without_overlap() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let boxes = split_bbox(&mut rng, Bounds::UNIT, 12, Some(0.02), Some(0.1));
            assert!(!boxes.is_empty() && boxes.len() <= 12);

            let total: f64 = boxes.iter().map(Bounds::area).sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-9);
            for (i, a) in boxes.iter().enumerate() {
                assert!(a.is_inside(&Bounds::UNIT));
                assert!(a.width() >= 0.02 - 1e-9 && a.height() >= 0.02 - 1e-9);
                for b in &boxes[i + 1..] {
                    assert_abs_diff_eq!(a.intersection(b).area(), 0.0, epsilon = 1e-12);
                }
            }
            assert!(boxes.windows(2).all(|w| w[0].area() >= w[1].area()));
        }
    }

    #[test]
    fn test_split_stops_at_min_size() {
        let mut rng = StdRng::seed_from_u64(3);
        let boxes = split_bbox(&mut rng, Bounds::new(0.0, 0.0, 0.1, 0.1), 100, Some(0.04), None);
        assert!(boxes.len() <= 4);
    }

    #[test]
    fn test_object_inside_parent() {
        let mut rng = StdRng::seed_from_u64(5);
        let parent = Bounds::new(0.2, 0.1, 0.8, 0.5);
        for _ in 0..100 {
            let child = create_object_inside(&mut rng, parent, 0.5);
            assert!(child.is_inside(&parent));
            assert!(child.width() <= 0.5 * parent.width() + 1e-12);
            assert!(child.width() >= 0.1 * parent.width() - 1e-12);
            let (pc, cc) = (parent.center(), child.center());
            assert_relative_eq!(pc.0, cc.0, epsilon = 1e-9);
            assert_relative_eq!(pc.1, cc.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_overlapping_object_is_centered_in_parent() {
        let mut rng = StdRng::seed_from_u64(9);
        let group = Bounds::new(0.0, 0.0, 1.0, 1.0);
        let parent = Bounds::new(0.3, 0.3, 0.6, 0.6);
        for _ in 0..100 {
            let obj = create_overlapping_object(&mut rng, parent, group);
            assert!(obj.is_inside(&group));
            assert!(obj.center_is_inside(&parent));
            assert!(!obj.is_inside(&parent));
        }
    }

    #[test]
    fn test_duplicate_meets_min_iou() {
        let mut rng = StdRng::seed_from_u64(13);
        let original = Bounds::new(0.2, 0.2, 0.5, 0.6);
        for _ in 0..100 {
            let dup = create_duplicate(&mut rng, original, Some(Bounds::UNIT), 0.8);
            assert!(dup.iou(&original) >= 0.8);
        }
    }
}
