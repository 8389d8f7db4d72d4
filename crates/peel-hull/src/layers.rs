//! Onion peeling by repeated gift wrapping.
//!
//! Points are sorted by x, then y. Each still unassigned point, in that
//! order, anchors a gift-wrapping pass over the unassigned points after it;
//! the pass links the ring it finds and the next unassigned point anchors the
//! next, inner, ring. Rings run clockwise (every other remaining point lies
//! to the right of, or on, each ring link).
//!
//! Collinear points on a ring edge are all kept on the ring, nearest first.
//! A point left alone at the end becomes its own successor.

use core::cmp::Ordering;

use peel_types::Point;
use tracing::debug;

/// Nested hull rings over a set of keyed points.
#[derive(Debug, Clone, PartialEq)]
pub struct HullLayers<K> {
    /// Keys in sort order (x, then y).
    anchors: Vec<K>,
    /// `successors[i]` follows `anchors[i]` along its ring.
    successors: Vec<K>,
    /// Same as `successors`, as indices into `anchors`.
    next: Vec<usize>,
}

impl<K> Default for HullLayers<K> {
    fn default() -> Self {
        Self {
            anchors: Vec::new(),
            successors: Vec::new(),
            next: Vec::new(),
        }
    }
}

impl<K: Clone + PartialEq> HullLayers<K> {
    /// Peel `points` into rings.
    ///
    /// Points with identical coordinates keep their input order. Non-finite
    /// coordinates never stall the computation; each wrapping step either
    /// adds a point to the ring or closes it.
    pub fn compute(points: impl IntoIterator<Item = (K, Point)>) -> Self {
        let mut sorted: Vec<(K, Point)> = points.into_iter().collect();
        sorted.sort_by(|a, b| a.1.lexicographic_cmp(&b.1));

        let positions: Vec<Point> = sorted.iter().map(|(_, point)| *point).collect();
        let next = peel(&positions);
        let anchors: Vec<K> = sorted.into_iter().map(|(key, _)| key).collect();
        let successors = anchors
            .iter()
            .zip(&next)
            .map(|(own, &index)| anchors.get(index).unwrap_or(own).clone())
            .collect();

        let layers = Self {
            anchors,
            successors,
            next,
        };
        debug!(
            points = layers.len(),
            layers = layers.layer_count(),
            "hull layers computed"
        );
        layers
    }

    /// Keys in sort order.
    pub fn anchors(&self) -> &[K] {
        &self.anchors
    }

    /// Ring successor of each anchor, aligned with [`Self::anchors`].
    pub fn successors(&self) -> &[K] {
        &self.successors
    }

    /// Ring successor of `key`, if `key` is one of the points.
    pub fn successor_of(&self, key: &K) -> Option<&K> {
        let index = self.anchors.iter().position(|anchor| anchor == key)?;
        self.successors.get(index)
    }

    /// Every ring in traversal order, outermost first.
    pub fn rings(&self) -> Vec<Vec<K>> {
        let mut visited = vec![false; self.len()];
        let mut rings = Vec::new();
        for start in 0..self.len() {
            if visited.get(start) != Some(&false) {
                continue;
            }
            let mut ring = Vec::new();
            let mut at = start;
            for _ in 0..self.len() {
                match visited.get_mut(at) {
                    Some(seen) if !*seen => *seen = true,
                    _ => break,
                }
                if let Some(key) = self.anchors.get(at) {
                    ring.push(key.clone());
                }
                match self.next.get(at) {
                    Some(&following) => at = following,
                    None => break,
                }
            }
            rings.push(ring);
        }
        rings
    }

    /// Number of rings.
    pub fn layer_count(&self) -> usize {
        self.rings().len()
    }

    /// Ordered `(from, to)` ring links, self-loops excluded.
    ///
    /// A two-point ring yields both directions of the same pair.
    pub fn links(&self) -> Vec<(K, K)> {
        self.anchors
            .iter()
            .zip(&self.successors)
            .filter(|(from, to)| from != to)
            .map(|(from, to)| (from.clone(), to.clone()))
            .collect()
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether there are no points.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// Successor index of every sorted point.
fn peel(points: &[Point]) -> Vec<usize> {
    let mut successor: Vec<usize> = (0..points.len()).collect();
    for (anchor, &anchor_point) in points.iter().enumerate() {
        if successor.get(anchor) != Some(&anchor) {
            continue;
        }
        let ring = wrap(points, &successor, anchor, anchor_point);
        for (&from, &to) in ring.iter().zip(ring.iter().cycle().skip(1)) {
            if let Some(slot) = successor.get_mut(from) {
                *slot = to;
            }
        }
    }
    successor
}

/// Gift-wrap the unassigned points at or after `anchor`, returning the ring
/// in traversal order starting at `anchor`.
fn wrap(points: &[Point], successor: &[usize], anchor: usize, anchor_point: Point) -> Vec<usize> {
    let mut in_ring = vec![false; points.len()];
    if let Some(flag) = in_ring.get_mut(anchor) {
        *flag = true;
    }
    let mut ring = vec![anchor];
    let mut current = (anchor, anchor_point);

    for _ in 0..points.len() {
        let mut best: Option<(usize, Point)> = None;
        for (candidate, &point) in points.iter().enumerate().skip(anchor) {
            let unassigned = successor.get(candidate) == Some(&candidate);
            let on_ring = candidate != anchor && in_ring.get(candidate) == Some(&true);
            if candidate == current.0 || !unassigned || on_ring {
                continue;
            }
            best = Some(match best {
                None => (candidate, point),
                Some(held) => prefer(current.1, held, (candidate, point), anchor),
            });
        }
        match best {
            Some(step) if step.0 != anchor => {
                ring.push(step.0);
                if let Some(flag) = in_ring.get_mut(step.0) {
                    *flag = true;
                }
                current = step;
            }
            _ => break,
        }
    }
    ring
}

/// Choose the next ring point seen from `origin`.
fn prefer(
    origin: Point,
    held: (usize, Point),
    candidate: (usize, Point),
    anchor: usize,
) -> (usize, Point) {
    match origin.cross(held.1, candidate.1).partial_cmp(&0.0) {
        Some(Ordering::Greater) => candidate,
        Some(Ordering::Equal) => {
            // The ring only closes once nothing else lies on the closing line.
            if held.0 == anchor {
                candidate
            } else if candidate.0 == anchor {
                held
            } else if origin.distance_squared(candidate.1) < origin.distance_squared(held.1) {
                candidate
            } else {
                held
            }
        }
        _ => held,
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::float_cmp
)]
mod tests {
    use std::collections::BTreeSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn empty_set_has_no_layers() {
        let layers = HullLayers::<u32>::compute(Vec::new());
        assert!(layers.is_empty());
        assert_eq!(layers.layer_count(), 0);
        assert!(layers.links().is_empty());
    }

    #[test]
    fn single_point_is_its_own_successor() {
        let layers = HullLayers::compute([("a", p(3.0, 4.0))]);
        assert_eq!(layers.anchors(), ["a"]);
        assert_eq!(layers.successors(), ["a"]);
        assert_eq!(layers.layer_count(), 1);
        assert!(layers.links().is_empty());
    }

    #[test]
    fn two_points_form_one_ring() {
        let layers = HullLayers::compute([("b", p(5.0, 0.0)), ("a", p(0.0, 0.0))]);
        assert_eq!(layers.anchors(), ["a", "b"]);
        assert_eq!(layers.successor_of(&"a"), Some(&"b"));
        assert_eq!(layers.successor_of(&"b"), Some(&"a"));
        assert_eq!(layers.rings(), vec![vec!["a", "b"]]);
        assert_eq!(layers.links(), vec![("a", "b"), ("b", "a")]);
    }

    #[test]
    fn square_with_centroid_peels_into_two_layers() {
        let layers = HullLayers::compute([
            ("sw", p(0.0, 0.0)),
            ("se", p(1.0, 0.0)),
            ("ne", p(1.0, 1.0)),
            ("nw", p(0.0, 1.0)),
            ("mid", p(0.5, 0.5)),
        ]);

        assert_eq!(layers.anchors(), ["sw", "nw", "mid", "se", "ne"]);
        assert_eq!(
            layers.rings(),
            vec![vec!["sw", "nw", "ne", "se"], vec!["mid"]]
        );
        assert_eq!(layers.successor_of(&"mid"), Some(&"mid"));
        assert_eq!(layers.links().len(), 4);
    }

    #[test]
    fn collinear_boundary_points_stay_on_the_ring() {
        let layers = HullLayers::compute([
            (0, p(0.0, 0.0)),
            (1, p(1.0, 0.0)),
            (2, p(2.0, 0.0)),
            (3, p(2.0, 2.0)),
            (4, p(0.0, 2.0)),
        ]);
        assert_eq!(layers.rings(), vec![vec![0, 4, 3, 2, 1]]);
    }

    #[test]
    fn points_on_one_line_form_a_single_ring() {
        let layers = HullLayers::compute([
            ("c", p(2.0, 2.0)),
            ("a", p(0.0, 0.0)),
            ("b", p(1.0, 1.0)),
        ]);
        assert_eq!(layers.layer_count(), 1);
        assert_eq!(layers.rings(), vec![vec!["a", "b", "c"]]);
    }

    #[test]
    fn coincident_points_are_all_placed() {
        let layers = HullLayers::compute([
            ("a", p(0.0, 0.0)),
            ("b", p(0.0, 0.0)),
            ("c", p(4.0, 0.0)),
            ("d", p(0.0, 4.0)),
        ]);
        let placed: usize = layers.rings().iter().map(Vec::len).sum();
        assert_eq!(placed, 4);
    }

    #[test]
    fn non_finite_coordinates_terminate() {
        let layers = HullLayers::compute([
            ("a", p(0.0, 0.0)),
            ("b", p(f64::NAN, 1.0)),
            ("c", p(1.0, f64::INFINITY)),
            ("d", p(2.0, 0.0)),
        ]);
        let placed: usize = layers.rings().iter().map(Vec::len).sum();
        assert_eq!(placed, 4);
    }

    /// Every ring edge must keep all points of its own and inner rings on
    /// its right or on its line, and every point lying on the edge segment
    /// must be on the ring.
    fn assert_valid_peeling(points: &[(usize, Point)], layers: &HullLayers<usize>) {
        let rings = layers.rings();
        let mut seen = BTreeSet::new();
        for ring in &rings {
            for key in ring {
                assert!(seen.insert(*key), "point {key} placed twice");
            }
        }
        assert_eq!(seen.len(), points.len());

        let position = |key: usize| points.iter().find(|(k, _)| *k == key).unwrap().1;
        for (depth, ring) in rings.iter().enumerate() {
            let remaining: Vec<usize> = rings[depth..].iter().flatten().copied().collect();
            if ring.len() < 2 {
                continue;
            }
            for (index, &from) in ring.iter().enumerate() {
                let to = ring[(index + 1) % ring.len()];
                let (a, b) = (position(from), position(to));
                for &other in &remaining {
                    let c = position(other);
                    let turn = a.cross(b, c);
                    assert!(turn <= 0.0, "point {other} left of {from}->{to}");
                    let within = (c.x - a.x) * (c.x - b.x) <= 0.0 && (c.y - a.y) * (c.y - b.y) <= 0.0;
                    if turn == 0.0 && within {
                        assert!(ring.contains(&other), "point {other} on {from}->{to} skipped");
                    }
                }
            }
        }
    }

    #[test]
    fn random_sets_peel_into_valid_rings() {
        for seed in 0..40_u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let count = rng.random_range(1..60_usize);
            let mut unique = BTreeSet::new();
            for _ in 0..count {
                unique.insert((rng.random_range(0..30_i32), rng.random_range(0..30_i32)));
            }
            let points: Vec<(usize, Point)> = unique
                .into_iter()
                .enumerate()
                .map(|(key, (x, y))| (key, p(f64::from(x), f64::from(y))))
                .collect();

            let layers = HullLayers::compute(points.clone());
            assert_valid_peeling(&points, &layers);
        }
    }

    /// Points on the convex hull boundary, collinear boundary points
    /// included: `c` is on the boundary when it lies on a segment `a`-`b`
    /// whose line has every point on one side.
    fn brute_force_boundary(points: &[(usize, Point)]) -> BTreeSet<usize> {
        let mut boundary = BTreeSet::new();
        for (i, &(ka, a)) in points.iter().enumerate() {
            for &(kb, b) in &points[i + 1..] {
                let turns: Vec<f64> = points.iter().map(|(_, c)| a.cross(b, *c)).collect();
                let supporting = turns.iter().all(|t| *t <= 0.0) || turns.iter().all(|t| *t >= 0.0);
                if !supporting {
                    continue;
                }
                boundary.insert(ka);
                boundary.insert(kb);
                for (&(kc, c), turn) in points.iter().zip(&turns) {
                    let within =
                        (c.x - a.x) * (c.x - b.x) <= 0.0 && (c.y - a.y) * (c.y - b.y) <= 0.0;
                    if *turn == 0.0 && within {
                        boundary.insert(kc);
                    }
                }
            }
        }
        boundary
    }

    #[test]
    fn outer_ring_is_the_convex_hull() {
        for seed in 0..25_u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let count = rng.random_range(2..70_usize);
            let mut unique = BTreeSet::new();
            for _ in 0..count {
                unique.insert((rng.random_range(-12..12_i32), rng.random_range(-12..12_i32)));
            }
            let points: Vec<(usize, Point)> = unique
                .into_iter()
                .enumerate()
                .map(|(key, (x, y))| (key, p(f64::from(x), f64::from(y))))
                .collect();
            if points.len() < 2 {
                continue;
            }

            let layers = HullLayers::compute(points.clone());
            let outer: BTreeSet<usize> = layers.rings()[0].iter().copied().collect();
            assert_eq!(outer, brute_force_boundary(&points), "seed {seed}");
        }
    }

    #[test]
    fn outer_ring_keeps_every_collinear_edge_point() {
        let points: Vec<(usize, Point)> = [
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (3.0, 0.0),
            (3.0, 3.0),
            (0.0, 3.0),
            (0.0, 1.5),
            (1.0, 1.0),
        ]
        .into_iter()
        .enumerate()
        .map(|(key, (x, y))| (key, p(x, y)))
        .collect();

        let layers = HullLayers::compute(points.clone());
        let outer: BTreeSet<usize> = layers.rings()[0].iter().copied().collect();
        assert_eq!(outer, brute_force_boundary(&points));
        assert_eq!(outer, (0..7).collect());
    }
}
