//! R*-tree split heuristic [BKSS90].
//!
//! For each axis the entries are sorted by their lower, then upper
//! coordinate. Every distribution puts the first `min_fanout + k` entries in
//! group A and the rest in group B. The axis whose distributions have the
//! smaller margin sum wins; along it the distribution with the least overlap
//! (then least total area) is chosen.
//!
//! The same routine is used by dynamic node splits and by the bulk loader's
//! repacking cache, where the entry count can be far larger than the fanout.

use std::cmp::Ordering;

use crate::rectangle::{Coord, Rectangle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    X,
    Y,
}

/// Outcome of [`choose_split_axis_and_index`].
#[derive(Debug, Clone)]
pub struct SplitChoice<C> {
    pub axis: SplitAxis,
    /// Entries sorted along `axis`
    pub entries: Vec<Rectangle<C>>,
    /// Winning distribution index `k`
    pub distribution: usize,
    /// Length of group A, i.e. the index at which `entries` is cut
    pub split_at: usize,
}

impl<C: Coord> SplitChoice<C> {
    /// Group A and group B.
    pub fn into_groups(mut self) -> (Vec<Rectangle<C>>, Vec<Rectangle<C>>) {
        let second = self.entries.split_off(self.split_at);
        (self.entries, second)
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn sort_along<C: Coord>(entries: &mut [Rectangle<C>], axis: SplitAxis) {
    match axis {
        SplitAxis::X => entries.sort_by(|a, b| {
            cmp_f64(a.xlo().to_f64(), b.xlo().to_f64())
                .then_with(|| cmp_f64(a.xhi().to_f64(), b.xhi().to_f64()))
        }),
        SplitAxis::Y => entries.sort_by(|a, b| {
            cmp_f64(a.ylo().to_f64(), b.ylo().to_f64())
                .then_with(|| cmp_f64(a.yhi().to_f64(), b.yhi().to_f64()))
        }),
    }
}

struct Distribution {
    area: f64,
    overlap: f64,
}

/// Evaluates every distribution on already sorted entries.
/// Returns the margin sum `S` and per-distribution area/overlap values.
fn evaluate<C: Coord>(
    sorted: &[Rectangle<C>],
    first_len: usize,
    distributions: usize,
) -> (f64, Vec<Distribution>) {
    let n = sorted.len();

    // prefix[i] covers sorted[..=i], suffix[i] covers sorted[i..]
    let mut prefix = Vec::with_capacity(n);
    let mut acc = sorted[0];
    for r in sorted {
        acc.extend(r);
        prefix.push(acc);
    }
    let mut suffix = vec![sorted[n - 1]; n];
    let mut acc = sorted[n - 1];
    for i in (0..n).rev() {
        acc.extend(&sorted[i]);
        suffix[i] = acc;
    }

    let mut margin_sum = 0.0;
    let mut values = Vec::with_capacity(distributions);
    for k in 0..distributions {
        let split_at = first_len + k;
        let a = &prefix[split_at - 1];
        let b = &suffix[split_at];
        margin_sum += a.margin() + b.margin();
        values.push(Distribution {
            area: a.area() + b.area(),
            overlap: a.overlap_area(b),
        });
    }
    (margin_sum, values)
}

/// Chooses split axis and distribution for `entries`.
///
/// Distribution indices range over `[0, fanout - 2 * min_fanout]`, clipped
/// so that group B never gets fewer entries than group A's minimum. At least
/// one entry always lands in each group when two or more entries are given.
pub fn choose_split_axis_and_index<C: Coord>(
    entries: &[Rectangle<C>],
    fanout: usize,
    min_fanout: usize,
) -> SplitChoice<C> {
    let n = entries.len();
    if n < 2 {
        return SplitChoice {
            axis: SplitAxis::X,
            entries: entries.to_vec(),
            distribution: 0,
            split_at: n,
        };
    }

    let first_len = min_fanout.max(1).min(n / 2);
    let distributions = fanout
        .saturating_sub(2 * min_fanout)
        .min(n - 2 * first_len)
        + 1;

    let mut by_x = entries.to_vec();
    sort_along(&mut by_x, SplitAxis::X);
    let (s_x, values_x) = evaluate(&by_x, first_len, distributions);

    let mut by_y = entries.to_vec();
    sort_along(&mut by_y, SplitAxis::Y);
    let (s_y, values_y) = evaluate(&by_y, first_len, distributions);

    let (axis, sorted, values) = if s_y < s_x {
        (SplitAxis::Y, by_y, values_y)
    } else {
        (SplitAxis::X, by_x, values_x)
    };

    let mut best = 0;
    for (k, v) in values.iter().enumerate().skip(1) {
        let current = &values[best];
        if v.overlap < current.overlap || (v.overlap == current.overlap && v.area < current.area) {
            best = k;
        }
    }

    SplitChoice {
        axis,
        entries: sorted,
        distribution: best,
        split_at: first_len + best,
    }
}
