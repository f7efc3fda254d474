//! Sets of integers stored as sorted closed intervals.

use std::cmp::Ordering;
use std::fmt;

/// A set of values in `[0, max]`, stored as sorted, disjoint, non-adjacent
/// closed intervals.
///
/// All binary operations expect both operands to share the same domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntervalSet {
    max: u32,
    ranges: Vec<(u32, u32)>,
}

fn normalize(max: u32, mut ranges: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
    ranges.retain(|&(lo, hi)| lo <= hi && lo <= max);
    for range in ranges.iter_mut() {
        range.1 = range.1.min(max);
    }
    ranges.sort_unstable();

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        if let Some(last) = merged.last_mut() {
            if lo <= last.1.saturating_add(1) {
                last.1 = last.1.max(hi);
                continue;
            }
        }
        merged.push((lo, hi));
    }
    merged
}

impl IntervalSet {
    /// Every value in `[0, max]`.
    pub fn full(max: u32) -> Self {
        Self {
            max,
            ranges: vec![(0, max)],
        }
    }

    pub fn empty(max: u32) -> Self {
        Self {
            max,
            ranges: Vec::new(),
        }
    }

    pub fn single(max: u32, value: u32) -> Self {
        Self::range(max, value, value)
    }

    /// The closed range `[lo, hi]`, clipped to the domain.
    pub fn range(max: u32, lo: u32, hi: u32) -> Self {
        Self::from_ranges(max, vec![(lo, hi)])
    }

    /// Builds a set from arbitrary (possibly overlapping) closed ranges.
    pub fn from_ranges(max: u32, ranges: Vec<(u32, u32)>) -> Self {
        Self {
            max,
            ranges: normalize(max, ranges),
        }
    }

    /// Builds a set from individual values.
    pub fn from_values<I: IntoIterator<Item = u32>>(max: u32, values: I) -> Self {
        Self::from_ranges(max, values.into_iter().map(|v| (v, v)).collect())
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ranges.len() == 1 && self.ranges[0] == (0, self.max)
    }

    /// Number of values in the set.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|&(lo, hi)| u64::from(hi - lo) + 1)
            .sum()
    }

    /// Smallest member, if any.
    pub fn first(&self) -> Option<u32> {
        self.ranges.first().map(|&(lo, _)| lo)
    }

    pub fn contains(&self, value: u32) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < value {
                    Ordering::Less
                } else if lo > value {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn intersect(&self, other: &Self) -> Self {
        debug_assert_eq!(self.max, other.max, "interval domains differ");
        let (a, b) = (&self.ranges, &other.ranges);
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            let lo = a[i].0.max(b[j].0);
            let hi = a[i].1.min(b[j].1);
            if lo <= hi {
                out.push((lo, hi));
            }
            if a[i].1 < b[j].1 {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self {
            max: self.max,
            ranges: out,
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        debug_assert_eq!(self.max, other.max, "interval domains differ");
        let mut all = self.ranges.clone();
        all.extend_from_slice(&other.ranges);
        Self::from_ranges(self.max, all)
    }

    pub fn complement(&self) -> Self {
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut next: u64 = 0;
        for &(lo, hi) in &self.ranges {
            if u64::from(lo) > next {
                out.push((next as u32, lo - 1));
            }
            next = u64::from(hi) + 1;
        }
        if next <= u64::from(self.max) {
            out.push((next as u32, self.max));
        }
        Self {
            max: self.max,
            ranges: out,
        }
    }

    /// Values in `self` but not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        if other.is_empty() || self.is_empty() {
            return self.clone();
        }
        self.intersect(&other.complement())
    }

    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.difference(other).is_empty()
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full() {
            return write!(f, "*");
        }
        let parts: Vec<String> = self
            .ranges
            .iter()
            .map(|&(lo, hi)| {
                if lo == hi {
                    lo.to_string()
                } else {
                    format!("{}-{}", lo, hi)
                }
            })
            .collect();
        write!(f, "{{{}}}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PORTS: u32 = 65535;

    #[test]
    fn test_normalize_merges_overlap_and_adjacency() {
        let set = IntervalSet::from_ranges(PORTS, vec![(10, 20), (5, 9), (15, 30), (40, 41)]);
        assert_eq!(set.ranges(), &[(5, 30), (40, 41)]);
    }

    #[test]
    fn test_normalize_clips_to_domain() {
        let set = IntervalSet::from_ranges(255, vec![(250, 300), (400, 500)]);
        assert_eq!(set.ranges(), &[(250, 255)]);
    }

    #[test]
    fn test_full_and_empty() {
        assert!(IntervalSet::full(PORTS).is_full());
        assert!(IntervalSet::empty(PORTS).is_empty());
        assert_eq!(IntervalSet::full(u32::MAX).len(), 1u64 << 32);
    }

    #[test]
    fn test_contains() {
        let set = IntervalSet::from_ranges(PORTS, vec![(1, 5), (100, 200)]);
        assert!(set.contains(1));
        assert!(set.contains(150));
        assert!(!set.contains(50));
        assert!(!set.contains(201));
    }

    #[test]
    fn test_intersect() {
        let a = IntervalSet::from_ranges(PORTS, vec![(0, 10), (20, 30)]);
        let b = IntervalSet::from_ranges(PORTS, vec![(5, 25)]);
        assert_eq!(a.intersect(&b).ranges(), &[(5, 10), (20, 25)]);
    }

    #[test]
    fn test_complement_at_domain_edges() {
        let set = IntervalSet::from_ranges(u32::MAX, vec![(0, 9), (u32::MAX - 1, u32::MAX)]);
        assert_eq!(set.complement().ranges(), &[(10, u32::MAX - 2)]);
        assert!(IntervalSet::full(u32::MAX).complement().is_empty());
        assert!(IntervalSet::empty(255).complement().is_full());
    }

    #[test]
    fn test_difference() {
        let all = IntervalSet::full(PORTS);
        let http = IntervalSet::single(PORTS, 80);
        let rest = all.difference(&http);
        assert_eq!(rest.ranges(), &[(0, 79), (81, PORTS)]);
        assert!(!rest.contains(80));
        assert!(rest.union(&http).is_full());
    }

    #[test]
    fn test_subset() {
        let small = IntervalSet::range(PORTS, 10, 20);
        let big = IntervalSet::range(PORTS, 0, 100);
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
        assert!(IntervalSet::empty(PORTS).is_subset_of(&small));
    }

    #[test]
    fn test_display() {
        assert_eq!(IntervalSet::full(255).to_string(), "*");
        assert_eq!(
            IntervalSet::from_ranges(255, vec![(6, 6), (17, 17)]).to_string(),
            "{6,17}"
        );
    }

    #[test]
    fn test_operations_agree_with_bruteforce() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let max = 63;
        for _ in 0..200 {
            let mut random_set = || {
                let ranges = (0..rng.gen_range(0..4))
                    .map(|_| {
                        let lo = rng.gen_range(0..=max);
                        (lo, rng.gen_range(lo..=max))
                    })
                    .collect();
                IntervalSet::from_ranges(max, ranges)
            };
            let a = random_set();
            let b = random_set();
            let inter = a.intersect(&b);
            let uni = a.union(&b);
            let diff = a.difference(&b);
            for v in 0..=max {
                assert_eq!(inter.contains(v), a.contains(v) && b.contains(v));
                assert_eq!(uni.contains(v), a.contains(v) || b.contains(v));
                assert_eq!(diff.contains(v), a.contains(v) && !b.contains(v));
            }
        }
    }
}
