//! Pairwise set operations between containers.
//!
//! Each operation dispatches on the pair of representations. Symmetric operations share one
//! implementation per unordered pair, picking the operand order that is cheaper to evaluate.

use super::{
    array::Array,
    bitmap::Bitmap,
    policy::ARRAY_MAX_CARDINALITY,
    run::Run,
    Container::{self, Array as A, Bitmap as B, Run as R},
};

/// Sweeps the boundaries of two run lists, keeping the ranges where `keep(in_a, in_b)` holds.
///
/// `keep(false, false)` must be false.
fn sweep(a: &[(u16, u16)], b: &[(u16, u16)], keep: impl Fn(bool, bool) -> bool) -> Run {
    // Position of the next membership change in a run list, as a half-open boundary.
    fn boundary(runs: &[(u16, u16)], index: usize, inside: bool) -> u32 {
        match runs.get(index) {
            None => u32::MAX,
            Some(&(start, _)) if !inside => start as u32,
            Some(&(_, end)) => end as u32 + 1,
        }
    }

    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    let (mut in_a, mut in_b) = (false, false);
    let mut open: Option<u32> = None;
    loop {
        let next_a = boundary(a, i, in_a);
        let next_b = boundary(b, j, in_b);
        let position = next_a.min(next_b);
        if position == u32::MAX {
            break;
        }
        if next_a == position {
            if in_a {
                i += 1;
            }
            in_a = !in_a;
        }
        if next_b == position {
            if in_b {
                j += 1;
            }
            in_b = !in_b;
        }
        match (open, keep(in_a, in_b)) {
            (None, true) => open = Some(position),
            (Some(start), false) => {
                out.push((start as u16, (position - 1) as u16));
                open = None;
            }
            _ => {}
        }
    }
    Run::from_sorted_runs(out)
}

/// Keeps the array values covered (or not covered, if `inside` is false) by the runs.
fn filter_by_runs(array: &Array, run: &Run, inside: bool) -> Array {
    let runs = run.runs();
    let mut index = 0;
    array.filter(|v| {
        while index < runs.len() && runs[index].1 < v {
            index += 1;
        }
        let covered = index < runs.len() && runs[index].0 <= v;
        covered == inside
    })
}

/// Returns the number of values shared by two run lists.
fn runs_overlap(a: &[(u16, u16)], b: &[(u16, u16)], stop_at_first: bool) -> u32 {
    let (mut i, mut j) = (0, 0);
    let mut total = 0;
    while i < a.len() && j < b.len() {
        let (a_start, a_end) = a[i];
        let (b_start, b_end) = b[j];
        let start = a_start.max(b_start);
        let end = a_end.min(b_end);
        if start <= end {
            total += (end - start) as u32 + 1;
            if stop_at_first {
                return total;
            }
        }
        if a_end < b_end {
            i += 1;
        } else {
            j += 1;
        }
    }
    total
}

impl Container {
    /// Returns the intersection of two containers.
    pub fn and(&self, other: &Container) -> Container {
        match (self, other) {
            (A(a), A(b)) => A(a.intersection(b)),
            (A(a), B(b)) | (B(b), A(a)) => A(a.filter(|v| b.contains(v))),
            (A(a), R(r)) | (R(r), A(a)) => A(filter_by_runs(a, r, true)),
            (B(a), B(b)) => Container::from_bitmap(a.and_new(b)),
            (B(b), R(r)) | (R(r), B(b)) => {
                if r.is_full() {
                    return Container::from_boxed_bitmap(b.clone());
                }
                if r.len() <= ARRAY_MAX_CARDINALITY {
                    let values = r.iter().filter(|&v| b.contains(v)).collect();
                    return A(Array::from_sorted_vec(values));
                }
                Container::from_bitmap(b.retain_ranges(r.ranges()))
            }
            (R(a), R(b)) => Container::from_run(sweep(a.runs(), b.runs(), |x, y| x && y)),
        }
    }

    /// Returns the union of two containers.
    pub fn or(&self, other: &Container) -> Container {
        match (self, other) {
            (A(a), A(b)) => {
                if a.len() + b.len() <= ARRAY_MAX_CARDINALITY {
                    return A(a.union(b));
                }
                let mut bitmap = Bitmap::from_array(a);
                for v in b.iter() {
                    bitmap.insert(v);
                }
                Container::from_bitmap(bitmap)
            }
            (A(a), B(b)) | (B(b), A(a)) => {
                let mut bitmap = b.clone();
                for v in a.iter() {
                    bitmap.insert(v);
                }
                Container::from_boxed_bitmap(bitmap)
            }
            (A(a), R(r)) | (R(r), A(a)) => {
                if r.is_full() {
                    return R(r.clone());
                }
                Container::from_run(sweep(Run::from_array(a).runs(), r.runs(), |x, y| x || y))
            }
            (B(a), B(b)) => Container::from_bitmap(a.or_new(b)),
            (B(b), R(r)) | (R(r), B(b)) => {
                if r.is_full() {
                    return R(r.clone());
                }
                let mut bitmap = b.clone();
                for (start, end) in r.ranges() {
                    bitmap.insert_range(start, end);
                }
                Container::from_boxed_bitmap(bitmap)
            }
            (R(a), R(b)) => Container::from_run(sweep(a.runs(), b.runs(), |x, y| x || y)),
        }
    }

    /// Returns the symmetric difference of two containers.
    pub fn xor(&self, other: &Container) -> Container {
        match (self, other) {
            (A(a), A(b)) => {
                if a.len() + b.len() <= ARRAY_MAX_CARDINALITY {
                    return A(a.symmetric_difference(b));
                }
                let mut bitmap = Bitmap::from_array(a);
                for v in b.iter() {
                    bitmap.flip(v);
                }
                Container::from_bitmap(bitmap)
            }
            (A(a), B(b)) | (B(b), A(a)) => {
                let mut bitmap = b.clone();
                for v in a.iter() {
                    bitmap.flip(v);
                }
                Container::from_boxed_bitmap(bitmap)
            }
            (A(a), R(r)) | (R(r), A(a)) => {
                Container::from_run(sweep(Run::from_array(a).runs(), r.runs(), |x, y| x != y))
            }
            (B(a), B(b)) => Container::from_bitmap(a.xor_new(b)),
            (B(b), R(r)) | (R(r), B(b)) => {
                let mut bitmap = b.clone();
                for (start, end) in r.ranges() {
                    bitmap.flip_range(start, end);
                }
                Container::from_boxed_bitmap(bitmap)
            }
            (R(a), R(b)) => Container::from_run(sweep(a.runs(), b.runs(), |x, y| x != y)),
        }
    }

    /// Returns `self - other`.
    pub fn and_not(&self, other: &Container) -> Container {
        match (self, other) {
            (A(a), A(b)) => A(a.difference(b)),
            (A(a), B(b)) => A(a.filter(|v| !b.contains(v))),
            (A(a), R(r)) => A(filter_by_runs(a, r, false)),
            (B(a), A(b)) => {
                let mut bitmap = a.clone();
                for v in b.iter() {
                    bitmap.remove(v);
                }
                Container::from_boxed_bitmap(bitmap)
            }
            (B(a), B(b)) => Container::from_bitmap(a.and_not_new(b)),
            (B(a), R(r)) => {
                let mut bitmap = a.clone();
                for (start, end) in r.ranges() {
                    bitmap.remove_range(start, end);
                }
                Container::from_boxed_bitmap(bitmap)
            }
            (R(a), A(b)) => {
                Container::from_run(sweep(a.runs(), Run::from_array(b).runs(), |x, y| x && !y))
            }
            (R(a), B(b)) => {
                if a.len() <= ARRAY_MAX_CARDINALITY {
                    let values = a.iter().filter(|&v| !b.contains(v)).collect();
                    return A(Array::from_sorted_vec(values));
                }
                let mut bitmap = a.to_bitmap();
                bitmap.and_not_assign(b);
                Container::from_bitmap(bitmap)
            }
            (R(a), R(b)) => Container::from_run(sweep(a.runs(), b.runs(), |x, y| x && !y)),
        }
    }

    /// Returns `self | ([0, end) - other)`.
    ///
    /// `end` is at most 65536; values of `other` at or above `end` are ignored.
    pub fn or_not(&self, other: &Container, end: u32) -> Container {
        if end == 0 {
            return self.clone();
        }
        let complement = Container::range_of_ones(0, end).and_not(other);
        self.or(&complement)
    }

    /// Intersects in place, reusing the left operand's storage when possible.
    pub fn iand(self, other: &Container) -> Container {
        match (self, other) {
            (B(mut a), B(b)) => {
                a.and_assign(b);
                Container::from_boxed_bitmap(a)
            }
            (this, other) => this.and(other),
        }
    }

    /// Unions in place, reusing the left operand's storage when possible.
    pub fn ior(self, other: &Container) -> Container {
        match (self, other) {
            (B(mut a), B(b)) => {
                a.or_assign(b);
                Container::from_boxed_bitmap(a)
            }
            (B(mut a), A(b)) => {
                for v in b.iter() {
                    a.insert(v);
                }
                Container::from_boxed_bitmap(a)
            }
            (B(mut a), R(r)) if !r.is_full() => {
                for (start, end) in r.ranges() {
                    a.insert_range(start, end);
                }
                Container::from_boxed_bitmap(a)
            }
            (this, other) => this.or(other),
        }
    }

    /// Computes the symmetric difference in place, reusing the left operand's storage when possible.
    pub fn ixor(self, other: &Container) -> Container {
        match (self, other) {
            (B(mut a), B(b)) => {
                a.xor_assign(b);
                Container::from_boxed_bitmap(a)
            }
            (B(mut a), A(b)) => {
                for v in b.iter() {
                    a.flip(v);
                }
                Container::from_boxed_bitmap(a)
            }
            (B(mut a), R(r)) => {
                for (start, end) in r.ranges() {
                    a.flip_range(start, end);
                }
                Container::from_boxed_bitmap(a)
            }
            (this, other) => this.xor(other),
        }
    }

    /// Removes the values of `other` in place, reusing the left operand's storage when possible.
    pub fn iand_not(self, other: &Container) -> Container {
        match (self, other) {
            (B(mut a), B(b)) => {
                a.and_not_assign(b);
                Container::from_boxed_bitmap(a)
            }
            (B(mut a), A(b)) => {
                for v in b.iter() {
                    a.remove(v);
                }
                Container::from_boxed_bitmap(a)
            }
            (B(mut a), R(r)) => {
                for (start, end) in r.ranges() {
                    a.remove_range(start, end);
                }
                Container::from_boxed_bitmap(a)
            }
            (this, other) => this.and_not(other),
        }
    }

    /// Returns the cardinality of the intersection without materializing it.
    pub fn and_len(&self, other: &Container) -> u32 {
        match (self, other) {
            (A(a), A(b)) => a.intersection_len(b),
            (A(a), B(b)) | (B(b), A(a)) => a.iter().filter(|&v| b.contains(v)).count() as u32,
            (A(a), R(r)) | (R(r), A(a)) => filter_by_runs(a, r, true).len(),
            (B(a), B(b)) => a.and_len(b),
            (B(b), R(r)) | (R(r), B(b)) => r
                .ranges()
                .map(|(start, end)| b.count_range(start, end))
                .sum(),
            (R(a), R(b)) => runs_overlap(a.runs(), b.runs(), false),
        }
    }

    /// Returns the cardinality of the union without materializing it.
    pub fn or_len(&self, other: &Container) -> u32 {
        self.len() + other.len() - self.and_len(other)
    }

    /// Returns the cardinality of the symmetric difference without materializing it.
    pub fn xor_len(&self, other: &Container) -> u32 {
        self.len() + other.len() - 2 * self.and_len(other)
    }

    /// Returns the cardinality of `self - other` without materializing it.
    pub fn and_not_len(&self, other: &Container) -> u32 {
        self.len() - self.and_len(other)
    }

    /// Returns whether the two containers share at least one value.
    pub fn intersects(&self, other: &Container) -> bool {
        match (self, other) {
            (A(a), A(b)) => a.intersects(b),
            (A(a), B(b)) | (B(b), A(a)) => a.iter().any(|v| b.contains(v)),
            (A(a), R(r)) | (R(r), A(a)) => {
                let runs = r.runs();
                let mut index = 0;
                a.iter().any(|v| {
                    while index < runs.len() && runs[index].1 < v {
                        index += 1;
                    }
                    index < runs.len() && runs[index].0 <= v
                })
            }
            (B(a), B(b)) => a.intersects(b),
            (B(b), R(r)) | (R(r), B(b)) => {
                r.ranges().any(|(start, end)| b.intersects_range(start, end))
            }
            (R(a), R(b)) => runs_overlap(a.runs(), b.runs(), true) > 0,
        }
    }

    /// Returns whether every value of `self` is also in `other`.
    pub fn is_subset(&self, other: &Container) -> bool {
        self.len() <= other.len() && self.and_len(other) == self.len()
    }

    /// Starts (or continues) a union whose cardinality is computed only on [`Lazy::repair`].
    pub fn lazy_or(&self, other: &Container) -> Lazy {
        match (self, other) {
            (A(a), A(b)) if a.len() + b.len() <= ARRAY_MAX_CARDINALITY => {
                Lazy::Repaired(A(a.union(b)))
            }
            (A(_), R(_)) | (R(_), A(_)) | (R(_), R(_)) => Lazy::Repaired(self.or(other)),
            _ => {
                let mut unrepaired = Unrepaired::from_container(self);
                unrepaired.or_lazy(other);
                Lazy::Unrepaired(unrepaired)
            }
        }
    }
}

/// A bitmap container whose cardinality is stale after lazy unions.
///
/// The only way to read the result is [`Unrepaired::repair`], which recomputes the cardinality.
#[derive(Clone, Debug)]
pub struct Unrepaired(Box<Bitmap>);

impl Unrepaired {
    fn from_container(container: &Container) -> Self {
        match container {
            A(a) => Self(Box::new(Bitmap::from_array(a))),
            B(b) => Self(b.clone()),
            R(r) => Self(Box::new(r.to_bitmap())),
        }
    }

    fn or_lazy(&mut self, other: &Container) {
        match other {
            A(a) => {
                for v in a.iter() {
                    self.0.insert_lazy(v);
                }
            }
            B(b) => self.0.or_lazy(b),
            R(r) => {
                for (start, end) in r.ranges() {
                    self.0.insert_range_lazy(start, end);
                }
            }
        }
    }

    /// Recomputes the cardinality and returns the container in its proper representation.
    pub fn repair(mut self) -> Container {
        self.0.repair();
        Container::from_boxed_bitmap(self.0)
    }
}

/// The result of a lazy union.
#[derive(Clone, Debug)]
pub enum Lazy {
    /// The cardinality is accurate.
    Repaired(Container),
    /// The cardinality must be recomputed before the container can be used.
    Unrepaired(Unrepaired),
}

impl Lazy {
    /// Unions another container into the result.
    pub fn lazy_or(self, other: &Container) -> Lazy {
        match self {
            Lazy::Repaired(container) => container.lazy_or(other),
            Lazy::Unrepaired(mut unrepaired) => {
                unrepaired.or_lazy(other);
                Lazy::Unrepaired(unrepaired)
            }
        }
    }

    /// Returns the finished container.
    pub fn repair(self) -> Container {
        match self {
            Lazy::Repaired(container) => container,
            Lazy::Unrepaired(unrepaired) => unrepaired.repair(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Kind;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::BTreeSet;

    /// Builds the same random set as a dense container and as a run container.
    fn representations(rng: &mut StdRng, count: usize, runs: bool) -> (BTreeSet<u16>, Vec<Container>) {
        let mut set = BTreeSet::new();
        if runs {
            for _ in 0..count {
                let start: u16 = rng.gen_range(0..65000);
                let len: u16 = rng.gen_range(1..500);
                set.extend(start..start + len);
            }
        } else {
            for _ in 0..count {
                set.insert(rng.gen());
            }
        }
        let array = Array::from_sorted_vec(set.iter().copied().collect());
        let run = Run::from_array(&array);
        (set, vec![Container::from_array(array), R(run)])
    }

    fn check(result: &Container, expected: &BTreeSet<u16>) {
        assert!(result.is_valid(), "invalid result {:?}", result.kind());
        assert_eq!(result.len() as usize, expected.len());
        assert!(result.iter().eq(expected.iter().copied()));
    }

    #[test]
    fn test_all_pairs_against_model() {
        let mut rng = StdRng::seed_from_u64(42);
        for (count_a, runs_a, count_b, runs_b) in [
            (100, false, 3000, false),
            (4000, false, 4000, false),
            (10_000, false, 50, false),
            (20, true, 2000, false),
            (40, true, 30, true),
            (3, false, 60, true),
        ] {
            let (set_a, xs) = representations(&mut rng, count_a, runs_a);
            let (set_b, ys) = representations(&mut rng, count_b, runs_b);
            let and: BTreeSet<u16> = set_a.intersection(&set_b).copied().collect();
            let or: BTreeSet<u16> = set_a.union(&set_b).copied().collect();
            let xor: BTreeSet<u16> = set_a.symmetric_difference(&set_b).copied().collect();
            let and_not: BTreeSet<u16> = set_a.difference(&set_b).copied().collect();
            for x in &xs {
                for y in &ys {
                    check(&x.and(y), &and);
                    check(&x.or(y), &or);
                    check(&x.xor(y), &xor);
                    check(&x.and_not(y), &and_not);
                    check(&x.clone().iand(y), &and);
                    check(&x.clone().ior(y), &or);
                    check(&x.clone().ixor(y), &xor);
                    check(&x.clone().iand_not(y), &and_not);
                    check(&x.lazy_or(y).repair(), &or);
                    assert_eq!(x.and_len(y) as usize, and.len());
                    assert_eq!(x.or_len(y) as usize, or.len());
                    assert_eq!(x.xor_len(y) as usize, xor.len());
                    assert_eq!(x.and_not_len(y) as usize, and_not.len());
                    assert_eq!(x.intersects(y), !and.is_empty());
                    assert_eq!(x.is_subset(y), set_a.is_subset(&set_b));
                }
            }
        }
    }

    #[test]
    fn test_sweep_merges_touching_runs() {
        let a = [(0, 4), (10, 14)];
        let b = [(5, 9)];
        let run = sweep(&a, &b, |x, y| x || y);
        assert_eq!(run.runs(), &[(0, 14)]);
        let run = sweep(&a, &[(0, u16::MAX)], |x, y| x != y);
        assert_eq!(run.runs(), &[(5, 9), (15, u16::MAX)]);
    }

    #[test]
    fn test_or_not() {
        let c = Container::Array(Array::from_sorted_vec(vec![0, 10]));
        let result = c.or_not(&Container::new(), 7);
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5, 6, 10]);

        let other = Container::range_of_ones(2, 5);
        let result = Container::new().or_not(&other, 8);
        assert_eq!(result.iter().collect::<Vec<_>>(), vec![0, 1, 5, 6, 7]);
        assert_eq!(c.or_not(&other, 0), c);
        assert!(Container::new().or_not(&Container::new(), 65536).is_full());
    }

    #[test]
    fn test_lazy_or_chain() {
        let mut lazy = Lazy::Repaired(Container::new());
        for i in 0..10u32 {
            let part = Container::range_of_ones(i * 1000, i * 1000 + 600);
            lazy = lazy.lazy_or(&part);
            lazy = lazy.lazy_or(&Container::Array(Array::from_range(i * 1000 + 600, i * 1000 + 700)));
        }
        let result = lazy.repair();
        assert_eq!(result.len(), 7000);
        assert!(result.is_valid());
    }

    #[test]
    fn test_full_run_shortcuts() {
        let full = Container::full();
        let bitmap = Container::Bitmap(Box::new(Run::from_range(0, 5000).to_bitmap()));
        assert_eq!(full.and(&bitmap), bitmap);
        assert_eq!(full.or(&bitmap).kind(), Kind::Run);
        assert!(full.xor(&full).is_empty());
    }
}
