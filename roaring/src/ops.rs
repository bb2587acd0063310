//! Pairwise set algebra over bitmaps.
//!
//! Every operation walks both directories in key order. Keys present in only one operand are
//! copied or skipped depending on the operation; keys present in both delegate to the matching
//! [`Container`] operation, and empty results are never stored.

use crate::{
    bitmap::{check_range, RoaringBitmap},
    container::Container,
    directory::Directory,
    Error,
};
use core::{
    cmp::Ordering,
    ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Sub, SubAssign},
};

/// Walks two directories, combining shared keys with `both` and keeping one-sided keys as
/// requested.
fn merge(
    a: &Directory,
    b: &Directory,
    keep_left: bool,
    keep_right: bool,
    both: impl Fn(&Container, &Container) -> Container,
) -> Directory {
    let mut out = Directory::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (ka, kb) = (a.key_at(i), b.key_at(j));
        match ka.cmp(&kb) {
            Ordering::Less => {
                if keep_left {
                    out.append(ka, a.container_at(i).clone());
                }
                i += 1;
            }
            Ordering::Greater => {
                if keep_right {
                    out.append(kb, b.container_at(j).clone());
                }
                j += 1;
            }
            Ordering::Equal => {
                out.append_non_empty(ka, both(a.container_at(i), b.container_at(j)));
                i += 1;
                j += 1;
            }
        }
    }
    if keep_left {
        out.append_copies(a, i, a.len());
    }
    if keep_right {
        out.append_copies(b, j, b.len());
    }
    out
}

/// Like [`merge`], but consumes the containers of `a` so in-place container operations can
/// reuse their storage.
fn merge_into(
    a: &mut RoaringBitmap,
    b: &Directory,
    keep_left: bool,
    keep_right: bool,
    both: impl Fn(Container, &Container) -> Container,
) {
    let (keys, containers) = core::mem::take(&mut a.directory).into_parts();
    let mut out = Directory::with_capacity(keys.len().max(b.len()));
    let mut j = 0;
    for (ka, container) in keys.into_iter().zip(containers) {
        while j < b.len() && b.key_at(j) < ka {
            if keep_right {
                out.append(b.key_at(j), b.container_at(j).clone());
            }
            j += 1;
        }
        if j < b.len() && b.key_at(j) == ka {
            out.append_non_empty(ka, both(container, b.container_at(j)));
            j += 1;
        } else if keep_left {
            out.append(ka, container);
        }
    }
    if keep_right {
        out.append_copies(b, j, b.len());
    }
    a.directory = out;
}

/// Calls `f` for every pair of containers sharing a key, stopping early when `f` returns
/// `false`. Returns whether every call returned `true`.
fn for_each_shared(
    a: &Directory,
    b: &Directory,
    mut f: impl FnMut(&Container, &Container) -> bool,
) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (ka, kb) = (a.key_at(i), b.key_at(j));
        match ka.cmp(&kb) {
            Ordering::Less => i = a.advance_until(kb, i),
            Ordering::Greater => j = b.advance_until(ka, j),
            Ordering::Equal => {
                if !f(a.container_at(i), b.container_at(j)) {
                    return false;
                }
                i += 1;
                j += 1;
            }
        }
    }
    true
}

/// Returns the values present in both bitmaps.
pub fn and(a: &RoaringBitmap, b: &RoaringBitmap) -> RoaringBitmap {
    let mut out = Directory::with_capacity(a.directory.len().min(b.directory.len()));
    let (da, db) = (&a.directory, &b.directory);
    let (mut i, mut j) = (0, 0);
    while i < da.len() && j < db.len() {
        let (ka, kb) = (da.key_at(i), db.key_at(j));
        match ka.cmp(&kb) {
            Ordering::Less => i = da.advance_until(kb, i),
            Ordering::Greater => j = db.advance_until(ka, j),
            Ordering::Equal => {
                out.append_non_empty(ka, da.container_at(i).and(db.container_at(j)));
                i += 1;
                j += 1;
            }
        }
    }
    RoaringBitmap::from_directory(out)
}

/// Returns the values present in either bitmap.
pub fn or(a: &RoaringBitmap, b: &RoaringBitmap) -> RoaringBitmap {
    RoaringBitmap::from_directory(merge(&a.directory, &b.directory, true, true, Container::or))
}

/// Returns the values present in exactly one bitmap.
pub fn xor(a: &RoaringBitmap, b: &RoaringBitmap) -> RoaringBitmap {
    RoaringBitmap::from_directory(merge(&a.directory, &b.directory, true, true, Container::xor))
}

/// Returns the values of `a` absent from `b`.
pub fn and_not(a: &RoaringBitmap, b: &RoaringBitmap) -> RoaringBitmap {
    RoaringBitmap::from_directory(merge(
        &a.directory,
        &b.directory,
        true,
        false,
        Container::and_not,
    ))
}

/// Returns `a | ([0, range_end) - b)`.
///
/// Values of `a` at or beyond `range_end` are kept. Keys absent from `b` contribute every value
/// of the range they cover.
pub fn or_not(a: &RoaringBitmap, b: &RoaringBitmap, range_end: u64) -> Result<RoaringBitmap, Error> {
    check_range(0, range_end)?;
    if range_end == 0 {
        return Ok(a.clone());
    }
    let (da, db) = (&a.directory, &b.directory);
    let last_key = ((range_end - 1) >> 16) as u32;
    let last_end = ((range_end - 1) & 0xFFFF) as u32 + 1;

    let mut out = Directory::with_capacity(last_key as usize + 1);
    let (mut i, mut j) = (0, 0);
    for key in 0..=last_key {
        let key = key as u16;
        let end = if key as u32 == last_key {
            last_end
        } else {
            1 << 16
        };
        let left = (i < da.len() && da.key_at(i) == key).then(|| {
            i += 1;
            da.container_at(i - 1)
        });
        let right = (j < db.len() && db.key_at(j) == key).then(|| {
            j += 1;
            db.container_at(j - 1)
        });
        let container = match (left, right) {
            (Some(l), Some(r)) => l.or_not(r, end),
            (Some(l), None) => l.or(&Container::range_of_ones(0, end)),
            (None, Some(r)) => Container::range_of_ones(0, end).and_not(r),
            (None, None) => Container::range_of_ones(0, end),
        };
        out.append_non_empty(key, container);
    }
    out.append_copies(da, i, da.len());
    Ok(RoaringBitmap::from_directory(out))
}

/// Returns `|a & b|` without materializing the intersection.
pub fn and_len(a: &RoaringBitmap, b: &RoaringBitmap) -> u64 {
    let mut len = 0;
    for_each_shared(&a.directory, &b.directory, |x, y| {
        len += x.and_len(y) as u64;
        true
    });
    len
}

/// Returns `|a | b|` without materializing the union.
pub fn or_len(a: &RoaringBitmap, b: &RoaringBitmap) -> u64 {
    a.len() + b.len() - and_len(a, b)
}

/// Returns `|a ^ b|` without materializing the symmetric difference.
pub fn xor_len(a: &RoaringBitmap, b: &RoaringBitmap) -> u64 {
    a.len() + b.len() - 2 * and_len(a, b)
}

/// Returns `|a - b|` without materializing the difference.
pub fn and_not_len(a: &RoaringBitmap, b: &RoaringBitmap) -> u64 {
    a.len() - and_len(a, b)
}

/// Returns whether the bitmaps share any value.
pub fn intersects(a: &RoaringBitmap, b: &RoaringBitmap) -> bool {
    !for_each_shared(&a.directory, &b.directory, |x, y| !x.intersects(y))
}

/// Returns whether every value of `a` is in `b`.
pub fn is_subset(a: &RoaringBitmap, b: &RoaringBitmap) -> bool {
    let (da, db) = (&a.directory, &b.directory);
    if da.len() > db.len() {
        return false;
    }
    let mut j = 0;
    for (key, container) in da.iter() {
        j = db.advance_until(key, j);
        if j == db.len() || db.key_at(j) != key || !container.is_subset(db.container_at(j)) {
            return false;
        }
        j += 1;
    }
    true
}

/// Keeps only the values of `a` also in `b`.
pub fn and_assign(a: &mut RoaringBitmap, b: &RoaringBitmap) {
    merge_into(a, &b.directory, false, false, Container::iand);
}

/// Adds every value of `b` to `a`.
pub fn or_assign(a: &mut RoaringBitmap, b: &RoaringBitmap) {
    merge_into(a, &b.directory, true, true, Container::ior);
}

/// Toggles every value of `b` in `a`.
pub fn xor_assign(a: &mut RoaringBitmap, b: &RoaringBitmap) {
    merge_into(a, &b.directory, true, true, Container::ixor);
}

/// Removes every value of `b` from `a`.
pub fn and_not_assign(a: &mut RoaringBitmap, b: &RoaringBitmap) {
    merge_into(a, &b.directory, true, false, Container::iand_not);
}

impl RoaringBitmap {
    /// Returns `self | ([0, range_end) - other)`. See [`or_not`].
    pub fn or_not(&self, other: &Self, range_end: u64) -> Result<Self, Error> {
        or_not(self, other, range_end)
    }

    /// Returns `|self & other|`.
    pub fn and_len(&self, other: &Self) -> u64 {
        and_len(self, other)
    }

    /// Returns `|self | other|`.
    pub fn or_len(&self, other: &Self) -> u64 {
        or_len(self, other)
    }

    /// Returns `|self ^ other|`.
    pub fn xor_len(&self, other: &Self) -> u64 {
        xor_len(self, other)
    }

    /// Returns `|self - other|`.
    pub fn and_not_len(&self, other: &Self) -> u64 {
        and_not_len(self, other)
    }

    /// Returns whether the bitmaps share any value.
    pub fn intersects(&self, other: &Self) -> bool {
        intersects(self, other)
    }

    /// Returns whether every value of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        is_subset(self, other)
    }
}

macro_rules! impl_operator {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:ident, $op_assign:ident) => {
        impl $trait<&RoaringBitmap> for &RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(self, rhs: &RoaringBitmap) -> RoaringBitmap {
                $op(self, rhs)
            }
        }

        impl $trait<RoaringBitmap> for &RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(self, rhs: RoaringBitmap) -> RoaringBitmap {
                $op(self, &rhs)
            }
        }

        impl $trait<&RoaringBitmap> for RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(mut self, rhs: &RoaringBitmap) -> RoaringBitmap {
                $op_assign(&mut self, rhs);
                self
            }
        }

        impl $trait<RoaringBitmap> for RoaringBitmap {
            type Output = RoaringBitmap;

            fn $method(mut self, rhs: RoaringBitmap) -> RoaringBitmap {
                $op_assign(&mut self, &rhs);
                self
            }
        }

        impl $assign_trait<&RoaringBitmap> for RoaringBitmap {
            fn $assign_method(&mut self, rhs: &RoaringBitmap) {
                $op_assign(self, rhs);
            }
        }

        impl $assign_trait<RoaringBitmap> for RoaringBitmap {
            fn $assign_method(&mut self, rhs: RoaringBitmap) {
                $op_assign(self, &rhs);
            }
        }
    };
}

impl_operator!(BitAnd, bitand, BitAndAssign, bitand_assign, and, and_assign);
impl_operator!(BitOr, bitor, BitOrAssign, bitor_assign, or, or_assign);
impl_operator!(BitXor, bitxor, BitXorAssign, bitxor_assign, xor, xor_assign);
impl_operator!(Sub, sub, SubAssign, sub_assign, and_not, and_not_assign);
