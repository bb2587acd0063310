#![no_main]

use arbitrary::Arbitrary;
use commonware_codec::{Decode, Encode};
use commonware_roaring::{codec::MAX_CONTAINERS, RoaringBitmap, SuccinctRank};
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeSet;

/// Longest range applied in one operation, so the model stays small.
const MAX_RANGE: u32 = 1 << 14;

#[derive(Arbitrary, Debug)]
enum Operation {
    Add(u32),
    Remove(u32),
    Flip(u32),
    AddRange(u32, u32),
    RemoveRange(u32, u32),
    FlipRange(u32, u32),
    RunOptimize,
    RemoveRunCompression,
    And(Vec<u32>),
    Or(Vec<u32>),
    Xor(Vec<u32>),
    AndNot(Vec<u32>),
    OrNot(Vec<u32>, u32),
    Rank(u32),
    Select(u32),
    NextValue(u32),
    PreviousValue(u32),
    NextAbsent(u32),
    PreviousAbsent(u32),
    RoundTrip,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    operations: Vec<Operation>,
}

/// Returns the half-open range starting at `start` with at most [`MAX_RANGE`] values.
fn range(start: u32, len: u32) -> (u64, u64) {
    let start = start as u64;
    let end = (start + (len % MAX_RANGE) as u64).min(1 << 32);
    (start, end)
}

fn fuzz(input: FuzzInput) {
    let mut bitmap = RoaringBitmap::new();
    let mut model = BTreeSet::new();
    for operation in input.operations {
        match operation {
            Operation::Add(value) => {
                assert_eq!(bitmap.check_add(value), model.insert(value));
            }
            Operation::Remove(value) => {
                assert_eq!(bitmap.check_remove(value), model.remove(&value));
            }
            Operation::Flip(value) => {
                bitmap.flip(value);
                if !model.remove(&value) {
                    model.insert(value);
                }
            }
            Operation::AddRange(start, len) => {
                let (start, end) = range(start, len);
                bitmap.add_range(start, end).unwrap();
                model.extend((start..end).map(|v| v as u32));
            }
            Operation::RemoveRange(start, len) => {
                let (start, end) = range(start, len);
                bitmap.remove_range(start, end).unwrap();
                for value in start..end {
                    model.remove(&(value as u32));
                }
            }
            Operation::FlipRange(start, len) => {
                let (start, end) = range(start, len);
                bitmap.flip_range(start, end).unwrap();
                for value in (start..end).map(|v| v as u32) {
                    if !model.remove(&value) {
                        model.insert(value);
                    }
                }
            }
            Operation::RunOptimize => {
                bitmap.run_optimize();
            }
            Operation::RemoveRunCompression => {
                bitmap.remove_run_compression();
            }
            Operation::And(values) => {
                let other: RoaringBitmap = values.iter().copied().collect();
                let other_model: BTreeSet<u32> = values.into_iter().collect();
                assert_eq!(bitmap.and_len(&other), (&model & &other_model).len() as u64);
                bitmap &= &other;
                model = &model & &other_model;
            }
            Operation::Or(values) => {
                let other: RoaringBitmap = values.iter().copied().collect();
                assert_eq!(bitmap.or_len(&other), {
                    let union: BTreeSet<u32> = model.iter().chain(values.iter()).copied().collect();
                    union.len() as u64
                });
                bitmap |= &other;
                model.extend(values);
            }
            Operation::Xor(values) => {
                let other: RoaringBitmap = values.iter().copied().collect();
                let other_model: BTreeSet<u32> = values.into_iter().collect();
                assert_eq!(bitmap.xor_len(&other), (&model ^ &other_model).len() as u64);
                bitmap = &bitmap ^ &other;
                model = &model ^ &other_model;
            }
            Operation::AndNot(values) => {
                let other: RoaringBitmap = values.iter().copied().collect();
                let other_model: BTreeSet<u32> = values.into_iter().collect();
                bitmap -= &other;
                model = &model - &other_model;
            }
            Operation::OrNot(values, end) => {
                let end = end % MAX_RANGE;
                let other: RoaringBitmap = values.iter().copied().collect();
                bitmap = bitmap.or_not(&other, end as u64).unwrap();
                model.extend((0..end).filter(|v| !other.contains(*v)));
            }
            Operation::Rank(value) => {
                let expected = model.range(..=value).count() as u64;
                assert_eq!(bitmap.rank(value), expected);
                assert_eq!(SuccinctRank::build(&bitmap).rank(value), expected);
            }
            Operation::Select(index) => {
                let index = index as u64;
                match model.iter().nth(index as usize) {
                    Some(&value) => assert_eq!(bitmap.select(index), Ok(value)),
                    None => assert!(bitmap.select(index).is_err()),
                }
            }
            Operation::NextValue(value) => {
                assert_eq!(bitmap.next_value(value), model.range(value..).next().copied());
            }
            Operation::PreviousValue(value) => {
                assert_eq!(
                    bitmap.previous_value(value),
                    model.range(..=value).next_back().copied()
                );
            }
            Operation::NextAbsent(value) => {
                let expected = (value..=u32::MAX).find(|v| !model.contains(v));
                assert_eq!(bitmap.next_absent_value(value), expected);
            }
            Operation::PreviousAbsent(value) => {
                let expected = (0..=value).rev().find(|v| !model.contains(v));
                assert_eq!(bitmap.previous_absent_value(value), expected);
            }
            Operation::RoundTrip => {
                let decoded =
                    RoaringBitmap::decode_cfg(bitmap.encode(), &MAX_CONTAINERS).unwrap();
                assert_eq!(decoded, bitmap);
            }
        }
        assert!(bitmap.validate());
        assert_eq!(bitmap.len(), model.len() as u64);
    }
    assert!(bitmap.iter().eq(model.iter().copied()));
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
