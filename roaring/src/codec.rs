//! Portable serialization format.
//!
//! All integers are little-endian.
//!
//! ```text
//! +---------------------------------------------------------------+
//! | cookie (u32)                                                  |
//! |   12346: no run containers, followed by the container count   |
//! |   12347: low 16 bits, with (count - 1) in the high 16 bits    |
//! +---------------------------------------------------------------+
//! | run flags: ceil(count / 8) bytes, only with cookie 12347      |
//! +---------------------------------------------------------------+
//! | per container: key (u16), cardinality - 1 (u16)               |
//! +---------------------------------------------------------------+
//! | per container: payload offset (u32)                           |
//! |   omitted when run containers are present and count < 4       |
//! +---------------------------------------------------------------+
//! | payloads                                                      |
//! |   array:  cardinality x u16                                   |
//! |   bitmap: 1024 x u64                                          |
//! |   run:    run count (u16), then (start, length - 1) x u16     |
//! +---------------------------------------------------------------+
//! ```
//!
//! A container that is not flagged as a run is a bitmap when its cardinality exceeds 4096 and
//! an array otherwise.

use crate::{
    bitmap::RoaringBitmap,
    container::{
        bitmap::WORDS,
        policy::{ARRAY_MAX_CARDINALITY, CONTAINER_CAPACITY},
        Array, Bitmap, Container, Kind, Run,
    },
    directory::Directory,
};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error as CodecError, Read, Write};

/// Cookie of a bitmap containing at least one run container.
pub const SERIAL_COOKIE: u32 = 12347;

/// Cookie of a bitmap without run containers.
pub const SERIAL_COOKIE_NO_RUNCONTAINER: u32 = 12346;

/// Below this many containers, bitmaps with run containers omit the offsets table.
pub const NO_OFFSET_THRESHOLD: usize = 4;

/// Largest number of containers any bitmap can hold.
pub const MAX_CONTAINERS: usize = 1 << 16;

/// Fails unless `buf` holds at least `len` more bytes.
#[inline]
fn at_least(buf: &impl Buf, len: usize) -> Result<(), CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::EndOfBuffer);
    }
    Ok(())
}

/// Returns whether the offsets table is written.
#[inline]
const fn has_offsets(has_run: bool, count: usize) -> bool {
    !has_run || count >= NO_OFFSET_THRESHOLD
}

/// Returns the number of bytes preceding the first payload.
fn header_size(has_run: bool, count: usize) -> usize {
    let prefix = if has_run { 4 + count.div_ceil(8) } else { 8 };
    let offsets = if has_offsets(has_run, count) { 4 * count } else { 0 };
    prefix + 4 * count + offsets
}

impl RoaringBitmap {
    /// Writes the bitmap in the portable format.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        self.write(buf);
    }

    /// Returns the number of bytes [`Self::serialize`] writes.
    pub fn serialized_size_in_bytes(&self) -> usize {
        header_size(self.has_run_compression(), self.directory.len())
            + self
                .directory
                .containers()
                .iter()
                .map(Container::serialized_size)
                .sum::<usize>()
    }

    /// Reads a bitmap in the portable format, accepting any number of containers.
    pub fn deserialize(buf: &mut impl Buf) -> Result<Self, CodecError> {
        Self::read_cfg(buf, &MAX_CONTAINERS)
    }
}

impl Write for RoaringBitmap {
    fn write(&self, buf: &mut impl BufMut) {
        let directory = &self.directory;
        let count = directory.len();
        let has_run = self.has_run_compression();
        if has_run {
            buf.put_u32_le(SERIAL_COOKIE | (((count - 1) as u32) << 16));
            let mut flags = vec![0u8; count.div_ceil(8)];
            for (i, container) in directory.containers().iter().enumerate() {
                if container.kind() == Kind::Run {
                    flags[i / 8] |= 1 << (i % 8);
                }
            }
            buf.put_slice(&flags);
        } else {
            buf.put_u32_le(SERIAL_COOKIE_NO_RUNCONTAINER);
            buf.put_u32_le(count as u32);
        }

        for (key, container) in directory.iter() {
            buf.put_u16_le(key);
            buf.put_u16_le((container.len() - 1) as u16);
        }

        if has_offsets(has_run, count) {
            let mut offset = header_size(has_run, count) as u32;
            for container in directory.containers() {
                buf.put_u32_le(offset);
                offset += container.serialized_size() as u32;
            }
        }

        for container in directory.containers() {
            match container {
                Container::Array(array) => {
                    for value in array.iter() {
                        buf.put_u16_le(value);
                    }
                }
                Container::Bitmap(bitmap) => {
                    for &word in bitmap.words() {
                        buf.put_u64_le(word);
                    }
                }
                Container::Run(run) => {
                    buf.put_u16_le(run.run_count() as u16);
                    for &(start, end) in run.runs() {
                        buf.put_u16_le(start);
                        buf.put_u16_le(end - start);
                    }
                }
            }
        }
    }
}

impl EncodeSize for RoaringBitmap {
    fn encode_size(&self) -> usize {
        self.serialized_size_in_bytes()
    }
}

fn read_array(buf: &mut impl Buf, len: usize) -> Result<Container, CodecError> {
    at_least(buf, 2 * len)?;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        let value = buf.get_u16_le();
        if values.last().is_some_and(|&last| last >= value) {
            return Err(CodecError::Invalid(
                "Array",
                "values must be strictly increasing",
            ));
        }
        values.push(value);
    }
    Ok(Container::Array(Array::from_sorted_vec(values)))
}

fn read_bitmap(buf: &mut impl Buf, len: u32) -> Result<Container, CodecError> {
    at_least(buf, 8 * WORDS)?;
    let mut words = [0u64; WORDS];
    for word in words.iter_mut() {
        *word = buf.get_u64_le();
    }
    let bitmap = Bitmap::from_words(words);
    if bitmap.len() != len {
        return Err(CodecError::Invalid(
            "Bitmap",
            "cardinality does not match popcount",
        ));
    }
    Ok(Container::Bitmap(Box::new(bitmap)))
}

fn read_run(buf: &mut impl Buf, len: u32) -> Result<Container, CodecError> {
    at_least(buf, 2)?;
    let count = buf.get_u16_le() as usize;
    if count == 0 {
        return Err(CodecError::Invalid("Run", "no runs"));
    }
    at_least(buf, 4 * count)?;
    let mut runs: Vec<(u16, u16)> = Vec::with_capacity(count);
    let mut total = 0u32;
    for _ in 0..count {
        let start = buf.get_u16_le() as u32;
        let end = start + buf.get_u16_le() as u32;
        if end >= CONTAINER_CAPACITY {
            return Err(CodecError::Invalid("Run", "run exceeds container"));
        }
        if runs
            .last()
            .is_some_and(|&(_, previous)| start <= previous as u32 + 1)
        {
            return Err(CodecError::Invalid(
                "Run",
                "runs must be sorted, disjoint and non-adjacent",
            ));
        }
        total += end - start + 1;
        runs.push((start as u16, end as u16));
    }
    if total != len {
        return Err(CodecError::Invalid(
            "Run",
            "run lengths do not sum to cardinality",
        ));
    }
    Ok(Container::Run(Run::from_sorted_runs(runs)))
}

impl Read for RoaringBitmap {
    /// Maximum number of containers accepted.
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, max_containers: &Self::Cfg) -> Result<Self, CodecError> {
        at_least(buf, 4)?;
        let cookie = buf.get_u32_le();
        let (has_run, count) = if cookie & 0xFFFF == SERIAL_COOKIE {
            (true, (cookie >> 16) as usize + 1)
        } else if cookie == SERIAL_COOKIE_NO_RUNCONTAINER {
            at_least(buf, 4)?;
            (false, buf.get_u32_le() as usize)
        } else {
            return Err(CodecError::Invalid("RoaringBitmap", "unknown cookie"));
        };
        if count > MAX_CONTAINERS || count > *max_containers {
            return Err(CodecError::InvalidLength(count));
        }

        let mut flags = Vec::new();
        if has_run {
            let len = count.div_ceil(8);
            at_least(buf, len)?;
            flags.resize(len, 0);
            buf.copy_to_slice(&mut flags);
        }
        let is_run = |i: usize| has_run && flags[i / 8] & (1 << (i % 8)) != 0;

        at_least(buf, 4 * count)?;
        let mut headers = Vec::with_capacity(count);
        for _ in 0..count {
            let key = buf.get_u16_le();
            let len = buf.get_u16_le() as u32 + 1;
            if headers.last().is_some_and(|&(last, _)| last >= key) {
                return Err(CodecError::Invalid(
                    "RoaringBitmap",
                    "keys must be strictly increasing",
                ));
            }
            headers.push((key, len));
        }

        if has_offsets(has_run, count) {
            at_least(buf, 4 * count)?;
            buf.advance(4 * count);
        }

        let mut directory = Directory::with_capacity(count);
        for (i, &(key, len)) in headers.iter().enumerate() {
            let container = if is_run(i) {
                read_run(buf, len)?
            } else if len > ARRAY_MAX_CARDINALITY {
                read_bitmap(buf, len)?
            } else {
                read_array(buf, len as usize)?
            };
            directory.append(key, container);
        }
        Ok(RoaringBitmap::from_directory(directory))
    }
}

#[cfg(feature = "arbitrary")]
impl arbitrary::Arbitrary<'_> for RoaringBitmap {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let mut bitmap = Self::new();
        for _ in 0..u.int_in_range(0..=64)? {
            let start = u.arbitrary::<u32>()? as u64;
            match u.int_in_range(0..=2)? {
                0 => bitmap.add(start as u32),
                1 => {
                    let end = (start + u.int_in_range(0..=10_000)?).min(1 << 32);
                    let _ = bitmap.add_range(start, end);
                }
                _ => {
                    let end = (start + u.int_in_range(0..=100)?).min(1 << 32);
                    let _ = bitmap.remove_range(start, end);
                }
            }
        }
        if u.arbitrary()? {
            bitmap.run_optimize();
        }
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{Decode, Encode};

    #[test]
    fn test_empty_layout() {
        let bitmap = RoaringBitmap::new();
        let encoded = bitmap.encode();
        assert_eq!(encoded.as_ref(), &[0x3A, 0x30, 0, 0, 0, 0, 0, 0]);
        assert_eq!(bitmap.serialized_size_in_bytes(), 8);
        let decoded = RoaringBitmap::decode_cfg(encoded, &MAX_CONTAINERS).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_array_layout() {
        let bitmap: RoaringBitmap = [1, 2, 3].into_iter().collect();
        let encoded = bitmap.encode();
        assert_eq!(
            encoded.as_ref(),
            &[
                0x3A, 0x30, 0, 0, // cookie
                1, 0, 0, 0, // count
                0, 0, 2, 0, // key 0, cardinality 3
                16, 0, 0, 0, // offset
                1, 0, 2, 0, 3, 0, // values
            ]
        );
        assert_eq!(bitmap.serialized_size_in_bytes(), encoded.len());
    }

    #[test]
    fn test_run_layout() {
        let bitmap = RoaringBitmap::from_range(0, 100).unwrap();
        assert!(bitmap.has_run_compression());
        let encoded = bitmap.encode();
        assert_eq!(
            encoded.as_ref(),
            &[
                0x3B, 0x30, 0, 0, // cookie, count 1
                1, // run flags
                0, 0, 99, 0, // key 0, cardinality 100
                1, 0, 0, 0, 99, 0, // one run of 100 from 0
            ]
        );
        let decoded = RoaringBitmap::decode_cfg(encoded, &MAX_CONTAINERS).unwrap();
        assert_eq!(decoded, bitmap);
        assert_eq!(decoded.container(0).map(Container::kind), Some(Kind::Run));
    }

    #[test]
    fn test_offsets_with_runs() {
        let mut bitmap = RoaringBitmap::new();
        for key in 0..4u64 {
            bitmap.add_range(key << 16, (key << 16) + 10).unwrap();
        }
        bitmap.add(5 << 16);
        let encoded = bitmap.encode();
        let count = 5;
        let header = 4 + 1 + 4 * count;
        let first_offset = u32::from_le_bytes(encoded[header..header + 4].try_into().unwrap());
        assert_eq!(first_offset as usize, header + 4 * count);
        assert_eq!(encoded.len(), bitmap.serialized_size_in_bytes());
        assert_eq!(bitmap.encode_size(), encoded.len());
    }

    #[test]
    fn test_round_trip_keeps_kinds() {
        let mut bitmap = RoaringBitmap::from_range(0, 70_000).unwrap();
        bitmap.add_range(200_000, 210_000).unwrap();
        bitmap.remove_run_compression();
        bitmap.add(1 << 30);
        let kinds: Vec<_> = bitmap.directory().containers().iter().map(Container::kind).collect();
        let decoded = RoaringBitmap::deserialize(&mut bitmap.encode()).unwrap();
        assert_eq!(decoded, bitmap);
        let decoded_kinds: Vec<_> =
            decoded.directory().containers().iter().map(Container::kind).collect();
        assert_eq!(kinds, decoded_kinds);
        assert!(decoded.validate());
    }

    #[test]
    fn test_container_limit() {
        let bitmap: RoaringBitmap = [0, 65_536, 131_072].into_iter().collect();
        let encoded = bitmap.encode();
        assert_eq!(
            RoaringBitmap::decode_cfg(encoded.clone(), &3).unwrap(),
            bitmap
        );
        assert!(matches!(
            RoaringBitmap::decode_cfg(encoded, &2),
            Err(CodecError::InvalidLength(3))
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut encoded = RoaringBitmap::new().encode().to_vec();
        encoded.push(0);
        assert!(matches!(
            RoaringBitmap::decode_cfg(encoded.as_slice(), &MAX_CONTAINERS),
            Err(CodecError::ExtraData(1))
        ));
    }
}
