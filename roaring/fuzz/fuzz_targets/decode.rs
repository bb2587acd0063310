#![no_main]

use commonware_codec::{Decode, Encode, EncodeSize};
use commonware_roaring::{codec::MAX_CONTAINERS, RoaringBitmap};
use libfuzzer_sys::fuzz_target;

fn fuzz(data: &[u8]) {
    let Ok(bitmap) = RoaringBitmap::decode_cfg(data, &MAX_CONTAINERS) else {
        return;
    };
    assert!(bitmap.validate());
    assert_eq!(bitmap.encode_size(), bitmap.encode().len());
    let decoded = RoaringBitmap::decode_cfg(bitmap.encode(), &MAX_CONTAINERS).unwrap();
    assert_eq!(decoded, bitmap);
}

fuzz_target!(|data: &[u8]| {
    fuzz(data);
});
