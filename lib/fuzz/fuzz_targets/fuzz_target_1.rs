#![no_main]

use celltrack_rs::RoiFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // A parse failure is fine, a panic is not.
    let _ = RoiFile::parse(data);
});
