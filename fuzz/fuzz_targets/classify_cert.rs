#![no_main]

use libfuzzer_sys::fuzz_target;
use rootprops_lib::{classify_der, KeyClass};

fuzz_target!(|data: &[u8]| {
    // Classification must never panic, regardless of input.
    if let Ok(class) = classify_der(data) {
        let _ = class.to_string();
        let _ = class.algorithm();
        if let KeyClass::Ecdsa { curve } = &class {
            let _ = curve.name();
        }
    }
});
