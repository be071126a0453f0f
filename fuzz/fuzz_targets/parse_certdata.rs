#![no_main]

use libfuzzer_sys::fuzz_target;
use rootprops_lib::parse_certdata;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(store) = parse_certdata(text) {
        let _ = store.server_auth_count();
        let _ = store.to_json_pretty();
    }
});
