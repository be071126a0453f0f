#![no_main]

use libfuzzer_sys::fuzz_target;
use rootprops_lib::{analyze, display_report, RootStore};

fuzz_target!(|data: &[u8]| {
    if let Ok(store) = RootStore::from_json(data) {
        let stats = analyze(&store);
        // The counters must add up for every store that loads.
        assert!(stats.is_consistent());
        let _ = display_report(&stats, "fuzz");
    }
});
