#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Any JSON (or non-JSON) input must come back as entries, queued
    // per-entry errors, or a load error; never a panic.
    if let Ok(mut set) = colorimeter_config::CalibrationSet::from_json(data) {
        for name in set.names().map(str::to_string).collect::<Vec<_>>() {
            if let Some(entry) = set.get(&name) {
                let _ = entry.apply(0.5);
            }
        }
        while set.pop_error().is_some() {}
    }
});
