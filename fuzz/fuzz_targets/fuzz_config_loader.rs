#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // TOML parsing plus validation must reject bad input without panicking.
    let parsed = toml::from_str::<colorimeter_config::Config>(data);
    if let Ok(cfg) = parsed {
        let _ = cfg.validate();
        let _ = cfg.precision();
        let _ = cfg.gain_setting();
    }
});
