#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not. A config that
    // validates must also convert into the controller's runtime config.
    if let Ok(cfg) = toml::from_str::<dispenser_config::Config>(data)
        && cfg.validate().is_ok()
    {
        let _ = dispenser_core::ControllerCfg::from(&cfg);
    }
});
