//! Human-readable error descriptions and structured JSON error formatting.

use crate::script::ScriptError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use dispenser_core::error::{BuildError, DispenserError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingInput => {
                "What happened: No button input was wired into the controller.\nLikely causes: The edge channel was not created or not passed to the builder.\nHow to fix: Create it with edge_channel(...) and pass the ButtonInput via with_input(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/dispenser.toml for a sample."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DispenserError>() {
        return match de {
            DispenserError::Store(m) => format!(
                "What happened: The calibration store could not be read or written ({m}).\nLikely causes: Missing permissions on store.path or a corrupted calibration file.\nHow to fix: Check store.path in the config; delete the file to recalibrate from scratch."
            ),
            DispenserError::HardwareFault(m) => format!(
                "What happened: GPIO fault ({m}).\nLikely causes: Wrong pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process can access /dev/gpiomem."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScriptError>() {
        return format!(
            "What happened: {se}.\nLikely causes: A typo in the button script on stdin.\nHow to fix: Use one command per line: short, long, hold <ms>, press, release, wait <ms>, quit."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path.\nHow to fix: Pass --config <FILE> pointing at a TOML file. Original: {msg}"
        );
    }

    if lower.contains("parse config") || (lower.contains("pins") && lower.contains("missing")) {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [pins] (button, motor_step, motor_dir) or a TOML syntax error.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    if lower.contains(" must ") {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!("Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}")
}

/// Stable exit codes: 2 config, 3 store, 4 hardware, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use dispenser_core::error::{BuildError, DispenserError};
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if let Some(de) = err.downcast_ref::<DispenserError>() {
        return match de {
            DispenserError::Store(_) => 3,
            DispenserError::Hardware(_) | DispenserError::HardwareFault(_) | DispenserError::Io(_) => 4,
        };
    }
    let msg = format!("{err:#}").to_ascii_lowercase();
    if msg.contains("config") || msg.contains(" must ") {
        return 2;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    use dispenser_core::error::{BuildError, DispenserError};
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<DispenserError>() {
        Some(DispenserError::Store(_)) => "Store",
        Some(DispenserError::Hardware(_) | DispenserError::HardwareFault(_)) => "Hardware",
        Some(DispenserError::Io(_)) => "Io",
        None if err.downcast_ref::<ScriptError>().is_some() => "Script",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
