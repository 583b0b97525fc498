//! Per-state screens. Each function draws the static part of one screen or
//! updates its single dynamic field.

use dispenser_traits::{BoxError, Display};

use crate::{center_text, clear_row, print_line, render_progress_bar};

pub fn idle<D: Display + ?Sized>(d: &mut D, revolutions_per_ml: Option<f32>) -> Result<(), BoxError> {
    center_text(d, "Idle", 0)?;
    let cal = match revolutions_per_ml {
        Some(v) => format!("Cal: {v:.2}"),
        None => "Cal: none".to_string(),
    };
    print_line(d, &cal, 1)
}

pub fn calibration_menu<D: Display + ?Sized>(d: &mut D) -> Result<(), BoxError> {
    center_text(d, "Press: Calib", 0)?;
    center_text(d, "Hold: Purge", 1)
}

pub fn calibration_sweep<D: Display + ?Sized>(d: &mut D) -> Result<(), BoxError> {
    center_text(d, "CALIBRATION", 0)?;
    render_progress_bar(d, 0, 1)
}

pub fn sweep_progress<D: Display + ?Sized>(d: &mut D, percent: u8) -> Result<(), BoxError> {
    render_progress_bar(d, percent, 1)
}

pub fn volume_prompt<D: Display + ?Sized>(d: &mut D) -> Result<(), BoxError> {
    d.clear()?;
    d.set_cursor(0, 0)?;
    d.print("Set liquid vol.")
}

pub fn volume_reading<D: Display + ?Sized>(d: &mut D, ml: u8) -> Result<(), BoxError> {
    print_line(d, &format!("{ml} ml"), 1)
}

pub fn purge_prompt<D: Display + ?Sized>(d: &mut D) -> Result<(), BoxError> {
    center_text(d, "Hold purge", 0)?;
    clear_row(d, 1)
}

pub fn purge_active<D: Display + ?Sized>(d: &mut D) -> Result<(), BoxError> {
    clear_row(d, 0)?;
    center_text(d, "Purging..", 0)
}

pub fn running<D: Display + ?Sized>(d: &mut D) -> Result<(), BoxError> {
    center_text(d, "Run", 0)
}

/// Dispensed volume in tenths of a milliliter, or `None` when no calibration exists.
pub fn dispensed<D: Display + ?Sized>(d: &mut D, tenths_ml: Option<u32>) -> Result<(), BoxError> {
    let text = match tenths_ml {
        Some(t) => format!("{}.{} ml", t / 10, t % 10),
        None => "uncalibrated".to_string(),
    };
    print_line(d, &text, 1)
}
