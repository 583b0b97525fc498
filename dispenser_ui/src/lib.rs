#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Display presenter: stateless helpers that put text on the character display.
//!
//! Nothing here remembers what is on screen. Callers decide when to redraw;
//! these functions only decide where the characters go.

pub mod screens;

use dispenser_traits::{BoxError, Display};

/// Width of the 16x2 character module.
pub const LINE_WIDTH: u8 = 16;
/// Full-block glyph in the HD44780 A00 character ROM.
pub const FILLED_GLYPH: u8 = 0xFF;
/// Glyph used for the unfilled part of the progress bar.
pub const EMPTY_GLYPH: u8 = b'_';

/// Left padding that centers `text` on a line of `width` columns.
/// Text wider than the line starts at column 0; clipping is the display's business.
#[inline]
pub fn center_column(text: &str, width: u8) -> u8 {
    let len = text.chars().count();
    let width = usize::from(width);
    (width.saturating_sub(len) / 2) as u8
}

/// Write `text` centered on `row`.
pub fn center_text<D: Display + ?Sized>(display: &mut D, text: &str, row: u8) -> Result<(), BoxError> {
    let col = center_column(text, display.columns());
    display.set_cursor(col, row)?;
    display.print(text)
}

/// Number of filled cells for `percent` on a bar `width` cells wide.
/// Percent above 100 saturates; the result is floor(percent * width / 100).
#[inline]
pub fn filled_blocks(percent: u8, width: u8) -> u8 {
    let p = u16::from(percent.min(100));
    (p * u16::from(width) / 100) as u8
}

/// Draw a full-width progress bar on `row`.
pub fn render_progress_bar<D: Display + ?Sized>(
    display: &mut D,
    percent: u8,
    row: u8,
) -> Result<(), BoxError> {
    let width = display.columns();
    let filled = filled_blocks(percent, width);
    display.set_cursor(0, row)?;
    for _ in 0..filled {
        display.write_glyph(FILLED_GLYPH)?;
    }
    for _ in filled..width {
        display.write_glyph(EMPTY_GLYPH)?;
    }
    Ok(())
}

/// Overwrite `row` with spaces.
pub fn clear_row<D: Display + ?Sized>(display: &mut D, row: u8) -> Result<(), BoxError> {
    let blank = " ".repeat(usize::from(display.columns()));
    display.set_cursor(0, row)?;
    display.print(&blank)
}

/// Write `text` at column 0 of `row`, padding with spaces to the end of the line
/// so a shorter value fully replaces a longer one.
pub fn print_line<D: Display + ?Sized>(display: &mut D, text: &str, row: u8) -> Result<(), BoxError> {
    let width = usize::from(display.columns());
    let mut line: String = text.chars().take(width).collect();
    let pad = width.saturating_sub(line.chars().count());
    line.extend(std::iter::repeat_n(' ', pad));
    display.set_cursor(0, row)?;
    display.print(&line)
}
