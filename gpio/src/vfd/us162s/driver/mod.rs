//! US162S VFD driver module.
//!
//! See [US162SDriver] trait for the command set, and [GpioUS162SDriver] for the implementation
//! that bit-bangs the serial link over GPIO pins. The trait only needs a way to put one byte on the
//! wire, so other transports can reuse every command.

mod gpio;

use crate::GpioResult;
use crate::vfd::us162s::glyph::{rotate_glyph, GLYPH_ROWS};
use log::warn;
use std::fmt::Debug;
pub use gpio::*;

/// Number of user-definable character slots.
pub const CUSTOM_CHARACTER_COUNT: u8 = 8;

/// Offset added to character codes `0..CUSTOM_CHARACTER_COUNT` by [US162SDriver::write_char], so
/// text written for HD44780-style displays (custom glyphs at codes 0–7) shows the VFD's user
/// characters.
pub const CUSTOM_CHARACTER_TRANSLATE_OFFSET: u8 = 0xF8;

/// First printable character code. Everything below it is a command opcode on this display.
pub const FIRST_PRINTABLE: u8 = b' ';

/// The only I/O mode this driver speaks: clocked serial input, MSB first.
pub const IO_MODE_SERIAL: u8 = 0x00;

/// Command opcodes. Each is sent as a single byte, followed by its argument bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum Command {
    /// Set Flash Position (01h) - start and stop cell of a flashing range
    SetFlashPosition = 0x01,
    /// Flash Mode (02h) - enable or disable flashing
    FlashMode = 0x02,
    /// Set Flash Rate (03h) - flashing frequency
    SetFlashRate = 0x03,
    /// Set Brightness (04h) - display brightness, 0–255
    SetBrightness = 0x04,
    /// Select Font (05h) - built-in character set
    SelectFont = 0x05,
    /// Set Buffered Mode (06h) - buffer printed characters until flushed
    SetBufferedMode = 0x06,
    /// Print Message Buffer (07h) - flush buffered characters
    PrintMessageBuffer = 0x07,
    /// Set Cursor Mode (08h) - cursor movement after each character
    SetCursorMode = 0x08,
    /// Load User Character (09h) - slot followed by five column bytes
    LoadUserCharacter = 0x09,
    /// Set I/O Mode (0Ah) - host interface selection
    SetIoMode = 0x0A,
    /// Clear Display (0Bh) - blank every cell and home the cursor
    ClearDisplay = 0x0B,
    /// Set Cursor Position (10h) - 1-based cell address
    SetCursorPosition = 0x10,
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command as u8
    }
}

/// Character grid of the module.
///
/// Defaults to a single cell, which is what the driver assumes before [US162SDriver::init].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Geometry {
    pub columns: u8,
    pub rows: u8,
}

impl Geometry {
    pub fn new(columns: u8, rows: u8) -> Self {
        Geometry { columns, rows }
    }

    /// Total number of character cells.
    pub fn cells(&self) -> u16 {
        self.columns as u16 * self.rows as u16
    }

    /// Gets the 1-based device address of a cell.
    ///
    /// Cells outside the grid, and cells whose address doesn't fit in a byte, map to the home
    /// position (address `1`). On grids over 255 cells, plain 8-bit arithmetic would instead wrap
    /// index 255 to address `0` and later cells back to the start of the screen.
    pub fn address(&self, column: u8, row: u8) -> u8 {
        let index = row as u16 * self.columns as u16 + column as u16;
        if index >= self.cells() {
            return 1;
        }
        u8::try_from(index + 1).unwrap_or(1)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry::new(1, 1)
    }
}

/// Cursor movement applied after each printed character.
///
/// A change takes effect after the next character is printed; that character still goes to the
/// current position.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CursorMode {
    /// Moves right after each character (default).
    #[default]
    AutoIncrement,
    /// Moves left after each character.
    AutoDecrement,
    /// Stays on the same cell.
    NonIncrement,
}

impl CursorMode {
    pub fn to_byte(&self) -> u8 {
        match self {
            CursorMode::AutoIncrement => 0x01,
            CursorMode::AutoDecrement => 0x02,
            CursorMode::NonIncrement => 0x03,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FlashMode {
    Enabled,
    #[default]
    Disabled,
}

impl FlashMode {
    pub fn to_byte(&self) -> u8 {
        match self {
            FlashMode::Enabled => 0x02,
            FlashMode::Disabled => 0x01,
        }
    }
}

/// Flashing frequency.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FlashRate {
    /// 50 Hz. Too fast to see flashing, flashing cells just look half as bright.
    Hz50,
    /// 1 Hz (default)
    #[default]
    Hz1,
    /// 1/10 Hz
    TenthHz,
}

impl FlashRate {
    pub fn to_byte(&self) -> u8 {
        match self {
            FlashRate::Hz50 => 0x01,
            FlashRate::Hz1 => 0x30,
            FlashRate::TenthHz => 0xFF,
        }
    }
}

/// Built-in character set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Font {
    /// Western European (default)
    #[default]
    Western,
    /// Japanese [katakana](https://en.wikipedia.org/wiki/Katakana) in the upper half of the table.
    Katakana,
}

impl Font {
    pub fn to_byte(&self) -> u8 {
        match self {
            Font::Western => 0x01,
            Font::Katakana => 0x02,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BufferMode {
    /// Characters show up as soon as they're received (default).
    #[default]
    NonBuffered,
    /// Characters are collected until [US162SDriver::print_message_buffer].
    Buffered,
}

impl BufferMode {
    pub fn to_byte(&self) -> u8 {
        match self {
            BufferMode::NonBuffered => 0x01,
            BufferMode::Buffered => 0x02,
        }
    }
}

/// The `US162SDriver` trait defines the command set of the Futaba US162S VFD modules.
///
/// # Protocol
///
/// The link is write-only. Every command is an opcode byte (see [Command]) followed by zero or more
/// argument bytes; character codes from `0x20` up are printed at the cursor. The module never
/// acknowledges anything, so nothing here can detect a missing or misbehaving display, and the
/// driver keeps no copy of the display state (cursor, modes, buffer contents). The only errors are
/// the host's own GPIO failures.
///
/// Arguments are passed through or clamped rather than rejected: an out-of-range cursor position
/// goes home, an out-of-range glyph slot wraps, and control codes in text are dropped.
///
/// # Custom characters
///
/// The module has [CUSTOM_CHARACTER_COUNT] user-definable characters, loaded with
/// [US162SDriver::create_char] and printed with [US162SDriver::write_char] using codes
/// `0..CUSTOM_CHARACTER_COUNT`, the same codes HD44780 displays use for CGRAM characters.
pub trait US162SDriver: Debug {
    /// Sets the screen geometry and brings the module to a known state. This is to be implemented by
    /// the specific driver, see [GpioUS162SDriver::init].
    fn init(&mut self, columns: u8, rows: u8) -> GpioResult<()>;

    /// Gets the geometry set by the last [US162SDriver::init].
    fn geometry(&self) -> Geometry;

    /// Puts one raw byte on the wire, including the recovery time the module needs afterwards.
    fn send_byte(&mut self, byte: u8) -> GpioResult<()>;

    /// Sends an opcode followed by its arguments.
    fn send_command(&mut self, command: Command, args: &[u8]) -> GpioResult<()> {
        self.send_byte(command.into())?;
        for &arg in args {
            self.send_byte(arg)?;
        }
        Ok(())
    }

    /// Blanks the display and moves the cursor home.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(Command::ClearDisplay, &[])
    }

    /// Moves the cursor to `column`, `row` (both 0-based). Positions outside the screen move the
    /// cursor home instead.
    fn set_cursor(&mut self, column: u8, row: u8) -> GpioResult<()> {
        let address = self.geometry().address(column, row);
        self.send_command(Command::SetCursorPosition, &[address])
    }

    /// Moves the cursor to the top left cell.
    fn home(&mut self) -> GpioResult<()> {
        self.set_cursor(0, 0)
    }

    fn set_brightness(&mut self, level: u8) -> GpioResult<()> {
        self.send_command(Command::SetBrightness, &[level])
    }

    fn set_cursor_mode(&mut self, mode: CursorMode) -> GpioResult<()> {
        self.send_command(Command::SetCursorMode, &[mode.to_byte()])
    }

    /// Marks cells `start` to `stop` as flashing. Several ranges can be set with multiple calls, and
    /// they may overlap. The values are device addresses and are passed through unchanged.
    fn set_flash_positions(&mut self, start: u8, stop: u8) -> GpioResult<()> {
        self.send_command(Command::SetFlashPosition, &[start, stop])
    }

    fn set_flash_mode(&mut self, mode: FlashMode) -> GpioResult<()> {
        self.send_command(Command::FlashMode, &[mode.to_byte()])
    }

    fn set_flash_rate(&mut self, rate: FlashRate) -> GpioResult<()> {
        self.send_command(Command::SetFlashRate, &[rate.to_byte()])
    }

    fn select_font(&mut self, font: Font) -> GpioResult<()> {
        self.send_command(Command::SelectFont, &[font.to_byte()])
    }

    fn set_buffer_mode(&mut self, mode: BufferMode) -> GpioResult<()> {
        self.send_command(Command::SetBufferedMode, &[mode.to_byte()])
    }

    /// Shows everything written since buffered mode was entered. What happens in non-buffered mode
    /// is up to the module.
    fn print_message_buffer(&mut self) -> GpioResult<()> {
        self.send_command(Command::PrintMessageBuffer, &[])
    }

    /// Loads a glyph into user character slot `index`.
    ///
    /// `index` is wrapped into `0..CUSTOM_CHARACTER_COUNT`. `rows` holds one byte per pixel row, top
    /// to bottom, with the pixels in the low five bits; see [crate::vfd::us162s::glyph].
    fn create_char(&mut self, index: u8, rows: &[u8; GLYPH_ROWS]) -> GpioResult<()> {
        let slot = index & (CUSTOM_CHARACTER_COUNT - 1);
        self.send_command(Command::LoadUserCharacter, &[slot + 1])?;
        for column in rotate_glyph(rows) {
            self.send_byte(column)?;
        }
        Ok(())
    }

    /// Prints one character and returns the number of characters consumed.
    ///
    /// Codes `0..CUSTOM_CHARACTER_COUNT` print the user characters. The remaining codes below
    /// `0x20` are opcodes on this display, so they're dropped and `0` is returned.
    fn write_char(&mut self, code: u8) -> GpioResult<usize> {
        let code = if code < CUSTOM_CHARACTER_COUNT {
            code + CUSTOM_CHARACTER_TRANSLATE_OFFSET
        } else if code < FIRST_PRINTABLE {
            return Ok(0);
        } else {
            code
        };

        self.send_byte(code)?;
        Ok(1)
    }

    /// Prints a string at the cursor and returns the number of characters consumed.
    ///
    /// Non-ASCII characters are printed as `?`.
    fn print(&mut self, s: &str) -> GpioResult<usize> {
        let mut consumed = 0;
        for c in s.chars() {
            consumed += if c.is_ascii() {
                self.write_char(c as u8)?
            } else {
                warn!("Non-ASCII character: {}", c);
                self.write_char(b'?')?
            };
        }
        Ok(consumed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Collects sent bytes instead of clocking them out.
    #[derive(Debug, Default)]
    struct ByteSink {
        geometry: Geometry,
        sent: Vec<u8>,
    }

    impl US162SDriver for ByteSink {
        fn init(&mut self, columns: u8, rows: u8) -> GpioResult<()> {
            self.geometry = Geometry::new(columns, rows);
            Ok(())
        }

        fn geometry(&self) -> Geometry {
            self.geometry
        }

        fn send_byte(&mut self, byte: u8) -> GpioResult<()> {
            self.sent.push(byte);
            Ok(())
        }
    }

    fn sink(columns: u8, rows: u8) -> ByteSink {
        let mut sink = ByteSink::default();
        sink.init(columns, rows).unwrap();
        sink
    }

    #[test]
    fn cells_follow_geometry() {
        assert_eq!(Geometry::default().cells(), 1);
        assert_eq!(Geometry::new(16, 2).cells(), 32);
        assert_eq!(Geometry::new(255, 255).cells(), 65025);
    }

    #[test]
    fn addresses_past_a_byte_go_home() {
        let geometry = Geometry::new(16, 16);
        assert_eq!(geometry.address(14, 15), 255);
        assert_eq!(geometry.address(15, 15), 1);

        let mut vfd = sink(40, 8);
        vfd.set_cursor(15, 6).unwrap();
        assert_eq!(vfd.sent, vec![0x10, 1]);
    }

    #[test]
    fn single_byte_commands() {
        let mut vfd = sink(16, 2);
        vfd.clear_display().unwrap();
        vfd.print_message_buffer().unwrap();
        assert_eq!(vfd.sent, vec![0x0B, 0x07]);
    }

    #[test]
    fn home_is_first_cell() {
        let mut vfd = sink(16, 2);
        vfd.home().unwrap();
        assert_eq!(vfd.sent, vec![0x10, 1]);
    }

    #[test]
    fn mode_commands_send_fixed_arguments() {
        let mut vfd = sink(16, 2);
        vfd.set_cursor_mode(CursorMode::AutoIncrement).unwrap();
        vfd.set_cursor_mode(CursorMode::AutoDecrement).unwrap();
        vfd.set_cursor_mode(CursorMode::NonIncrement).unwrap();
        vfd.set_flash_mode(FlashMode::Enabled).unwrap();
        vfd.set_flash_mode(FlashMode::Disabled).unwrap();
        vfd.set_flash_rate(FlashRate::Hz50).unwrap();
        vfd.set_flash_rate(FlashRate::Hz1).unwrap();
        vfd.set_flash_rate(FlashRate::TenthHz).unwrap();
        vfd.select_font(Font::Western).unwrap();
        vfd.select_font(Font::Katakana).unwrap();
        vfd.set_buffer_mode(BufferMode::Buffered).unwrap();
        vfd.set_buffer_mode(BufferMode::NonBuffered).unwrap();

        assert_eq!(
            vfd.sent,
            vec![
                0x08, 0x01, 0x08, 0x02, 0x08, 0x03, //
                0x02, 0x02, 0x02, 0x01, //
                0x03, 0x01, 0x03, 0x30, 0x03, 0xFF, //
                0x05, 0x01, 0x05, 0x02, //
                0x06, 0x02, 0x06, 0x01,
            ]
        );
    }

    #[test]
    fn brightness_and_flash_positions_pass_through() {
        let mut vfd = sink(16, 2);
        vfd.set_brightness(0).unwrap();
        vfd.set_brightness(255).unwrap();
        vfd.set_flash_positions(40, 3).unwrap();
        assert_eq!(vfd.sent, vec![0x04, 0, 0x04, 255, 0x01, 40, 3]);
    }

    #[test]
    fn create_char_wraps_slot_and_sends_columns() {
        let mut vfd = sink(16, 2);
        let bar = [0b10000; GLYPH_ROWS];
        vfd.create_char(9, &bar).unwrap();
        assert_eq!(vfd.sent, vec![0x09, 2, 0xFF, 0, 0, 0, 0]);
    }

    #[test]
    fn print_counts_consumed_characters() {
        let mut vfd = sink(16, 2);
        let consumed = vfd.print("a\nb\u{1}é").unwrap();
        assert_eq!(consumed, 4);
        assert_eq!(vfd.sent, vec![b'a', b'b', 0xF9, b'?']);
    }

    proptest! {
        #[test]
        fn cursor_address_is_one_based_or_home(
            columns in 1u8..=40,
            rows in 1u8..=4,
            column in any::<u8>(),
            row in any::<u8>(),
        ) {
            let mut vfd = sink(columns, rows);
            vfd.set_cursor(column, row).unwrap();

            let index = row as u16 * columns as u16 + column as u16;
            let expected = if index < columns as u16 * rows as u16 { index as u8 + 1 } else { 1 };
            prop_assert_eq!(vfd.sent, vec![0x10, expected]);
        }

        #[test]
        fn text_remapping(code in any::<u8>()) {
            let mut vfd = sink(16, 2);
            let consumed = vfd.write_char(code).unwrap();

            if code < CUSTOM_CHARACTER_COUNT {
                prop_assert_eq!(consumed, 1);
                prop_assert_eq!(vfd.sent, vec![code + CUSTOM_CHARACTER_TRANSLATE_OFFSET]);
            } else if code < 0x20 {
                prop_assert_eq!(consumed, 0);
                prop_assert!(vfd.sent.is_empty());
            } else {
                prop_assert_eq!(consumed, 1);
                prop_assert_eq!(vfd.sent, vec![code]);
            }
        }
    }
}
