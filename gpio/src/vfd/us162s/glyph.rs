//! Custom glyph bitmaps.
//!
//! Glyphs are described the way HD44780 CGRAM characters are: eight bytes, one per pixel row from
//! top to bottom, with the five pixels of the row in the low five bits (bit 4 is the leftmost pixel).
//!
//! The display wants the same bitmap column by column instead: five bytes, leftmost column first,
//! where bit `n` of a column byte is the pixel in row `n` (the top row is the least significant bit).

/// Pixel rows of a glyph.
pub const GLYPH_ROWS: usize = 8;
/// Pixel columns of a glyph, which is also the width of a character cell.
pub const GLYPH_COLUMNS: usize = 5;

/// Mask of the row bits that carry pixels.
pub const ROW_MASK: u8 = (1 << GLYPH_COLUMNS) - 1;

/// Transposes a row-major glyph into the column-major layout the display loads.
///
/// Bits above bit 4 of each row are ignored.
pub fn rotate_glyph(rows: &[u8; GLYPH_ROWS]) -> [u8; GLYPH_COLUMNS] {
    let mut columns = [0u8; GLYPH_COLUMNS];
    for (n, column) in columns.iter_mut().enumerate() {
        let bit = GLYPH_COLUMNS - 1 - n;
        *column = rows
            .iter()
            .enumerate()
            .fold(0, |acc, (row, &pixels)| acc | (((pixels >> bit) & 1) << row));
    }
    columns
}

/// Inverse of [rotate_glyph].
pub fn unrotate_glyph(columns: &[u8; GLYPH_COLUMNS]) -> [u8; GLYPH_ROWS] {
    let mut rows = [0u8; GLYPH_ROWS];
    for (row, pixels) in rows.iter_mut().enumerate() {
        *pixels = columns
            .iter()
            .enumerate()
            .fold(0, |acc, (n, &column)| {
                acc | (((column >> row) & 1) << (GLYPH_COLUMNS - 1 - n))
            });
    }
    rows
}
