//! Futaba US162S-family character VFD module.
//!
//! The module is driven over a write-only synchronous serial link: a clock line, a data line and an
//! optional reset line. See [driver::US162SDriver] for the command set and
//! [driver::GpioUS162SDriver] for the bit-banged implementation.

pub mod driver;
pub mod glyph;
