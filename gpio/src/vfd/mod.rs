//! Vacuum fluorescent display modules.

pub mod us162s;
