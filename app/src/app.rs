//! The module for the sign state and drawing logic.

use std::time::Duration;
use log::{debug, info};
use time::OffsetDateTime;
use time::macros::format_description;
use futavfd_gpio::GpioResult;
use futavfd_gpio::vfd::us162s::driver::{BufferMode, CursorMode, FlashMode, US162SDriver};
use crate::config::Config;
use crate::utils::{fit_line, Placeholders};

/// The main app state struct.
pub struct App<'a> {
    /// The configuration for the app.
    config: Config,
    /// The VFD driver for the app.
    vfd: &'a mut dyn US162SDriver,
    /// Messages with placeholders already expanded.
    messages: Vec<String>,
    /// Index of the message on screen.
    message_index: usize,
    /// Time the current message has been on screen.
    shown_for: Duration,
    /// Last clock text drawn, to skip redundant redraws.
    last_clock: Option<String>,
}

impl<'a> App<'a> {
    /// Creates a new instance of the App.
    pub fn new(config: Config, vfd: &'a mut dyn US162SDriver, placeholders: &Placeholders) -> App<'a> {
        let messages = config.messages.iter().map(|m| placeholders.expand(m)).collect();
        App {
            config,
            vfd,
            messages,
            message_index: 0,
            shown_for: Duration::ZERO,
            last_clock: None,
        }
    }

    /// Initializes the display, applies every setting from the config and draws the first message.
    ///
    /// Every mode is set explicitly, since without a reset pin a previous run may have left the
    /// module in any of them. Lines are drawn left to right, so the cursor always auto-increments.
    pub fn start(&mut self) -> GpioResult<()> {
        self.vfd.init(self.config.columns, self.config.rows)?;

        self.vfd.set_brightness(self.config.brightness)?;
        self.vfd.select_font(self.config.font.into())?;
        self.vfd.set_cursor_mode(CursorMode::AutoIncrement)?;

        match self.config.flash {
            Some(flash) => {
                self.vfd.set_flash_positions(flash.start, flash.stop)?;
                self.vfd.set_flash_rate(flash.rate.into())?;
                self.vfd.set_flash_mode(FlashMode::Enabled)?;
            }
            None => self.vfd.set_flash_mode(FlashMode::Disabled)?,
        }

        for custom_char in &self.config.custom_chars {
            debug!("Loading custom character {}", custom_char.slot);
            self.vfd.create_char(custom_char.slot, &custom_char.rows)?;
        }

        self.vfd.set_buffer_mode(if self.config.buffered {
            BufferMode::Buffered
        } else {
            BufferMode::NonBuffered
        })?;

        info!("Display initialized, {} message(s).", self.messages.len());
        self.draw_message()?;
        self.flush()
    }

    /// Advances the app by `elapsed` and redraws what changed. `now` is the time shown by the clock.
    pub fn update(&mut self, elapsed: Duration, now: OffsetDateTime) -> GpioResult<()> {
        let mut dirty = false;

        self.shown_for += elapsed;
        let message_time = Duration::from_secs(self.config.message_seconds.max(1) as u64);
        if self.messages.len() > 1 && self.shown_for >= message_time {
            self.shown_for = Duration::ZERO;
            self.message_index = (self.message_index + 1) % self.messages.len();
            debug!("Switching to message {}", self.message_index);
            self.draw_message()?;
            dirty = true;
        }

        if self.clock_row().is_some() {
            dirty |= self.draw_clock(now)?;
        }

        if dirty {
            self.flush()?;
        }
        Ok(())
    }

    /// Row used by the clock, if it's enabled.
    fn clock_row(&self) -> Option<u8> {
        self.config.clock.then(|| self.config.rows.saturating_sub(1))
    }

    /// Rows available to messages.
    fn message_rows(&self) -> u8 {
        self.clock_row().unwrap_or(self.config.rows)
    }

    fn draw_message(&mut self) -> GpioResult<()> {
        let message = self.messages.get(self.message_index).cloned().unwrap_or_default();
        let mut lines = message.lines();
        for row in 0..self.message_rows() {
            let line = fit_line(lines.next().unwrap_or(""), self.config.columns);
            self.vfd.set_cursor(0, row)?;
            self.vfd.print(&line)?;
        }
        Ok(())
    }

    /// Draws the clock if its text changed. Returns whether anything was drawn.
    fn draw_clock(&mut self, now: OffsetDateTime) -> GpioResult<bool> {
        let Some(row) = self.clock_row() else {
            return Ok(false);
        };
        let format = format_description!("[hour]:[minute]:[second]");
        let text = now.format(format).unwrap_or_else(|_| "--:--:--".to_string());
        if self.last_clock.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }

        let line = fit_line(&text, self.config.columns);
        self.vfd.set_cursor(0, row)?;
        self.vfd.print(&line)?;
        self.last_clock = Some(text);
        Ok(true)
    }

    fn flush(&mut self) -> GpioResult<()> {
        if self.config.buffered {
            self.vfd.print_message_buffer()?;
        }
        Ok(())
    }
}
