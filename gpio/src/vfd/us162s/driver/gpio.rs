use log::{debug, trace};
use crate::delay::Delay;
use crate::{GpioOutput, GpioResult};
use crate::vfd::us162s::driver::{Geometry, US162SDriver, IO_MODE_SERIAL, Command};

/// Wire timing of the serial link, in microseconds.
///
/// The defaults come from the module datasheet and are kept as-is. Slower values are fine (the
/// module latches on edges, not on a fixed bit rate), faster ones are not.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct US162STiming {
    /// Data line stable before the falling clock edge.
    pub data_setup_us: u32,
    /// Half a clock period. Each bit takes two of these, including the setup time.
    pub half_period_us: u32,
    /// Idle time after every byte while the module processes it.
    pub process_us: u32,
    /// How long the reset line is held asserted.
    pub reset_hold_us: u32,
    /// Quiet time after reset before the first byte.
    pub post_reset_us: u32,
}

impl US162STiming {
    pub const DEFAULT: US162STiming = US162STiming {
        data_setup_us: 1,
        half_period_us: 5,
        process_us: 100,
        reset_hold_us: 1_000,
        post_reset_us: 100_000,
    };

    /// Clock high time after the setup time has been taken out of the period.
    pub fn clock_high_us(&self) -> u32 {
        self.half_period_us.saturating_sub(self.data_setup_us)
    }
}

impl Default for US162STiming {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// GpioUS162S driver for the US162S VFD module using GPIO pins.
///
/// The clock idles high and data is latched on the falling edge, MSB first. Every byte is followed by
/// [US162STiming::process_us] of idle time, so commands can be sent back to back without checking
/// anything in between (there is nothing to check, the link is write-only).
///
/// The driver borrows its pins and delay for its whole lifetime and takes `&mut self` for every
/// transfer; a half-sent byte would leave the module's bit counter out of step with no way to
/// recover short of a reset.
#[derive(Debug)]
pub struct GpioUS162SDriver<'a> {
    pin_clock: &'a dyn GpioOutput,
    pin_data: &'a dyn GpioOutput,
    pin_reset: Option<&'a dyn GpioOutput>,
    delay: &'a dyn Delay,
    timing: US162STiming,

    geometry: Geometry,
}

impl<'a> GpioUS162SDriver<'a> {
    /// Creates a new GpioUS162SDriver instance and drives the lines to their idle levels: clock high,
    /// data low, reset released.
    ///
    /// # Parameters
    ///
    /// - `pin_clock`: Clock output pin.
    /// - `pin_data`: Data output pin.
    /// - `pin_reset`: Optional reset output pin, asserted when high. Without it, [GpioUS162SDriver::init]
    ///   clears the display instead, since a previous run may have left it in any mode.
    /// - `delay`: Delay used for bit timing. It should busy-wait, see [crate::delay::SpinDelay].
    pub fn new(
        pin_clock: &'a dyn GpioOutput,
        pin_data: &'a dyn GpioOutput,
        pin_reset: Option<&'a dyn GpioOutput>,
        delay: &'a dyn Delay,
    ) -> GpioResult<Self> {
        pin_clock.write(true)?;
        pin_data.write(false)?;
        if let Some(pin_reset) = pin_reset {
            pin_reset.write(false)?;
        }

        Ok(GpioUS162SDriver {
            pin_clock,
            pin_data,
            pin_reset,
            delay,
            timing: US162STiming::DEFAULT,
            geometry: Geometry::default(),
        })
    }

    /// Replaces the wire timing.
    pub fn with_timing(mut self, timing: US162STiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> US162STiming {
        self.timing
    }

    pub fn has_reset(&self) -> bool {
        self.pin_reset.is_some()
    }

    fn pulse_reset(&self, pin: &dyn GpioOutput) -> GpioResult<()> {
        debug!("Pulsing reset for {} us", self.timing.reset_hold_us);
        pin.write(true)?;
        self.delay.delay_us(self.timing.reset_hold_us);
        pin.write(false)?;
        Ok(())
    }
}

impl US162SDriver for GpioUS162SDriver<'_> {
    /// Initializes the module for a `columns` × `rows` screen.
    ///
    /// With a reset pin, the module is reset first. Either way the driver then waits the post-reset
    /// time and selects the serial I/O mode. Without a reset pin it also clears the display, which is
    /// the closest thing to a reset the protocol has.
    fn init(&mut self, columns: u8, rows: u8) -> GpioResult<()> {
        self.geometry = Geometry::new(columns, rows);
        debug!("Initializing {}x{} VFD", columns, rows);

        if let Some(pin_reset) = self.pin_reset {
            self.pulse_reset(pin_reset)?;
        }

        self.delay.delay_us(self.timing.post_reset_us);

        self.send_command(Command::SetIoMode, &[IO_MODE_SERIAL])?;

        if self.pin_reset.is_none() {
            self.clear_display()?;
        }

        Ok(())
    }

    fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Clocks out `byte` MSB first.
    fn send_byte(&mut self, byte: u8) -> GpioResult<()> {
        trace!("Sending byte: {:08b}", byte);

        for bit in (0..8).rev() {
            self.pin_data.write(byte & (1 << bit) != 0)?;
            self.delay.delay_us(self.timing.data_setup_us);
            self.pin_clock.write(false)?;
            self.delay.delay_us(self.timing.half_period_us);
            self.pin_clock.write(true)?;
            self.delay.delay_us(self.timing.clock_high_us());
        }

        self.delay.delay_us(self.timing.process_us);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpioDriver;
    use crate::mock::{RecordingDelay, RecordingGpioDriver, Trace, TraceEvent};
    use proptest::prelude::*;

    const CLOCK: usize = 0;
    const DATA: usize = 1;
    const RESET: usize = 2;

    /// Builds a driver on recording pins, clears the construction writes from the trace, and hands
    /// both to `f`.
    fn with_driver<R>(
        reset: bool,
        f: impl FnOnce(&mut GpioUS162SDriver<'_>, &Trace) -> R,
    ) -> R {
        with_timed_driver(reset, US162STiming::DEFAULT, f)
    }

    fn with_timed_driver<R>(
        reset: bool,
        timing: US162STiming,
        f: impl FnOnce(&mut GpioUS162SDriver<'_>, &Trace) -> R,
    ) -> R {
        let trace = Trace::new();
        let gpio = RecordingGpioDriver::new(&trace, 3);
        let mut clock_pin = gpio.get_pin(CLOCK).unwrap();
        let mut data_pin = gpio.get_pin(DATA).unwrap();
        let mut reset_pin = gpio.get_pin(RESET).unwrap();
        let clock = clock_pin.as_output_with(true).unwrap();
        let data = data_pin.as_output_with(false).unwrap();
        let reset_out = reset_pin.as_output_with(false).unwrap();
        let delay = RecordingDelay::new(&trace);

        let mut driver =
            GpioUS162SDriver::new(&*clock, &*data, reset.then_some(&*reset_out), &delay)
                .unwrap()
                .with_timing(timing);
        trace.clear();
        f(&mut driver, &trace)
    }

    fn sent(trace: &Trace) -> Vec<u8> {
        trace.decode_bytes(CLOCK, DATA)
    }

    #[test]
    fn construction_drives_idle_levels() {
        let trace = Trace::new();
        let gpio = RecordingGpioDriver::new(&trace, 3);
        let mut clock_pin = gpio.get_pin(CLOCK).unwrap();
        let mut data_pin = gpio.get_pin(DATA).unwrap();
        let mut reset_pin = gpio.get_pin(RESET).unwrap();
        let clock = clock_pin.as_output().unwrap();
        let data = data_pin.as_output().unwrap();
        let reset = reset_pin.as_output().unwrap();
        let delay = RecordingDelay::new(&trace);
        trace.clear();

        let driver = GpioUS162SDriver::new(&*clock, &*data, Some(&*reset), &delay).unwrap();

        assert!(driver.has_reset());
        assert_eq!(driver.geometry(), Geometry::new(1, 1));
        assert_eq!(
            trace.events(),
            vec![
                TraceEvent::Write { pin: CLOCK, level: true },
                TraceEvent::Write { pin: DATA, level: false },
                TraceEvent::Write { pin: RESET, level: false },
            ]
        );
    }

    #[test]
    fn init_without_reset_selects_mode_then_clears() {
        with_driver(false, |vfd, trace| {
            vfd.init(20, 2).unwrap();

            assert_eq!(vfd.geometry().cells(), 40);
            assert!(trace.writes_to(RESET).is_empty());
            assert_eq!(sent(trace), vec![0x0A, 0x00, 0x0B]);
            assert_eq!(trace.delays()[0], US162STiming::DEFAULT.post_reset_us);
        });
    }

    #[test]
    fn init_with_reset_pulses_before_mode_select() {
        with_driver(true, |vfd, trace| {
            vfd.init(16, 2).unwrap();

            let timing = US162STiming::DEFAULT;
            assert_eq!(
                trace.events()[..4],
                [
                    TraceEvent::Write { pin: RESET, level: true },
                    TraceEvent::Delay { us: timing.reset_hold_us },
                    TraceEvent::Write { pin: RESET, level: false },
                    TraceEvent::Delay { us: timing.post_reset_us },
                ]
            );
            assert_eq!(sent(trace), vec![0x0A, 0x00]);
        });
    }

    #[test]
    fn init_then_set_cursor_end_to_end() {
        with_driver(false, |vfd, trace| {
            vfd.init(20, 2).unwrap();
            assert_eq!(sent(trace), vec![0x0A, 0x00, 0x0B]);

            trace.clear();
            vfd.set_cursor(5, 1).unwrap();
            assert_eq!(sent(trace), vec![0x10, 26]);

            trace.clear();
            vfd.set_cursor(0, 2).unwrap();
            assert_eq!(sent(trace), vec![0x10, 1]);
        });
    }

    #[test]
    fn custom_timing_is_used() {
        let timing = US162STiming {
            data_setup_us: 2,
            half_period_us: 10,
            process_us: 300,
            reset_hold_us: 5,
            post_reset_us: 7,
        };
        with_timed_driver(false, timing, |vfd, trace| {
            assert_eq!(vfd.timing(), timing);
            vfd.send_byte(0).unwrap();

            let delays = trace.delays();
            assert_eq!(delays.len(), 25);
            assert_eq!(delays[..3], [2, 10, 8]);
            assert_eq!(delays[24], 300);
        });
    }

    #[test]
    fn clock_high_time_never_underflows() {
        let timing = US162STiming {
            data_setup_us: 10,
            half_period_us: 3,
            ..US162STiming::DEFAULT
        };
        assert_eq!(timing.clock_high_us(), 0);
    }

    proptest! {
        #[test]
        fn byte_is_clocked_out_msb_first(byte in any::<u8>()) {
            with_driver(false, |vfd, trace| {
                vfd.send_byte(byte).unwrap();

                let timing = US162STiming::DEFAULT;
                let mut expected = Vec::new();
                for bit in (0..8).rev() {
                    expected.extend([
                        TraceEvent::Write { pin: DATA, level: byte & (1 << bit) != 0 },
                        TraceEvent::Delay { us: timing.data_setup_us },
                        TraceEvent::Write { pin: CLOCK, level: false },
                        TraceEvent::Delay { us: timing.half_period_us },
                        TraceEvent::Write { pin: CLOCK, level: true },
                        TraceEvent::Delay { us: timing.clock_high_us() },
                    ]);
                }
                expected.push(TraceEvent::Delay { us: timing.process_us });

                assert_eq!(trace.events(), expected);
                assert_eq!(sent(trace), vec![byte]);
            });
        }
    }
}
