//! Recording GPIO backend.
//!
//! Nothing here touches hardware. Line writes, bias changes and requested delays are appended to a
//! shared [Trace], which can then be inspected directly or decoded back into the bytes that a
//! clocked serial receiver would have seen. Used by the tests and by dry runs of the binaries.

use crate::delay::Delay;
use crate::{GpioActiveLevel, GpioBias, GpioDriver, GpioError, GpioOutput, GpioPin, GpioResult};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};

/// One recorded event.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TraceEvent {
    /// The pin was switched to output mode.
    Output { pin: usize },
    /// The pin was driven to the physical `level`.
    Write { pin: usize, level: bool },
    /// The pin's bias was changed.
    Bias { pin: usize, bias: GpioBias },
    /// A delay of `us` microseconds was requested.
    Delay { us: u32 },
}

/// Ordered log of [TraceEvent]s shared by a [RecordingGpioDriver] and a [RecordingDelay].
#[derive(Debug, Default)]
pub struct Trace {
    events: RefCell<Vec<TraceEvent>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Returns a copy of everything recorded so far.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Levels written to `pin`, in order.
    pub fn writes_to(&self, pin: usize) -> Vec<bool> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                TraceEvent::Write { pin: p, level } if p == pin => Some(level),
                _ => None,
            })
            .collect()
    }

    /// All requested delays, in order.
    pub fn delays(&self) -> Vec<u32> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                TraceEvent::Delay { us } => Some(us),
                _ => None,
            })
            .collect()
    }

    /// Decodes the recorded line activity as a receiver that samples the data line on every
    /// falling clock edge, MSB first.
    ///
    /// Trailing bits that don't make up a whole byte are dropped.
    pub fn decode_bytes(&self, clock_pin: usize, data_pin: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        let mut data_level = false;
        let mut clock_level = None;
        let mut current = 0u8;
        let mut bits = 0;

        for event in self.events.borrow().iter() {
            let TraceEvent::Write { pin, level } = *event else {
                continue;
            };

            if pin == data_pin {
                data_level = level;
            } else if pin == clock_pin {
                let falling = !level && clock_level != Some(false);
                clock_level = Some(level);
                if !falling {
                    continue;
                }

                current = (current << 1) | data_level as u8;
                bits += 1;
                if bits == 8 {
                    bytes.push(current);
                    current = 0;
                    bits = 0;
                }
            }
        }

        bytes
    }
}

/// GPIO driver that records writes into a [Trace] instead of driving real pins.
pub struct RecordingGpioDriver<'t> {
    trace: &'t Trace,
    used_pins: RefCell<Vec<bool>>,
}

impl<'t> RecordingGpioDriver<'t> {
    /// Creates a driver with `count` pins.
    pub fn new(trace: &'t Trace, count: usize) -> Self {
        Self {
            trace,
            used_pins: RefCell::new(vec![false; count]),
        }
    }
}

impl Debug for RecordingGpioDriver<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordingGpioDriver({})", self.used_pins.borrow().len())
    }
}

impl GpioDriver for RecordingGpioDriver<'_> {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.used_pins.borrow().len())
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        let mut used_pins = self.used_pins.borrow_mut();
        match used_pins.get_mut(index) {
            None => Err(GpioError::InvalidArgument),
            Some(true) => Err(GpioError::AlreadyInUse),
            Some(used) => {
                *used = true;
                Ok(Box::new(RecordingPin {
                    driver: self,
                    pin_index: index,
                    active_level: GpioActiveLevel::High,
                    bias: GpioBias::None,
                }))
            }
        }
    }
}

struct RecordingPin<'a> {
    driver: &'a RecordingGpioDriver<'a>,
    pin_index: usize,
    active_level: GpioActiveLevel,
    bias: GpioBias,
}

impl Debug for RecordingPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for RecordingPin<'_> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.driver.trace.record(TraceEvent::Output { pin: self.pin_index });
        Ok(Box::new(RecordingOutput { pin: self }))
    }

    /// Latches the level first, then switches the direction.
    fn as_output_with(&mut self, value: bool) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let output = RecordingOutput { pin: self };
        output.write(value)?;
        self.driver.trace.record(TraceEvent::Output { pin: self.pin_index });
        Ok(Box::new(output))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.bias
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.bias = bias;
        self.driver.trace.record(TraceEvent::Bias { pin: self.pin_index, bias });
        Ok(())
    }
}

impl Drop for RecordingPin<'_> {
    fn drop(&mut self) {
        if let Some(used) = self.driver.used_pins.borrow_mut().get_mut(self.pin_index) {
            *used = false;
        }
    }
}

struct RecordingOutput<'a> {
    pin: &'a RecordingPin<'a>,
}

impl Debug for RecordingOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for RecordingOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.pin.driver.trace.record(TraceEvent::Write {
            pin: self.pin.pin_index,
            level: self.pin.active_level.get_state(value),
        });
        Ok(())
    }
}

/// Delay that records the requested duration and returns immediately.
#[derive(Debug, Copy, Clone)]
pub struct RecordingDelay<'t> {
    trace: &'t Trace,
}

impl<'t> RecordingDelay<'t> {
    pub fn new(trace: &'t Trace) -> Self {
        Self { trace }
    }
}

impl Delay for RecordingDelay<'_> {
    fn delay_us(&self, us: u32) {
        self.trace.record(TraceEvent::Delay { us });
    }

    fn delay_ms(&self, ms: u32) {
        self.trace.record(TraceEvent::Delay { us: ms.saturating_mul(1000) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_can_only_be_taken_once() {
        let trace = Trace::new();
        let gpio = RecordingGpioDriver::new(&trace, 4);

        let pin = gpio.get_pin(2).unwrap();
        assert_eq!(gpio.get_pin(2).unwrap_err(), GpioError::AlreadyInUse);
        drop(pin);
        assert!(gpio.get_pin(2).is_ok());
        assert_eq!(gpio.get_pin(4).unwrap_err(), GpioError::InvalidArgument);
    }

    #[test]
    fn initial_level_is_latched_before_direction() {
        let trace = Trace::new();
        let gpio = RecordingGpioDriver::new(&trace, 2);
        let mut pin = gpio.get_pin(1).unwrap();
        let _out = pin.as_output_with(true).unwrap();

        assert_eq!(
            trace.events(),
            vec![
                TraceEvent::Write { pin: 1, level: true },
                TraceEvent::Output { pin: 1 },
            ]
        );
    }

    #[test]
    fn active_low_pins_record_physical_level() {
        let trace = Trace::new();
        let gpio = RecordingGpioDriver::new(&trace, 1);
        let mut pin = gpio.get_pin(0).unwrap();
        pin.set_active_level(GpioActiveLevel::Low).unwrap();
        let out = pin.as_output().unwrap();
        out.write(true).unwrap();
        out.write(false).unwrap();

        assert_eq!(trace.writes_to(0), vec![false, true]);
    }

    #[test]
    fn bias_changes_are_recorded() {
        let trace = Trace::new();
        let gpio = RecordingGpioDriver::new(&trace, 1);
        let mut pin = gpio.get_pin(0).unwrap();
        assert!(pin.supports_bias());
        pin.set_bias(GpioBias::PullDown).unwrap();

        assert_eq!(pin.bias(), GpioBias::PullDown);
        assert_eq!(trace.events(), vec![TraceEvent::Bias { pin: 0, bias: GpioBias::PullDown }]);
    }

    #[test]
    fn decoder_samples_data_on_falling_clock_edges() {
        let trace = Trace::new();
        // Idle clock high, then 0b1010_0001 MSB first.
        trace.record(TraceEvent::Write { pin: 0, level: true });
        for bit in [true, false, true, false, false, false, false, true] {
            trace.record(TraceEvent::Write { pin: 1, level: bit });
            trace.record(TraceEvent::Write { pin: 0, level: false });
            trace.record(TraceEvent::Write { pin: 0, level: true });
        }
        // A half byte at the end is dropped.
        trace.record(TraceEvent::Write { pin: 0, level: false });

        assert_eq!(trace.decode_bytes(0, 1), vec![0b1010_0001]);
    }

    #[test]
    fn recording_delay_logs_durations() {
        let trace = Trace::new();
        let delay = RecordingDelay::new(&trace);
        delay.delay_us(7);
        delay.delay_ms(2);

        assert_eq!(trace.delays(), vec![7, 2000]);
    }
}
