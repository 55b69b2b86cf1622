mod app;
mod config;
mod utils;

use std::env::var;
use std::thread;
use std::time::{Duration, Instant};
use dotenv::dotenv;
use log::{debug, info, warn};
use sysinfo::System;
use time::OffsetDateTime;
use futavfd_gpio::{GpioActiveLevel, GpioBias, GpioDriver, GpioPin};
use futavfd_gpio::delay::{Delay, SpinDelay};
use futavfd_gpio::gpiod::GpiodDriver;
use futavfd_gpio::mock::{RecordingDelay, RecordingGpioDriver, Trace};
use futavfd_gpio::vfd::us162s::driver::GpioUS162SDriver;
use crate::app::App;
use crate::config::Config;
use crate::utils::{parse_bias, parse_flag, parse_optional_pin, Placeholders};

/// Pin assignment read from the environment.
#[derive(Debug, Clone, Copy)]
struct Pins {
    clock: usize,
    data: usize,
    reset: Option<usize>,
    /// Bias applied to every display line.
    bias: GpioBias,
    reset_active_level: GpioActiveLevel,
}

impl Pins {
    fn from_env() -> eyre::Result<Self> {
        Ok(Pins {
            clock: var("FUTAVFD_PIN_CLOCK")?.parse()?,
            data: var("FUTAVFD_PIN_DATA")?.parse()?,
            reset: parse_optional_pin(var("FUTAVFD_PIN_RESET").ok().as_deref())?,
            bias: parse_bias(var("FUTAVFD_PIN_BIAS").ok().as_deref())?,
            reset_active_level: if parse_flag(var("FUTAVFD_RESET_ACTIVE_LOW").ok().as_deref()) {
                GpioActiveLevel::Low
            } else {
                GpioActiveLevel::High
            },
        })
    }
}

/// Gets pin `index` with `bias` applied. Without a bias the backend default is kept.
fn get_pin<'g>(gpio: &'g dyn GpioDriver, index: usize, bias: GpioBias) -> eyre::Result<Box<dyn GpioPin + 'g>> {
    let mut pin = gpio.get_pin(index)?;
    if bias != GpioBias::None {
        pin.set_bias(bias)?;
    }
    Ok(pin)
}

fn load_config() -> eyre::Result<Config> {
    debug!("Trying to load config from {:?}...", Config::path());
    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    Ok(config)
}

/// Sets up the display on `gpio` and runs the app. With `once`, stops after the first update.
fn run(
    gpio: &dyn GpioDriver,
    delay: &dyn Delay,
    pins: Pins,
    config: Config,
    once: bool,
) -> eyre::Result<()> {
    debug!("Initializing VFD driver...");
    let mut clock_pin = get_pin(gpio, pins.clock, pins.bias)?;
    let clock_out = clock_pin.as_output_with(true)?;
    let mut data_pin = get_pin(gpio, pins.data, pins.bias)?;
    let data_out = data_pin.as_output_with(false)?;
    let mut reset_pin = pins.reset.map(|pin| get_pin(gpio, pin, pins.bias)).transpose()?;
    let reset_out = match reset_pin.as_mut() {
        Some(pin) => {
            if pins.reset_active_level != GpioActiveLevel::High {
                pin.set_active_level(pins.reset_active_level)?;
            }
            Some(pin.as_output_with(false)?)
        }
        None => None,
    };

    let mut vfd = GpioUS162SDriver::new(&*clock_out, &*data_out, reset_out.as_deref(), delay)?
        .with_timing(config.timing.into());
    debug!("{:?} initialized.", vfd);

    let placeholders = Placeholders {
        hostname: System::host_name().unwrap_or_else(|| "???".to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let mut app = App::new(config, &mut vfd, &placeholders);
    app.start()?;

    info!("Starting main loop...");

    let mut last_update = Instant::now();
    loop {
        let now = Instant::now();
        app.update(now - last_update, local_time())?;
        last_update = now;

        if once {
            return Ok(());
        }

        // Sleep for 1/10th of a second
        thread::sleep(Duration::from_millis(100));
    }
}

fn local_time() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| {
        warn!("Local UTC offset unavailable, showing UTC.");
        OffsetDateTime::now_utc()
    })
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("futavfd starting...");

    let pins = Pins::from_env()?;
    info!(
        "VFD @ CLK: {}, DATA: {}, RESET: {:?} ({:?}), bias {:?}",
        pins.clock, pins.data, pins.reset, pins.reset_active_level, pins.bias
    );

    let config = load_config()?;
    debug!("{:?}", config);

    if parse_flag(var("FUTAVFD_DRY_RUN").ok().as_deref()) {
        info!("Dry run, recording instead of driving GPIO.");
        let trace = Trace::new();
        let gpio = RecordingGpioDriver::new(&trace, 64);
        let delay = RecordingDelay::new(&trace);
        run(&gpio, &delay, pins, config, true)?;

        let bytes = trace.decode_bytes(pins.clock, pins.data);
        let wire_us: u64 = trace.delays().iter().map(|&us| us as u64).sum();
        info!("{} bytes, {} us on the wire", bytes.len(), wire_us);
        for chunk in bytes.chunks(16) {
            info!("{:02X?}", chunk);
        }
        return Ok(());
    }

    let chip = var("FUTAVFD_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    debug!("Opening {}...", chip);
    let gpio = GpiodDriver::open(&chip)?;
    debug!("{:?} initialized.", gpio);

    run(&gpio, &SpinDelay, pins, config, false)
}
