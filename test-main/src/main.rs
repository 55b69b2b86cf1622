use futavfd_gpio::delay::{Delay, SleepDelay, SpinDelay};
use futavfd_gpio::gpiod::GpiodDriver;
use futavfd_gpio::vfd::us162s::driver::{
    BufferMode, CursorMode, FlashMode, FlashRate, Font, GpioUS162SDriver, US162SDriver,
};
use futavfd_gpio::GpioDriver;
use dotenv::dotenv;
use log::info;
use std::env::var;
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;

/// Smiley, one byte per row.
const SMILEY: [u8; 8] = [
    0b00000,
    0b01010,
    0b01010,
    0b00000,
    0b10001,
    0b01110,
    0b00000,
    0b00000,
];

/// Bottom-up bar graph glyphs, 1 to 8 rows filled.
fn bar(height: usize) -> [u8; 8] {
    let mut rows = [0u8; 8];
    for row in rows.iter_mut().skip(8 - height) {
        *row = 0b11111;
    }
    rows
}

/// Reads an optional pin number. Unset, empty and `none` mean it isn't wired.
fn optional_pin(value: Option<&str>) -> eyre::Result<Option<usize>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => Ok(Some(s.parse()?)),
    }
}

fn pause(step: &str) {
    info!("{}", step);
    sleep(Duration::from_secs(2));
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());

    let chip = var("FUTAVFD_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let gpio = GpiodDriver::open(&chip)?;

    let mut pin_clock = gpio.get_pin(var("FUTAVFD_PIN_CLOCK")?.parse()?)?;
    let mut pin_data = gpio.get_pin(var("FUTAVFD_PIN_DATA")?.parse()?)?;
    let mut pin_reset = optional_pin(var("FUTAVFD_PIN_RESET").ok().as_deref())?
        .map(|pin| gpio.get_pin(pin))
        .transpose()?;

    let pin_clock_out = pin_clock.as_output_with(true)?;
    let pin_data_out = pin_data.as_output_with(false)?;
    let pin_reset_out = match pin_reset.as_mut() {
        Some(pin) => Some(pin.as_output_with(false)?),
        None => None,
    };
    info!("Reset line: {}", if pin_reset_out.is_some() { "wired" } else { "not wired" });

    // Busy-wait for the bits, but a sleeping delay is good enough to check reset and init.
    let delay: &dyn Delay = if var("FUTAVFD_SLEEP_DELAY").is_ok() { &SleepDelay } else { &SpinDelay };

    let mut driver = GpioUS162SDriver::new(
        &*pin_clock_out,
        &*pin_data_out,
        pin_reset_out.as_deref(),
        delay,
    )?;

    driver.init(16, 2)?;
    driver.print("Hello, VFD!")?;
    pause("Text");

    for level in [0x20, 0x60, 0xA0, 0xFF] {
        driver.set_brightness(level)?;
        pause(&format!("Brightness {:#04X}", level));
    }

    driver.clear_display()?;
    driver.create_char(0, &SMILEY)?;
    for slot in 1..8 {
        driver.create_char(slot, &bar(slot as usize))?;
    }
    for code in 0..8 {
        driver.write_char(code)?;
    }
    pause("Custom characters");

    driver.set_cursor(0, 1)?;
    driver.print("flashing")?;
    driver.set_flash_positions(17, 24)?;
    driver.set_flash_mode(FlashMode::Enabled)?;
    for rate in [FlashRate::Hz1, FlashRate::TenthHz, FlashRate::Hz50] {
        driver.set_flash_rate(rate)?;
        pause(&format!("Flash rate {:?}", rate));
    }
    driver.set_flash_mode(FlashMode::Disabled)?;

    driver.clear_display()?;
    driver.select_font(Font::Katakana)?;
    for code in 0xB1..=0xB5 {
        driver.write_char(code)?;
    }
    pause("Katakana");
    driver.select_font(Font::Western)?;

    driver.clear_display()?;
    driver.set_cursor(15, 0)?;
    driver.set_cursor_mode(CursorMode::AutoDecrement)?;
    driver.print("<-ecrd")?;
    driver.set_cursor_mode(CursorMode::NonIncrement)?;
    driver.set_cursor(0, 1)?;
    driver.print("0123456789")?;
    pause("Cursor modes");
    driver.set_cursor_mode(CursorMode::AutoIncrement)?;

    driver.clear_display()?;
    driver.set_buffer_mode(BufferMode::Buffered)?;
    driver.print("All at once")?;
    pause("Buffered, nothing shown yet");
    driver.print_message_buffer()?;
    pause("Buffer printed");
    driver.set_buffer_mode(BufferMode::NonBuffered)?;

    driver.home()?;
    info!("Done.");

    Ok(())
}
