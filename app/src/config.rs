use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use futavfd_gpio::vfd::us162s::driver::{FlashRate, Font, US162STiming, CUSTOM_CHARACTER_COUNT};
use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("display geometry must be at least 1x1")]
    EmptyGeometry,
    #[error("half period ({half_period_us} us) is shorter than data setup ({data_setup_us} us)")]
    HalfPeriodTooShort { half_period_us: u32, data_setup_us: u32 },
    #[error("custom character slot {0} is out of range")]
    SlotOutOfRange(u8),
    #[error("the clock takes the only row, so messages would never be shown")]
    NoRowsForMessages,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub columns: u8,
    pub rows: u8,
    pub brightness: u8,
    pub font: FontName,
    /// Draw through the module's message buffer, so a screen shows up all at once.
    pub buffered: bool,
    pub flash: Option<FlashConfig>,
    pub custom_chars: Vec<CustomChar>,
    /// Messages shown in turn. Lines are separated with `\n`; `{hostname}` and `{version}` are
    /// replaced on startup.
    pub messages: Vec<String>,
    pub message_seconds: u32,
    /// Shows the local time on the last row.
    pub clock: bool,
    pub timing: TimingConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FontName {
    #[default]
    Western,
    Katakana,
}

impl From<FontName> for Font {
    fn from(name: FontName) -> Self {
        match name {
            FontName::Western => Font::Western,
            FontName::Katakana => Font::Katakana,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlashRateName {
    Hz50,
    #[default]
    Hz1,
    TenthHz,
}

impl From<FlashRateName> for FlashRate {
    fn from(name: FlashRateName) -> Self {
        match name {
            FlashRateName::Hz50 => FlashRate::Hz50,
            FlashRateName::Hz1 => FlashRate::Hz1,
            FlashRateName::TenthHz => FlashRate::TenthHz,
        }
    }
}

/// A flashing range, in 1-based device addresses.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FlashConfig {
    pub start: u8,
    pub stop: u8,
    #[serde(default)]
    pub rate: FlashRateName,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CustomChar {
    pub slot: u8,
    /// Pixel rows, top to bottom, low five bits each.
    pub rows: [u8; 8],
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub data_setup_us: u32,
    pub half_period_us: u32,
    pub process_us: u32,
    pub reset_hold_us: u32,
    pub post_reset_us: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let timing = US162STiming::DEFAULT;
        TimingConfig {
            data_setup_us: timing.data_setup_us,
            half_period_us: timing.half_period_us,
            process_us: timing.process_us,
            reset_hold_us: timing.reset_hold_us,
            post_reset_us: timing.post_reset_us,
        }
    }
}

impl From<TimingConfig> for US162STiming {
    fn from(config: TimingConfig) -> Self {
        US162STiming {
            data_setup_us: config.data_setup_us,
            half_period_us: config.half_period_us,
            process_us: config.process_us,
            reset_hold_us: config.reset_hold_us,
            post_reset_us: config.post_reset_us,
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("config.json"));
        PathBuf::from(config_str)
    }

    /// Loads the config file. Returns `None` if there is none.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(config_path: &Path) -> eyre::Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)?;
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(Some(config))
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, config_path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(ConfigError::EmptyGeometry);
        }
        if self.timing.half_period_us < self.timing.data_setup_us {
            return Err(ConfigError::HalfPeriodTooShort {
                half_period_us: self.timing.half_period_us,
                data_setup_us: self.timing.data_setup_us,
            });
        }
        if self.clock && self.rows < 2 && !self.messages.is_empty() {
            return Err(ConfigError::NoRowsForMessages);
        }
        if let Some(custom_char) = self.custom_chars.iter().find(|c| c.slot >= CUSTOM_CHARACTER_COUNT) {
            return Err(ConfigError::SlotOutOfRange(custom_char.slot));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            columns: 16,
            rows: 2,
            brightness: 0xFF,
            font: FontName::default(),
            buffered: false,
            flash: None,
            custom_chars: Vec::new(),
            messages: vec!["{hostname}".to_string(), "futavfd v{version}".to_string()],
            message_seconds: 5,
            clock: true,
            timing: TimingConfig::default(),
        }
    }
}
