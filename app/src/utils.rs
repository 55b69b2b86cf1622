use std::str::FromStr;
use eyre::eyre;
use futavfd_gpio::GpioBias;

/// Values substituted into messages.
#[derive(Debug, Clone)]
pub struct Placeholders {
    pub hostname: String,
    pub version: String,
}

impl Placeholders {
    pub fn expand(&self, message: &str) -> String {
        message
            .replace("{hostname}", &self.hostname)
            .replace("{version}", &self.version)
    }
}

/// Cuts or pads `text` with spaces to exactly `columns` characters, so a line overwrites whatever
/// was there before.
pub fn fit_line(text: &str, columns: u8) -> String {
    let columns = columns as usize;
    let mut line: String = text.chars().take(columns).collect();
    let len = line.chars().count();
    line.extend(std::iter::repeat_n(' ', columns - len));
    line
}

/// Parses an optional pin number. Empty values and `none` mean the pin isn't wired.
pub fn parse_optional_pin(value: Option<&str>) -> eyre::Result<Option<usize>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("none") => Ok(None),
        Some(s) => usize::from_str(s)
            .map(Some)
            .map_err(|e| eyre!("Invalid pin number {:?}: {}", s, e)),
    }
}

/// Parses a pin bias: `none`, `pull_up` or `pull_down`. Unset means no bias.
pub fn parse_bias(value: Option<&str>) -> eyre::Result<GpioBias> {
    match value.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "none") => Ok(GpioBias::None),
        Some("pull_up" | "pullup" | "up") => Ok(GpioBias::PullUp),
        Some("pull_down" | "pulldown" | "down") => Ok(GpioBias::PullDown),
        Some(other) => Err(eyre!("Invalid pin bias {:?}", other)),
    }
}

/// Parses a boolean flag like `1`, `true` or `yes`.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}
