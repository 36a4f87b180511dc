//! Validated generation settings.
//!
//! Each setting is a small value type implementing [`Setting`], whose `try_set` turns raw user
//! text into a value or a [`ValidationWarning`].  [`Settings::try_set`] dispatches on a
//! [`SettingName`] so the command interpreter never validates anything itself.  A rejected
//! assignment leaves the stored value untouched.

use std::fmt;

use crate::types::Model;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.5;

/// Default token ceiling for a round.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// The settings a user may change while chatting.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SettingName {
    /// The model id.
    Model,
    /// The sampling temperature.
    Temperature,
    /// The token ceiling for the round.
    MaxTokens,
    /// Whether the round continues after each exchange.
    Continuing,
}

impl fmt::Display for SettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingName::Model => write!(f, "model"),
            SettingName::Temperature => write!(f, "temperature"),
            SettingName::MaxTokens => write!(f, "max_tokens"),
            SettingName::Continuing => write!(f, "continue"),
        }
    }
}

/// A refused assignment.  Non-fatal: the previous value stays in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The setting that refused the value.
    pub setting: SettingName,
    /// The raw input.
    pub input: String,
    /// Why it was refused.
    pub reason: String,
}

impl ValidationWarning {
    fn new(setting: SettingName, input: &str, reason: impl Into<String>) -> Self {
        Self {
            setting,
            input: input.trim().to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}': {}; keeping the current value",
            self.setting, self.input, self.reason
        )
    }
}

impl std::error::Error for ValidationWarning {}

/// A value accepted by [`Setting::try_set`], possibly altered to fit.
#[derive(Debug, Clone, PartialEq)]
pub struct Assigned<T> {
    /// The value to store.
    pub value: T,
    /// Describes how the input was altered, when it was.
    pub adjustment: Option<String>,
}

impl<T> Assigned<T> {
    fn exact(value: T) -> Self {
        Self {
            value,
            adjustment: None,
        }
    }

    fn adjusted(value: T, adjustment: String) -> Self {
        Self {
            value,
            adjustment: Some(adjustment),
        }
    }
}

/// A setting value parsed from user text.
pub trait Setting: Sized + Copy + fmt::Display {
    /// Which setting this type holds.
    const NAME: SettingName;

    /// Parse and validate raw input.
    fn try_set(raw: &str) -> Result<Assigned<Self>, ValidationWarning>;
}

/// The result of a successful [`Settings::try_set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// The setting that changed.
    pub setting: SettingName,
    /// The stored value, formatted for display.
    pub value: String,
    /// Present when the input was clamped or rounded.
    pub adjustment: Option<String>,
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} set to {}", self.setting, self.value)
    }
}

////////////////////////////////////////// values //////////////////////////////////////////

impl Setting for Model {
    const NAME: SettingName = SettingName::Model;

    fn try_set(raw: &str) -> Result<Assigned<Self>, ValidationWarning> {
        raw.parse::<Model>().map(Assigned::exact).map_err(|_| {
            ValidationWarning::new(
                Self::NAME,
                raw,
                format!("supported models are {}", Model::supported_list()),
            )
        })
    }
}

/// Sampling temperature in `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Temperature(f64);

impl Temperature {
    /// Lowest accepted temperature.
    pub const MIN: f64 = 0.0;
    /// Highest accepted temperature.
    pub const MAX: f64 = 1.0;

    /// The stored value.
    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Temperature(DEFAULT_TEMPERATURE)
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Setting for Temperature {
    const NAME: SettingName = SettingName::Temperature;

    fn try_set(raw: &str) -> Result<Assigned<Self>, ValidationWarning> {
        let value = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationWarning::new(Self::NAME, raw, "expects a number"))?;

        if value < Self::MIN {
            Ok(Assigned::adjusted(
                Temperature(Self::MIN),
                format!("temperature {value} is below {}; clamped", Self::MIN),
            ))
        } else if value > Self::MAX {
            Ok(Assigned::adjusted(
                Temperature(Self::MAX),
                format!("temperature {value} is above {}; clamped", Self::MAX),
            ))
        } else {
            // Normalize -0.0.
            Ok(Assigned::exact(Temperature(value + 0.0)))
        }
    }
}

/// Positive token ceiling for a round.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaxTokens(u32);

impl MaxTokens {
    /// The stored value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for MaxTokens {
    fn default() -> Self {
        MaxTokens(DEFAULT_MAX_TOKENS)
    }
}

impl fmt::Display for MaxTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Setting for MaxTokens {
    const NAME: SettingName = SettingName::MaxTokens;

    fn try_set(raw: &str) -> Result<Assigned<Self>, ValidationWarning> {
        let trimmed = raw.trim();
        let out_of_range = || {
            ValidationWarning::new(
                Self::NAME,
                raw,
                format!("must be a positive integer no larger than {}", u32::MAX),
            )
        };

        if let Ok(value) = trimmed.parse::<i64>() {
            return match u32::try_from(value) {
                Ok(value) if value > 0 => Ok(Assigned::exact(MaxTokens(value))),
                _ => Err(out_of_range()),
            };
        }

        let value = trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ValidationWarning::new(Self::NAME, raw, "expects an integer"))?;
        let rounded = value.round();
        if rounded < 1.0 || rounded > f64::from(u32::MAX) {
            return Err(out_of_range());
        }
        let rounded = rounded as u32;
        Ok(Assigned::adjusted(
            MaxTokens(rounded),
            format!("max_tokens {trimmed} is not an integer; rounded to {rounded}"),
        ))
    }
}

/// Whether a round keeps going after an exchange.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Continuing(bool);

impl Continuing {
    /// The stored value.
    pub fn get(self) -> bool {
        self.0
    }
}

impl fmt::Display for Continuing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 {
            write!(f, "on")
        } else {
            write!(f, "off")
        }
    }
}

impl Setting for Continuing {
    const NAME: SettingName = SettingName::Continuing;

    fn try_set(raw: &str) -> Result<Assigned<Self>, ValidationWarning> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(Assigned::exact(Continuing(true))),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(Assigned::exact(Continuing(false))),
            _ => Err(ValidationWarning::new(
                Self::NAME,
                raw,
                "expects on/off, yes/no, true/false or 1/0",
            )),
        }
    }
}

///////////////////////////////////////// Settings /////////////////////////////////////////

/// The full set of generation settings for a session.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Settings {
    /// The model id.
    pub model: Model,
    /// Sampling temperature.
    pub temperature: Temperature,
    /// Token ceiling for the round.
    pub max_tokens: MaxTokens,
    /// Whether the round continues after each exchange.
    pub continuing: Continuing,
}

impl Settings {
    /// Validate `raw` for the named setting and store it on success.
    pub fn try_set(&mut self, name: SettingName, raw: &str) -> Result<Applied, ValidationWarning> {
        match name {
            SettingName::Model => assign(&mut self.model, raw),
            SettingName::Temperature => assign(&mut self.temperature, raw),
            SettingName::MaxTokens => assign(&mut self.max_tokens, raw),
            SettingName::Continuing => assign(&mut self.continuing, raw),
        }
    }

    /// Flip `continuing` and return the new value.
    pub fn toggle_continuing(&mut self) -> bool {
        self.continuing = Continuing(!self.continuing.0);
        self.continuing.0
    }
}

fn assign<T: Setting>(slot: &mut T, raw: &str) -> Result<Applied, ValidationWarning> {
    let assigned = T::try_set(raw)?;
    *slot = assigned.value;
    Ok(Applied {
        setting: T::NAME,
        value: assigned.value.to_string(),
        adjustment: assigned.adjustment,
    })
}
