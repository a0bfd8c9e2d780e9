//! Watch configuration and the settings key table
//!
//! Every persisted setting has a canonical name, a default and an inclusive range.
//! Stores clamp writes into the range and fall back to the default for missing keys.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TOLERANCE_M: u16 = 15;
pub const DEFAULT_NO_GPS_GRACE_TICKS: u16 = 30;
pub const DEFAULT_MUTE_DURATION_TICKS: u16 = 30;
pub const DEFAULT_MOORING_RADIUS_M: i64 = 15;

/// Step used by the tolerance +/- triggers
pub const TOLERANCE_STEP_M: u16 = 5;
/// Upper bound reachable through the tolerance + trigger
pub const TOLERANCE_TRIGGER_MAX_M: u16 = 50;

/// Active watch parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Extra metres beyond the armed radius before dragging is declared
    pub tolerance_m: u16,
    /// Consecutive fixless ticks tolerated before ALARM_NO_GPS
    pub no_gps_grace_ticks: u16,
    /// Ticks a muted alarm stays muted
    pub mute_duration_ticks: u16,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            tolerance_m: DEFAULT_TOLERANCE_M,
            no_gps_grace_ticks: DEFAULT_NO_GPS_GRACE_TICKS,
            mute_duration_ticks: DEFAULT_MUTE_DURATION_TICKS,
        }
    }
}

impl Configuration {
    pub fn new(tolerance_m: u16, no_gps_grace_ticks: u16, mute_duration_ticks: u16) -> Self {
        Configuration {
            tolerance_m,
            no_gps_grace_ticks,
            mute_duration_ticks,
        }
    }

    /// Clamp every field into its settings range
    pub fn clamped(self) -> Self {
        let coerce = |key: SettingKey, v: u16| key.coerce(SettingValue::Int(v as i64)).as_i64() as u16;
        Configuration {
            tolerance_m: coerce(SettingKey::Tolerance, self.tolerance_m),
            no_gps_grace_ticks: coerce(SettingKey::NoGpsGraceTicks, self.no_gps_grace_ticks),
            mute_duration_ticks: coerce(SettingKey::MuteDurationTicks, self.mute_duration_ticks),
        }
    }
}

/// Stored setting value
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    Float(f64),
}

impl SettingValue {
    pub fn as_i64(&self) -> i64 {
        match *self {
            SettingValue::Int(i) => i,
            SettingValue::Float(f) => f.round() as i64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            SettingValue::Int(i) => i as f64,
            SettingValue::Float(f) => f,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Persisted settings keys
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingKey {
    Tolerance,
    NoGpsGraceTicks,
    MuteDurationTicks,
    MooringRadius,
    Latitude,
    Longitude,
    Radius,
    Active,
}

#[derive(Clone, Copy, Debug)]
pub struct ParamInfo {
    pub default: SettingValue,
    pub min: f64,
    pub max: f64,
    pub integer: bool,
}

impl SettingKey {
    pub const ALL: [SettingKey; 8] = [
        SettingKey::Tolerance,
        SettingKey::NoGpsGraceTicks,
        SettingKey::MuteDurationTicks,
        SettingKey::MooringRadius,
        SettingKey::Latitude,
        SettingKey::Longitude,
        SettingKey::Radius,
        SettingKey::Active,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SettingKey::Tolerance => "tolerance_m",
            SettingKey::NoGpsGraceTicks => "no_gps_grace_ticks",
            SettingKey::MuteDurationTicks => "mute_duration_ticks",
            SettingKey::MooringRadius => "mooring_radius",
            SettingKey::Latitude => "latitude",
            SettingKey::Longitude => "longitude",
            SettingKey::Radius => "radius",
            SettingKey::Active => "active",
        }
    }

    pub fn from_name(name: &str) -> Option<SettingKey> {
        SettingKey::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn info(&self) -> ParamInfo {
        let int = |default: i64, min: f64, max: f64| ParamInfo {
            default: SettingValue::Int(default),
            min,
            max,
            integer: true,
        };
        match self {
            SettingKey::Tolerance => int(DEFAULT_TOLERANCE_M as i64, 0.0, 512.0),
            SettingKey::NoGpsGraceTicks => int(DEFAULT_NO_GPS_GRACE_TICKS as i64, 0.0, 300.0),
            SettingKey::MuteDurationTicks => int(DEFAULT_MUTE_DURATION_TICKS as i64, 0.0, 300.0),
            SettingKey::MooringRadius => int(DEFAULT_MOORING_RADIUS_M, 0.0, 256.0),
            SettingKey::Latitude => ParamInfo {
                default: SettingValue::Float(0.0),
                min: -90.0,
                max: 90.0,
                integer: false,
            },
            SettingKey::Longitude => ParamInfo {
                default: SettingValue::Float(0.0),
                min: -180.0,
                max: 180.0,
                integer: false,
            },
            SettingKey::Radius => int(0, 0.0, 256.0),
            SettingKey::Active => int(0, 0.0, 1.0),
        }
    }

    pub fn default_value(&self) -> SettingValue {
        self.info().default
    }

    /// Coerce a value into this key's type and range
    pub fn coerce(&self, value: SettingValue) -> SettingValue {
        let info = self.info();
        let raw = value.as_f64();
        if !raw.is_finite() {
            return info.default;
        }
        let bounded = raw.clamp(info.min, info.max);
        if info.integer {
            SettingValue::Int(bounded.round() as i64)
        } else {
            SettingValue::Float(bounded)
        }
    }

    /// Keys whose change rebuilds the engine configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SettingKey::Tolerance | SettingKey::NoGpsGraceTicks | SettingKey::MuteDurationTicks
        )
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
