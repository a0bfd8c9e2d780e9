use serde::{Deserialize, Serialize};
use std::fmt;

/// Geodetic position in decimal degrees (WGS-84)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    /// Latitude within [-90, 90], longitude within [-180, 180], both finite
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.7};{:.7}", self.latitude, self.longitude)
    }
}

/// Anchor watch state tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateTag {
    Disabled,
    DropPointSet,
    InRadius,
    AlarmDragging,
    AlarmDraggingMuted,
    AlarmNoGps,
    AlarmNoGpsMuted,
}

impl StateTag {
    pub const ALL: [StateTag; 7] = [
        StateTag::Disabled,
        StateTag::DropPointSet,
        StateTag::InRadius,
        StateTag::AlarmDragging,
        StateTag::AlarmDraggingMuted,
        StateTag::AlarmNoGps,
        StateTag::AlarmNoGpsMuted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateTag::Disabled => "DISABLED",
            StateTag::DropPointSet => "DROP_POINT_SET",
            StateTag::InRadius => "IN_RADIUS",
            StateTag::AlarmDragging => "ALARM_DRAGGING",
            StateTag::AlarmDraggingMuted => "ALARM_DRAGGING_MUTED",
            StateTag::AlarmNoGps => "ALARM_NO_GPS",
            StateTag::AlarmNoGpsMuted => "ALARM_NO_GPS_MUTED",
        }
    }

    pub fn is_muted(&self) -> bool {
        matches!(self, StateTag::AlarmDraggingMuted | StateTag::AlarmNoGpsMuted)
    }

    pub fn is_alarm(&self) -> bool {
        matches!(
            self,
            StateTag::AlarmDragging
                | StateTag::AlarmDraggingMuted
                | StateTag::AlarmNoGps
                | StateTag::AlarmNoGpsMuted
        )
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, StateTag::AlarmDragging | StateTag::AlarmDraggingMuted)
    }

    /// States in which the tick performs a decision
    pub fn is_watching(&self) -> bool {
        !matches!(self, StateTag::Disabled | StateTag::DropPointSet)
    }
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to snapshots and operator messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
    Emergency,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Emergency => "emergency",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
