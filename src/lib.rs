//! Anchor drag alarm
//!
//! A 1 Hz state machine compares the vessel position against a safe circle
//! around the anchor drop point and raises dragging or lost-GPS alarms. The
//! controller persists the armed watch so it survives restarts and fans state
//! changes out to collaborators.

pub mod collaborator;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod geodesy;
pub mod gps;
pub mod nmea;
pub mod service;
pub mod settings;
pub mod snapshot;
pub mod timer;
pub mod types;

pub use collaborator::{Collaborator, LogCollaborator, StatusFileCollaborator};
pub use config::{Configuration, SettingKey, SettingValue};
pub use controller::{Action, Command, Controller, ControllerHandle};
pub use engine::AnchorAlarm;
pub use error::{AlarmError, AlarmResult, SettingsError};
pub use gps::{FixedPosition, GpsChain, GpsSource, SharedFix};
pub use settings::{InMemorySettings, JsonFileSettings, SettingsStore};
pub use snapshot::{SnapshotParams, StateSnapshot};
pub use types::{GeoPoint, Level, StateTag};
