//! Scenario: the armed watch survives a restart through the JSON settings file
//!
//! # Invariants under test
//!
//! 1. Arming writes drop point, radius and `active = 1` to the file.
//! 2. A new controller on the same file comes up in IN_RADIUS with the stored arm.
//! 3. An external edit of `active` to 0 disarms on the next settings poll.
//! 4. An external edit of `active` back to 1 re-arms from the stored values.
//! 5. A status file mirrors the latest snapshot.
//! 6. A settings file that cannot be written never disarms the watch on poll.

use anchor_alarm_rs::{
    Controller, ControllerHandle, FixedPosition, GeoPoint, JsonFileSettings, SettingKey,
    SettingValue, SettingsStore, StateTag, StatusFileCollaborator,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn drop_point() -> GeoPoint {
    GeoPoint::new(18.5060715, -64.3725071)
}

fn boot(path: &Path, gps: Option<GeoPoint>) -> Controller<JsonFileSettings, FixedPosition> {
    let settings = JsonFileSettings::open(path).unwrap();
    let (handle, _commands) = ControllerHandle::channel(8);
    Controller::new(settings, FixedPosition(gps), handle)
}

fn edit_file(path: &Path, key: &str, value: serde_json::Value) {
    let mut json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    json[key] = value;
    fs::write(path, serde_json::to_string_pretty(&json).unwrap()).unwrap();
}

#[test]
fn test_restart_restores_arm() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("anchor_alarm_settings.json");

    {
        let mut boat = boot(&path, Some(drop_point()));
        boat.trigger_anchor_down().unwrap();
        boat.gps_mut().0 = Some(GeoPoint::new(18.506105, -64.372700));
        boat.trigger_chain_out().unwrap();
        assert_eq!(boat.state(), StateTag::InRadius);
    }

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["active"], 1);
    assert_eq!(json["radius"], 21);
    assert_eq!(json["latitude"], 18.5060715);

    let boat = boot(&path, None);
    assert_eq!(boat.state(), StateTag::InRadius);
    assert_eq!(boat.alarm().drop_point(), Some(drop_point()));
    assert_eq!(boat.alarm().radius_m(), Some(21));
}

#[test]
fn test_external_active_flag_toggles_watch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.json");

    let mut boat = boot(&path, Some(drop_point()));
    boat.trigger_mooring_mode().unwrap();
    assert_eq!(boat.state(), StateTag::InRadius);
    assert_eq!(boat.alarm().radius_m(), Some(15));

    edit_file(&path, "active", serde_json::json!(0));
    boat.poll_settings().unwrap();
    assert_eq!(boat.state(), StateTag::Disabled);

    edit_file(&path, "active", serde_json::json!(1));
    edit_file(&path, "radius", serde_json::json!(30));
    boat.poll_settings().unwrap();
    assert_eq!(boat.state(), StateTag::InRadius);
    assert_eq!(boat.alarm().radius_m(), Some(30));
    assert_eq!(boat.settings().get(SettingKey::Active), SettingValue::Int(1));
}

#[test]
fn test_status_file_follows_ticks() {
    let dir = TempDir::new().unwrap();
    let settings_path = dir.path().join("settings.json");
    let status_path = dir.path().join("status.json");

    let mut boat = boot(&settings_path, Some(drop_point()));
    boat.register_collaborator(Box::new(StatusFileCollaborator::new(&status_path)));
    boat.trigger_mooring_mode().unwrap();
    boat.gps_mut().0 = Some(GeoPoint::new(18.506511, -64.372900));
    boat.on_tick();

    let status: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&status_path).unwrap()).unwrap();
    assert_eq!(status["snapshot"]["state"], "ALARM_DRAGGING");
    assert_eq!(status["snapshot"]["level"], "emergency");
    assert_eq!(status["snapshot"]["params"]["current_radius_m"], 64);
    assert_eq!(status["sounding"], true);
}

#[test]
fn test_unwritable_settings_keep_watch_armed() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let path = blocker.join("settings.json");

    let mut boat = boot(&path, Some(drop_point()));
    boat.trigger_anchor_down().unwrap();
    boat.gps_mut().0 = Some(GeoPoint::new(18.506105, -64.372700));
    boat.trigger_chain_out().unwrap();
    assert_eq!(boat.state(), StateTag::InRadius);

    boat.poll_settings().unwrap();
    assert_eq!(boat.state(), StateTag::InRadius);
    assert_eq!(boat.alarm().radius_m(), Some(21));
}
