//! Persistent settings
//!
//! Flat key/value store holding the watch configuration and the armed watch
//! (drop point, radius, active flag) so it survives a restart. Writers other
//! than the controller (an operator editing the file, a dashboard) are picked up
//! through [`SettingsStore::poll_changes`].

use crate::config::{Configuration, SettingKey, SettingValue};
use crate::error::SettingsError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A value changed by another writer
#[derive(Clone, Debug, PartialEq)]
pub struct SettingChange {
    pub key: SettingKey,
    pub old: SettingValue,
    pub new: SettingValue,
}

pub trait SettingsStore {
    /// Current value, or the key's default when never written
    fn get(&self, key: SettingKey) -> SettingValue;

    /// Write a value, clamped into the key's range
    fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError>;

    /// Changes made by other writers since the last poll. Own writes are not reported.
    fn poll_changes(&mut self) -> Result<Vec<SettingChange>, SettingsError>;

    fn configuration(&self) -> Configuration {
        let ticks = |key: SettingKey| self.get(key).as_i64().clamp(0, u16::MAX as i64) as u16;
        Configuration::new(
            ticks(SettingKey::Tolerance),
            ticks(SettingKey::NoGpsGraceTicks),
            ticks(SettingKey::MuteDurationTicks),
        )
    }
}

/// Parse an operator assignment such as `tolerance_m=25`
pub fn parse_assignment(text: &str) -> Result<(SettingKey, SettingValue), SettingsError> {
    let (name, raw) = text.split_once('=').ok_or_else(|| SettingsError::InvalidValue {
        key: text.trim().to_string(),
        value: String::new(),
    })?;
    let name = name.trim();
    let raw = raw.trim();

    let key = SettingKey::from_name(name).ok_or_else(|| SettingsError::UnknownKey(name.to_string()))?;
    let value = if let Ok(i) = raw.parse::<i64>() {
        SettingValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        SettingValue::Float(f)
    } else {
        return Err(SettingsError::InvalidValue {
            key: name.to_string(),
            value: raw.to_string(),
        });
    };
    Ok((key, value))
}

fn diff(
    old: &BTreeMap<SettingKey, SettingValue>,
    new: &BTreeMap<SettingKey, SettingValue>,
) -> Vec<SettingChange> {
    SettingKey::ALL
        .iter()
        .filter_map(|&key| {
            let before = old.get(&key).copied().unwrap_or_else(|| key.default_value());
            let after = new.get(&key).copied().unwrap_or_else(|| key.default_value());
            (before != after).then_some(SettingChange {
                key,
                old: before,
                new: after,
            })
        })
        .collect()
}

/// Process-local store; used by tests and when no settings file is wanted
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: BTreeMap<SettingKey, SettingValue>,
    pending: Vec<SettingChange>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: SettingKey, value: SettingValue) -> Self {
        self.values.insert(key, key.coerce(value));
        self
    }

    /// Simulate a write by another party, reported by the next poll
    pub fn set_external(&mut self, key: SettingKey, value: SettingValue) {
        let old = self.get(key);
        let new = key.coerce(value);
        self.values.insert(key, new);
        if old != new {
            self.pending.push(SettingChange { key, old, new });
        }
    }
}

impl SettingsStore for InMemorySettings {
    fn get(&self, key: SettingKey) -> SettingValue {
        self.values
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value())
    }

    fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        self.values.insert(key, key.coerce(value));
        Ok(())
    }

    fn poll_changes(&mut self) -> Result<Vec<SettingChange>, SettingsError> {
        Ok(std::mem::take(&mut self.pending))
    }
}

/// Settings persisted as a pretty-printed JSON object keyed by setting name
pub struct JsonFileSettings {
    path: PathBuf,
    values: BTreeMap<SettingKey, SettingValue>,
}

impl JsonFileSettings {
    /// Load `path`; a missing file yields defaults and is created on first write
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref().to_path_buf();
        let values = Self::load(&path)?;
        log::info!(
            "Loaded {} settings from {}",
            values.len(),
            path.display()
        );
        Ok(JsonFileSettings { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<SettingKey, SettingValue>, SettingsError> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let text = fs::read_to_string(path)?;
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&text)?;

        let mut values = BTreeMap::new();
        for (name, value) in raw {
            let key = match SettingKey::from_name(&name) {
                Some(key) => key,
                None => {
                    log::warn!("Ignoring unknown setting '{}' in {}", name, path.display());
                    continue;
                }
            };
            match serde_json::from_value::<SettingValue>(value) {
                Ok(v) => {
                    values.insert(key, key.coerce(v));
                }
                Err(_) => log::warn!("Setting '{}' is not a number, using default", name),
            }
        }
        Ok(values)
    }

    /// Write to a sibling temp file then rename over the target
    fn save(&self) -> Result<(), SettingsError> {
        let raw: BTreeMap<&str, SettingValue> =
            self.values.iter().map(|(k, v)| (k.name(), *v)).collect();
        let json = serde_json::to_string_pretty(&raw)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: SettingKey) -> SettingValue {
        self.values
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_value())
    }

    fn set(&mut self, key: SettingKey, value: SettingValue) -> Result<(), SettingsError> {
        let value = key.coerce(value);
        if self.values.get(&key) == Some(&value) {
            return Ok(());
        }
        let previous = self.values.insert(key, value);
        if let Err(e) = self.save() {
            // keep memory in step with the file
            match previous {
                Some(v) => self.values.insert(key, v),
                None => self.values.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn poll_changes(&mut self) -> Result<Vec<SettingChange>, SettingsError> {
        let fresh = Self::load(&self.path)?;
        let changes = diff(&self.values, &fresh);
        self.values = fresh;
        for change in &changes {
            log::info!(
                "Setting {} changed externally: {} -> {}",
                change.key,
                change.old,
                change.new
            );
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_defaults() {
        let store = InMemorySettings::new();
        assert_eq!(store.get(SettingKey::Tolerance), SettingValue::Int(15));
        assert_eq!(store.configuration(), Configuration::default());
    }

    #[test]
    fn test_in_memory_own_writes_not_reported() {
        let mut store = InMemorySettings::new();
        store.set(SettingKey::Tolerance, SettingValue::Int(25)).unwrap();
        assert_eq!(store.get(SettingKey::Tolerance), SettingValue::Int(25));
        assert!(store.poll_changes().unwrap().is_empty());
    }

    #[test]
    fn test_in_memory_external_writes_reported_once() {
        let mut store = InMemorySettings::new();
        store.set_external(SettingKey::MuteDurationTicks, SettingValue::Int(10));
        store.set_external(SettingKey::Tolerance, SettingValue::Int(15));

        let changes = store.poll_changes().unwrap();
        assert_eq!(
            changes,
            vec![SettingChange {
                key: SettingKey::MuteDurationTicks,
                old: SettingValue::Int(30),
                new: SettingValue::Int(10),
            }]
        );
        assert!(store.poll_changes().unwrap().is_empty());
    }

    #[test]
    fn test_set_clamps() {
        let mut store = InMemorySettings::new();
        store.set(SettingKey::MooringRadius, SettingValue::Int(1000)).unwrap();
        assert_eq!(store.get(SettingKey::MooringRadius), SettingValue::Int(256));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("tolerance_m=25").unwrap(),
            (SettingKey::Tolerance, SettingValue::Int(25))
        );
        assert_eq!(
            parse_assignment(" latitude = 18.5 ").unwrap(),
            (SettingKey::Latitude, SettingValue::Float(18.5))
        );
        assert!(matches!(
            parse_assignment("depth=4"),
            Err(SettingsError::UnknownKey(_))
        ));
        assert!(matches!(
            parse_assignment("radius=deep"),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(parse_assignment("radius").is_err());
    }

    #[test]
    fn test_json_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileSettings::open(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(SettingKey::Active), SettingValue::Int(0));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_json_write_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = JsonFileSettings::open(&path).unwrap();
        store.set(SettingKey::Latitude, SettingValue::Float(18.5060715)).unwrap();
        store.set(SettingKey::Radius, SettingValue::Int(21)).unwrap();
        store.set(SettingKey::Active, SettingValue::Int(1)).unwrap();
        assert!(store.poll_changes().unwrap().is_empty());

        let reopened = JsonFileSettings::open(&path).unwrap();
        assert_eq!(reopened.get(SettingKey::Latitude), SettingValue::Float(18.5060715));
        assert_eq!(reopened.get(SettingKey::Radius), SettingValue::Int(21));
        assert_eq!(reopened.get(SettingKey::Active), SettingValue::Int(1));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_external_edit_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = JsonFileSettings::open(&path).unwrap();
        store.set(SettingKey::Tolerance, SettingValue::Int(20)).unwrap();

        fs::write(
            &path,
            r#"{ "tolerance_m": 35, "mute_duration_ticks": 900, "depth": 4, "radius": "far" }"#,
        )
        .unwrap();

        let changes = store.poll_changes().unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].key, SettingKey::Tolerance);
        assert_eq!(changes[0].old, SettingValue::Int(20));
        assert_eq!(changes[0].new, SettingValue::Int(35));
        assert_eq!(changes[1].key, SettingKey::MuteDurationTicks);
        assert_eq!(changes[1].new, SettingValue::Int(300));

        assert_eq!(store.configuration(), Configuration::new(35, 30, 300));
        assert!(store.poll_changes().unwrap().is_empty());
    }

    #[test]
    fn test_json_failed_save_rolls_back() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut store = JsonFileSettings::open(blocker.join("settings.json")).unwrap();
        assert!(store.set(SettingKey::Active, SettingValue::Int(1)).is_err());
        assert_eq!(store.get(SettingKey::Active), SettingValue::Int(0));
        assert!(store.poll_changes().unwrap().is_empty());
    }

    #[test]
    fn test_json_corrupt_file_keeps_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = JsonFileSettings::open(&path).unwrap();
        store.set(SettingKey::Tolerance, SettingValue::Int(20)).unwrap();
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(store.poll_changes(), Err(SettingsError::Parse(_))));
        assert_eq!(store.get(SettingKey::Tolerance), SettingValue::Int(20));
    }
}
