//! Collaborators: anything that reacts to the anchor watch (alarm relays, buzzers,
//! dashboards, NMEA alert emitters, status files).
//!
//! A collaborator failing or panicking never affects the engine or the other
//! collaborators; the fault is logged and dropped.

use crate::controller::ControllerHandle;
use crate::error::{AlarmError, AlarmResult};
use crate::snapshot::StateSnapshot;
use crate::types::Level;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

pub trait Collaborator: Send {
    fn name(&self) -> &str;

    /// Called once with a handle that issues operator commands
    fn set_controller(&mut self, _handle: ControllerHandle) {}

    /// Called once per transition, in transition order
    fn on_state_changed(&mut self, _snapshot: &StateSnapshot) -> Result<()> {
        Ok(())
    }

    /// Called every tick with the current snapshot
    fn update_state(&mut self, _snapshot: &StateSnapshot) -> Result<()> {
        Ok(())
    }

    /// Operator-facing message that is not tied to a transition
    fn show_message(&mut self, _level: Level, _message: &str) -> Result<()> {
        Ok(())
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Run one notification, converting errors and panics into `CollaboratorFault`
pub fn guarded<F>(collaborator: &mut dyn Collaborator, what: &str, f: F) -> AlarmResult<()>
where
    F: FnOnce(&mut dyn Collaborator) -> Result<()>,
{
    let name = collaborator.name().to_string();
    let reason = match panic::catch_unwind(AssertUnwindSafe(|| f(collaborator))) {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => format!("{}: {:#}", what, e),
        Err(payload) => format!("{}: {}", what, panic_reason(payload)),
    };
    Err(AlarmError::CollaboratorFault { name, reason })
}

/// Notify every collaborator in registration order, logging faults
pub fn notify_all<F>(collaborators: &mut [Box<dyn Collaborator>], what: &str, mut f: F)
where
    F: FnMut(&mut dyn Collaborator) -> Result<()>,
{
    for collaborator in collaborators.iter_mut() {
        if let Err(e) = guarded(collaborator.as_mut(), what, &mut f) {
            log::error!("{}", e);
        }
    }
}

/// Mirrors transitions and operator messages into the log
#[derive(Debug, Default)]
pub struct LogCollaborator;

impl LogCollaborator {
    pub fn new() -> Self {
        LogCollaborator
    }
}

fn log_at(level: Level, text: &str) {
    match level {
        Level::Emergency | Level::Error => log::error!("{}", text),
        Level::Warning => log::warn!("{}", text),
        Level::Info => log::info!("{}", text),
    }
}

impl Collaborator for LogCollaborator {
    fn name(&self) -> &str {
        "log"
    }

    fn on_state_changed(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        log_at(snapshot.level, &format!("[{}] {}", snapshot.state, snapshot.message));
        Ok(())
    }

    fn update_state(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        log::debug!("[{}] {}", snapshot.state, snapshot.short_message);
        Ok(())
    }

    fn show_message(&mut self, level: Level, message: &str) -> Result<()> {
        log_at(level, message);
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
struct OperatorMessage {
    timestamp: DateTime<Utc>,
    level: Level,
    message: String,
}

#[derive(Serialize)]
struct StatusRecord<'a> {
    timestamp: DateTime<Utc>,
    sounding: bool,
    snapshot: &'a StateSnapshot,
    last_message: Option<&'a OperatorMessage>,
}

/// Keeps a JSON file with the latest snapshot for dashboards and scripts
pub struct StatusFileCollaborator {
    path: PathBuf,
    last_message: Option<OperatorMessage>,
}

impl StatusFileCollaborator {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        StatusFileCollaborator {
            path: path.into(),
            last_message: None,
        }
    }

    fn save(&self, snapshot: &StateSnapshot) -> Result<()> {
        let record = StatusRecord {
            timestamp: Utc::now(),
            sounding: snapshot.is_sounding(),
            snapshot,
            last_message: self.last_message.as_ref(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Collaborator for StatusFileCollaborator {
    fn name(&self) -> &str {
        "status-file"
    }

    fn on_state_changed(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        self.save(snapshot)
    }

    fn update_state(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        self.save(snapshot)
    }

    fn show_message(&mut self, level: Level, message: &str) -> Result<()> {
        self.last_message = Some(OperatorMessage {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
        });
        Ok(())
    }
}
