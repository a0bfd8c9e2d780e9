//! Controller
//!
//! Owns the engine and pumps it once per tick. Reads the GPS source, mirrors the
//! armed watch into the settings store and fans snapshots out to collaborators.
//! Everything here runs on the event loop; other tasks reach it through a
//! [`ControllerHandle`].

use crate::collaborator::{guarded, notify_all, Collaborator};
use crate::config::{SettingKey, SettingValue, TOLERANCE_STEP_M, TOLERANCE_TRIGGER_MAX_M};
use crate::engine::AnchorAlarm;
use crate::error::{AlarmError, AlarmResult};
use crate::gps::GpsSource;
use crate::settings::{SettingChange, SettingsStore};
use crate::snapshot::StateSnapshot;
use crate::types::{GeoPoint, Level, StateTag};
use tokio::sync::{mpsc, oneshot};

/// Operator action accepted by the controller
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    AnchorDown,
    ChainOut,
    AnchorUp,
    MuteAlarm,
    IncreaseTolerance,
    DecreaseTolerance,
    MooringMode,
    ShowMessage(Level, String),
    /// Announce the current snapshot through `show_message`
    Status,
    Set(SettingKey, SettingValue),
}

#[derive(Debug)]
pub struct Command {
    pub action: Action,
    pub reply: Option<oneshot::Sender<AlarmResult<()>>>,
}

/// Cloneable sender side of the command queue
#[derive(Clone, Debug)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    pub fn channel(capacity: usize) -> (ControllerHandle, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ControllerHandle { tx }, rx)
    }

    /// Queue an action without waiting; usable from collaborator callbacks
    pub fn send(&self, action: Action) -> AlarmResult<()> {
        let command = Command {
            action,
            reply: None,
        };
        match self.tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                log::warn!("Command queue full, dropping {:?}", cmd.action);
                Err(AlarmError::InvalidState("command queue full".to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(AlarmError::InvalidState("controller stopped".to_string()))
            }
        }
    }

    /// Queue an action and wait for its outcome
    pub async fn request(&self, action: Action) -> AlarmResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.tx
            .send(Command {
                action,
                reply: Some(reply),
            })
            .await
            .map_err(|_| AlarmError::InvalidState("controller stopped".to_string()))?;
        outcome
            .await
            .map_err(|_| AlarmError::InvalidState("controller dropped the command".to_string()))?
    }
}

pub struct Controller<S, G> {
    alarm: AnchorAlarm,
    settings: S,
    gps: G,
    collaborators: Vec<Box<dyn Collaborator>>,
    handle: ControllerHandle,
}

impl<S: SettingsStore, G: GpsSource> Controller<S, G> {
    /// Build the controller, load the configuration and restore a persisted arm
    pub fn new(settings: S, gps: G, handle: ControllerHandle) -> Self {
        let alarm = AnchorAlarm::with_configuration(settings.configuration());
        let mut controller = Controller {
            alarm,
            settings,
            gps,
            collaborators: Vec::new(),
            handle,
        };

        if controller.settings.get(SettingKey::Active).as_i64() == 1 {
            controller.restore_arm();
        }
        controller
    }

    pub fn state(&self) -> StateTag {
        self.alarm.state()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.alarm.snapshot()
    }

    pub fn alarm(&self) -> &AnchorAlarm {
        &self.alarm
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    pub fn gps_mut(&mut self) -> &mut G {
        &mut self.gps
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Add a collaborator and deliver the current snapshot to it
    pub fn register_collaborator(&mut self, mut collaborator: Box<dyn Collaborator>) {
        collaborator.set_controller(self.handle.clone());

        let snapshot = self.alarm.snapshot();
        log::info!(
            "Registering collaborator {} in state {}",
            collaborator.name(),
            snapshot.state
        );
        if let Err(e) = guarded(collaborator.as_mut(), "on_state_changed", |c| {
            c.on_state_changed(&snapshot)
        }) {
            log::error!("{}", e);
        }
        self.collaborators.push(collaborator);
    }

    pub fn collaborator_count(&self) -> usize {
        self.collaborators.len()
    }

    fn gps_position(&mut self) -> Option<GeoPoint> {
        self.gps.position()
    }

    pub fn trigger_anchor_down(&mut self) -> AlarmResult<()> {
        let position = self.gps_position();
        let result = self.alarm.anchor_down(position);
        self.process_transitions();
        result
    }

    pub fn trigger_chain_out(&mut self) -> AlarmResult<()> {
        let position = self.gps_position();
        let result = self.alarm.chain_out(position);
        self.process_transitions();
        result
    }

    pub fn trigger_anchor_up(&mut self) -> AlarmResult<()> {
        self.alarm.anchor_up();
        self.process_transitions();
        Ok(())
    }

    pub fn trigger_mute_alarm(&mut self) -> AlarmResult<()> {
        self.alarm.mute_alarm();
        self.process_transitions();
        Ok(())
    }

    pub fn trigger_increase_tolerance(&mut self) -> AlarmResult<()> {
        let tolerance = self.alarm.configuration().tolerance_m + TOLERANCE_STEP_M;
        if tolerance > TOLERANCE_TRIGGER_MAX_M {
            log::info!("Tolerance already at {}m", self.alarm.configuration().tolerance_m);
            return Ok(());
        }
        self.write_tolerance(tolerance)?;
        self.trigger_show_message(
            Level::Info,
            &format!("Increased tolerance to {} meters", tolerance),
        );
        Ok(())
    }

    pub fn trigger_decrease_tolerance(&mut self) -> AlarmResult<()> {
        let current = self.alarm.configuration().tolerance_m;
        if current < TOLERANCE_STEP_M {
            log::info!("Tolerance already at {}m", current);
            return Ok(());
        }
        let tolerance = current - TOLERANCE_STEP_M;
        self.write_tolerance(tolerance)?;
        self.trigger_show_message(
            Level::Info,
            &format!("Decreased tolerance to {} meters", tolerance),
        );
        Ok(())
    }

    fn write_tolerance(&mut self, tolerance: u16) -> AlarmResult<()> {
        self.settings
            .set(SettingKey::Tolerance, SettingValue::Int(tolerance as i64))?;
        self.apply_configuration();
        Ok(())
    }

    /// Arm around the current position with the mooring ball radius
    pub fn trigger_mooring_mode(&mut self) -> AlarmResult<()> {
        let position = self.gps_position();
        let radius = self.settings.get(SettingKey::MooringRadius).as_i64();
        let result = self.alarm.reset_state(position, Some(radius));
        self.process_transitions();

        if let Err(e) = result {
            let message = match e {
                AlarmError::InvalidState(_) => {
                    "Unable to activate mooring ball mode when anchor alarm is already enabled"
                        .to_string()
                }
                other => format!("Unable to activate mooring ball mode: {}", other),
            };
            self.trigger_show_message(Level::Error, &message);
        }
        Ok(())
    }

    pub fn trigger_show_message(&mut self, level: Level, message: &str) {
        notify_all(&mut self.collaborators, "show_message", |c| {
            c.show_message(level, message)
        });
    }

    /// Write a setting on behalf of the operator and react to it
    pub fn apply_setting(&mut self, key: SettingKey, value: SettingValue) -> AlarmResult<()> {
        let old = self.settings.get(key);
        self.settings.set(key, value)?;
        let new = self.settings.get(key);
        if old != new {
            self.on_setting_changed(&SettingChange { key, old, new });
        }
        Ok(())
    }

    /// Reconcile changes made to the store by other writers
    pub fn poll_settings(&mut self) -> AlarmResult<()> {
        let changes = self.settings.poll_changes()?;
        for change in &changes {
            self.on_setting_changed(change);
        }
        Ok(())
    }

    fn on_setting_changed(&mut self, change: &SettingChange) {
        if change.key.is_configuration() {
            self.apply_configuration();
        }

        if change.key == SettingKey::Active {
            if change.new.as_i64() == 1 {
                self.restore_arm();
            } else {
                log::info!("Disabling anchor alarm from settings");
                self.alarm.anchor_up();
                self.process_transitions();
            }
        }
    }

    fn apply_configuration(&mut self) {
        let config = self.settings.configuration();
        self.alarm.update_configuration(config);
        self.process_transitions();
    }

    fn restore_arm(&mut self) {
        let drop_point = GeoPoint::new(
            self.settings.get(SettingKey::Latitude).as_f64(),
            self.settings.get(SettingKey::Longitude).as_f64(),
        );
        let radius = self.settings.get(SettingKey::Radius).as_i64();
        log::info!("Resetting state to {} with radius {}m", drop_point, radius);

        if let Err(e) = self.alarm.reset_state(Some(drop_point), Some(radius)) {
            log::error!("Unable to restore anchor alarm: {}", e);
        }
        self.process_transitions();
    }

    /// Persist and fan out every snapshot the engine queued
    fn process_transitions(&mut self) {
        for snapshot in self.alarm.take_transitions() {
            self.persist(&snapshot);
            notify_all(&mut self.collaborators, "on_state_changed", |c| {
                c.on_state_changed(&snapshot)
            });
        }
    }

    fn persist(&mut self, snapshot: &StateSnapshot) {
        let writes: Vec<(SettingKey, SettingValue)> = match snapshot.state {
            StateTag::InRadius => match (snapshot.params.drop_point, snapshot.params.radius_m) {
                (Some(point), Some(radius)) => vec![
                    (SettingKey::Latitude, SettingValue::Float(point.latitude)),
                    (SettingKey::Longitude, SettingValue::Float(point.longitude)),
                    (SettingKey::Radius, SettingValue::Int(radius as i64)),
                    (SettingKey::Active, SettingValue::Int(1)),
                ],
                _ => return,
            },
            StateTag::Disabled => vec![(SettingKey::Active, SettingValue::Int(0))],
            _ => return,
        };

        for (key, value) in writes {
            if let Err(e) = self.settings.set(key, value) {
                log::error!("Unable to save {}: {}", key, e);
                continue;
            }
            let stored = self.settings.get(key);
            if stored != value {
                log::warn!(
                    "Saved {} as {} instead of {}, a restart will restore {}",
                    key,
                    stored,
                    value,
                    stored
                );
            }
        }
        log::info!("Saved {} state to settings", snapshot.state);
    }

    /// One decision step, then `update_state` to every collaborator
    pub fn on_tick(&mut self) {
        if self.alarm.state() != StateTag::Disabled {
            let position = self.gps_position();
            self.alarm.on_tick(position);
            self.process_transitions();
        }

        let snapshot = self.alarm.snapshot();
        notify_all(&mut self.collaborators, "update_state", |c| {
            c.update_state(&snapshot)
        });
    }

    /// Run one queued command, replying when the sender waits for it
    pub fn execute(&mut self, command: Command) {
        log::debug!("Executing {:?}", command.action);
        let result = match command.action {
            Action::AnchorDown => self.trigger_anchor_down(),
            Action::ChainOut => self.trigger_chain_out(),
            Action::AnchorUp => self.trigger_anchor_up(),
            Action::MuteAlarm => self.trigger_mute_alarm(),
            Action::IncreaseTolerance => self.trigger_increase_tolerance(),
            Action::DecreaseTolerance => self.trigger_decrease_tolerance(),
            Action::MooringMode => self.trigger_mooring_mode(),
            Action::ShowMessage(level, message) => {
                self.trigger_show_message(level, &message);
                Ok(())
            }
            Action::Status => {
                let snapshot = self.alarm.snapshot();
                self.trigger_show_message(snapshot.level, &snapshot.message);
                Ok(())
            }
            Action::Set(key, value) => self.apply_setting(key, value),
        };

        match command.reply {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = result {
                    log::warn!("{}", e);
                    self.trigger_show_message(Level::Error, &e.to_string());
                }
            }
        }
    }
}
