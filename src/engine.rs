//! Anchor watch decision engine
//!
//! Finite state machine driven by a 1 Hz position tick. Every state change
//! queues exactly one [`StateSnapshot`]; the owner drains them with
//! [`AnchorAlarm::take_transitions`] after each call.
//!
//! Counter resets tied to a destination state run before the snapshot is built:
//! - `IN_RADIUS` clears `out_of_radius_count`
//! - any alarm entry (muted or not) clears `alarm_muted_count`
//! - `DISABLED` clears every optional field and counter

use crate::config::Configuration;
use crate::error::{AlarmError, AlarmResult};
use crate::geodesy::rounded_distance;
use crate::snapshot::{SnapshotParams, StateSnapshot};
use crate::types::{GeoPoint, StateTag};

/// Events that may move the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Trigger {
    SetDropPoint,
    SetRadius,
    AnchorDragging,
    NoGps,
    InRadius,
    AlarmMuted,
    ToleranceUpdated,
    ResetState,
    AnchorUp,
    Fault,
}

impl Trigger {
    /// Destination for this trigger from `from`, `None` when the pair is not permitted
    fn target(self, from: StateTag) -> Option<StateTag> {
        use StateTag::*;

        match (self, from) {
            (Trigger::SetDropPoint, Disabled) => Some(DropPointSet),

            (Trigger::SetRadius, DropPointSet | AlarmDragging | AlarmDraggingMuted) => {
                Some(InRadius)
            }

            (
                Trigger::AnchorDragging,
                InRadius | AlarmDraggingMuted | AlarmNoGps | AlarmNoGpsMuted,
            ) => Some(AlarmDragging),

            (Trigger::NoGps, InRadius | AlarmNoGpsMuted) => Some(AlarmNoGps),

            (Trigger::InRadius, AlarmNoGps | AlarmNoGpsMuted) => Some(InRadius),

            (Trigger::AlarmMuted, AlarmDragging) => Some(AlarmDraggingMuted),
            (Trigger::AlarmMuted, AlarmNoGps) => Some(AlarmNoGpsMuted),

            (Trigger::ToleranceUpdated, AlarmDragging | AlarmDraggingMuted) => Some(InRadius),

            (Trigger::ResetState, Disabled) => Some(InRadius),

            (Trigger::AnchorUp, Disabled) => None,
            (Trigger::AnchorUp, _) => Some(Disabled),

            (Trigger::Fault, _) => Some(Disabled),

            _ => None,
        }
    }
}

/// Single-vessel, single-anchor watch
pub struct AnchorAlarm {
    config: Configuration,

    state: StateTag,
    drop_point: Option<GeoPoint>,
    radius_m: Option<u32>,
    current_radius_m: Option<u32>,
    no_gps_count: u32,
    out_of_radius_count: u32,
    alarm_muted_count: u32,

    /// Cause of the last fatal self-reset, shown while DISABLED
    fault: Option<String>,
    transitions: Vec<StateSnapshot>,
}

impl AnchorAlarm {
    pub fn new() -> Self {
        Self::with_configuration(Configuration::default())
    }

    pub fn with_configuration(config: Configuration) -> Self {
        AnchorAlarm {
            config: config.clamped(),
            state: StateTag::Disabled,
            drop_point: None,
            radius_m: None,
            current_radius_m: None,
            no_gps_count: 0,
            out_of_radius_count: 0,
            alarm_muted_count: 0,
            fault: None,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> StateTag {
        self.state
    }

    pub fn configuration(&self) -> Configuration {
        self.config
    }

    pub fn drop_point(&self) -> Option<GeoPoint> {
        self.drop_point
    }

    pub fn radius_m(&self) -> Option<u32> {
        self.radius_m
    }

    pub fn current_radius_m(&self) -> Option<u32> {
        self.current_radius_m
    }

    pub fn no_gps_count(&self) -> u32 {
        self.no_gps_count
    }

    pub fn out_of_radius_count(&self) -> u32 {
        self.out_of_radius_count
    }

    pub fn alarm_muted_count(&self) -> u32 {
        self.alarm_muted_count
    }

    /// Snapshots queued by transitions since the last call, oldest first
    pub fn take_transitions(&mut self) -> Vec<StateSnapshot> {
        std::mem::take(&mut self.transitions)
    }

    /// Fresh snapshot of the current state. No side effects.
    pub fn snapshot(&self) -> StateSnapshot {
        let params = SnapshotParams {
            state: self.state,
            tolerance_m: self.config.tolerance_m,
            drop_point: self.drop_point,
            radius_m: self.radius_m,
            current_radius_m: self.current_radius_m,
            no_gps_count: self.no_gps_count,
            out_of_radius_count: self.out_of_radius_count,
            alarm_muted_count: self.alarm_muted_count,
        };
        let fault = match self.state {
            StateTag::Disabled => self.fault.as_deref(),
            _ => None,
        };
        StateSnapshot::build(params, fault)
    }

    /// Replace the active configuration.
    ///
    /// A tolerance increase that brings the last measurement back inside the safe
    /// circle ends a dragging episode immediately; every other change applies on
    /// the next tick.
    pub fn update_configuration(&mut self, config: Configuration) {
        let config = config.clamped();
        let previous = self.config;
        self.config = config;

        if self.state.is_muted() {
            self.alarm_muted_count = self
                .alarm_muted_count
                .min(config.mute_duration_ticks as u32);
        }

        if config.tolerance_m == previous.tolerance_m {
            return;
        }
        log::info!("Tolerance updated to {}m", config.tolerance_m);

        if config.tolerance_m < previous.tolerance_m || !self.state.is_dragging() {
            return;
        }
        if let (Some(current), Some(radius)) = (self.current_radius_m, self.radius_m) {
            if (current as u64) < radius as u64 + config.tolerance_m as u64 {
                self.out_of_radius_count = 0;
                self.fire(Trigger::ToleranceUpdated);
            }
        }
    }

    /// Record the drop point. Only valid while DISABLED.
    pub fn anchor_down(&mut self, position: Option<GeoPoint>) -> AlarmResult<()> {
        if self.state != StateTag::Disabled {
            return Err(AlarmError::InvalidState(format!(
                "Cannot set drop point in state {}",
                self.state
            )));
        }

        let position = match position {
            Some(p) if p.is_valid() => p,
            Some(p) => {
                return Err(AlarmError::InvalidInput(format!(
                    "Drop point {} is out of range",
                    p
                )))
            }
            None => {
                return Err(AlarmError::InvalidInput(
                    "Unable to get GPS position for drop point.".to_string(),
                ))
            }
        };

        self.drop_point = Some(position);
        self.fire(Trigger::SetDropPoint);
        log::info!("Set new drop point to {}", position);
        Ok(())
    }

    /// Arm the watch: the distance from the drop point to `position` becomes the radius.
    ///
    /// Also re-arms with a new radius while dragging. Ignored in other states.
    pub fn chain_out(&mut self, position: Option<GeoPoint>) -> AlarmResult<()> {
        if !matches!(
            self.state,
            StateTag::DropPointSet | StateTag::AlarmDragging | StateTag::AlarmDraggingMuted
        ) {
            log::debug!("chain_out ignored in state {}", self.state);
            return Ok(());
        }

        let drop_point = match self.drop_point {
            Some(p) => p,
            None => {
                return Err(self.fatal(
                    "Unable to calculate radius: no anchor drop point defined.".to_string(),
                ))
            }
        };

        let position = match position.filter(GeoPoint::is_valid) {
            Some(p) => p,
            None if self.state == StateTag::DropPointSet => {
                return Err(self.fatal(
                    "Unable to calculate radius: no GPS position given to calculate radius."
                        .to_string(),
                ))
            }
            None => {
                return Err(AlarmError::InvalidInput(
                    "No GPS position to calculate a new radius, alarm stays raised.".to_string(),
                ))
            }
        };

        let radius = rounded_distance(&drop_point, &position);
        self.radius_m = Some(radius);
        self.current_radius_m = Some(radius);
        self.out_of_radius_count = 0;
        self.fire(Trigger::SetRadius);
        log::info!("Set new radius to {}m", radius);
        Ok(())
    }

    /// Disable the watch. Idempotent.
    pub fn anchor_up(&mut self) {
        self.fire(Trigger::AnchorUp);
    }

    /// Silence a sounding alarm for `mute_duration_ticks`. No-op unless sounding.
    pub fn mute_alarm(&mut self) {
        self.fire(Trigger::AlarmMuted);
    }

    /// Rebuild an armed watch after a restart. Only valid while DISABLED.
    pub fn reset_state(&mut self, drop_point: Option<GeoPoint>, radius: Option<i64>) -> AlarmResult<()> {
        if self.state != StateTag::Disabled {
            return Err(AlarmError::InvalidState(
                "Cannot reset anchor alarm state if not disabled".to_string(),
            ));
        }

        let drop_point = drop_point.filter(GeoPoint::is_valid).ok_or_else(|| {
            AlarmError::InvalidInput(
                "Cannot reset anchor alarm state without valid drop point".to_string(),
            )
        })?;
        let radius = radius.ok_or_else(|| {
            AlarmError::InvalidInput("Cannot reset anchor alarm state without valid radius".to_string())
        })?;
        let radius = u32::try_from(radius).map_err(|_| {
            AlarmError::InvalidInput(format!("Radius {} is out of range", radius))
        })?;

        self.drop_point = Some(drop_point);
        self.radius_m = Some(radius);
        self.current_radius_m = Some(radius);
        self.out_of_radius_count = 0;
        self.fire(Trigger::ResetState);
        log::info!("Reset state to {} with radius {}m", drop_point, radius);
        Ok(())
    }

    /// Periodic decision, nominally once per second. `None` means no usable fix.
    pub fn on_tick(&mut self, position: Option<GeoPoint>) {
        let state = self.state;
        if !state.is_watching() {
            return;
        }

        let should_transition = if state.is_muted()
            && self.alarm_muted_count < self.config.mute_duration_ticks as u32
        {
            self.alarm_muted_count += 1;
            false
        } else if matches!(state, StateTag::AlarmDragging | StateTag::AlarmNoGps) {
            false
        } else {
            self.alarm_muted_count = 0;
            true
        };
        let is_anchor_dragging = state.is_dragging();

        let position = match position.filter(GeoPoint::is_valid) {
            Some(p) => p,
            None => {
                self.no_gps_count = self.no_gps_count.saturating_add(1);
                self.current_radius_m = None;

                if is_anchor_dragging {
                    // the episode keeps counting while blind
                    self.out_of_radius_count = self.out_of_radius_count.saturating_add(1);
                    if should_transition {
                        self.fire(Trigger::AnchorDragging);
                    }
                }

                if self.no_gps_count > self.config.no_gps_grace_ticks as u32 && should_transition {
                    self.fire(Trigger::NoGps);
                }
                return;
            }
        };

        self.no_gps_count = 0;

        let (drop_point, radius) = match (self.drop_point, self.radius_m) {
            (Some(p), Some(r)) => (p, r),
            _ => {
                let _ = self.fatal(format!("Watching in state {} without an armed radius.", state));
                return;
            }
        };

        let distance = rounded_distance(&drop_point, &position);
        self.current_radius_m = Some(distance);

        if distance as u64 >= radius as u64 + self.config.tolerance_m as u64 {
            self.out_of_radius_count = self.out_of_radius_count.saturating_add(1);

            // dragging dominates a no-GPS alarm, muted or not
            let elevate = should_transition
                || matches!(state, StateTag::AlarmNoGps | StateTag::AlarmNoGpsMuted);
            if elevate {
                self.fire(Trigger::AnchorDragging);
            }
        } else if is_anchor_dragging {
            // back inside does not end the episode
            self.out_of_radius_count = self.out_of_radius_count.saturating_add(1);
        } else {
            self.out_of_radius_count = 0;
            if state != StateTag::InRadius {
                self.fire(Trigger::InRadius);
            }
        }
    }

    /// Apply `trigger`; returns false when the pair is not permitted
    fn fire(&mut self, trigger: Trigger) -> bool {
        match trigger.target(self.state) {
            Some(to) => {
                self.enter(to, None);
                true
            }
            None => {
                log::debug!("{:?} ignored in state {}", trigger, self.state);
                false
            }
        }
    }

    fn fatal(&mut self, cause: String) -> AlarmError {
        log::error!("Anchor alarm fault in state {}: {}", self.state, cause);
        if let Some(to) = Trigger::Fault.target(self.state) {
            self.enter(to, Some(cause.clone()));
        }
        AlarmError::FatalInvariant(cause)
    }

    fn enter(&mut self, to: StateTag, fault: Option<String>) {
        let from = self.state;
        self.state = to;
        self.fault = fault;

        match to {
            StateTag::Disabled => {
                self.drop_point = None;
                self.radius_m = None;
                self.current_radius_m = None;
                self.no_gps_count = 0;
                self.out_of_radius_count = 0;
                self.alarm_muted_count = 0;
            }
            StateTag::InRadius => {
                self.out_of_radius_count = 0;
            }
            StateTag::AlarmDragging
            | StateTag::AlarmDraggingMuted
            | StateTag::AlarmNoGps
            | StateTag::AlarmNoGpsMuted => {
                self.alarm_muted_count = 0;
            }
            StateTag::DropPointSet => {}
        }

        log::info!("Anchor alarm {} -> {}", from, to);
        let snapshot = self.snapshot();
        self.transitions.push(snapshot);
    }
}

impl Default for AnchorAlarm {
    fn default() -> Self {
        Self::new()
    }
}
