use crate::types::{GeoPoint, Level, StateTag};
use serde::{Deserialize, Serialize};

/// Raw engine fields carried in every snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotParams {
    pub state: StateTag,
    pub tolerance_m: u16,
    pub drop_point: Option<GeoPoint>,
    pub radius_m: Option<u32>,
    pub current_radius_m: Option<u32>,
    pub no_gps_count: u32,
    pub out_of_radius_count: u32,
    pub alarm_muted_count: u32,
}

/// Immutable view of the anchor watch handed to collaborators
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub state: StateTag,
    pub message: String,
    /// Abbreviated message for small dashboard widgets
    pub short_message: String,
    pub level: Level,
    pub muted: bool,
    pub params: SnapshotParams,
}

impl StateSnapshot {
    /// Render the snapshot for `params`. `fault` names the cause of a fatal self-reset.
    pub fn build(params: SnapshotParams, fault: Option<&str>) -> Self {
        let (level, message, short_message) = render(&params, fault);
        StateSnapshot {
            state: params.state,
            message,
            short_message,
            level,
            muted: params.state.is_muted(),
            params,
        }
    }

    pub fn is_alarm(&self) -> bool {
        self.state.is_alarm()
    }

    /// Alarm raised and not silenced, ie. sirens and relays should be on
    pub fn is_sounding(&self) -> bool {
        self.state.is_alarm() && !self.muted
    }
}

fn render(p: &SnapshotParams, fault: Option<&str>) -> (Level, String, String) {
    let radius = p.radius_m.unwrap_or(0);

    match p.state {
        StateTag::Disabled => match fault {
            Some(cause) => (
                Level::Error,
                format!("Anchor alarm DISABLED. {}", cause),
                "Disabled (fault)".to_string(),
            ),
            None => (
                Level::Info,
                "Anchor alarm DISABLED, anchor raised.".to_string(),
                "Disabled".to_string(),
            ),
        },

        StateTag::DropPointSet => (
            Level::Info,
            "Drop point set, let chain out; arm when scope is deployed.".to_string(),
            "Drop point set".to_string(),
        ),

        StateTag::InRadius => match p.current_radius_m {
            Some(current) => (
                Level::Info,
                format!(
                    "Anchor alarm ENABLED, currently {}m of {}m with {}m tolerance.",
                    current, radius, p.tolerance_m
                ),
                format!("{}m/{}m", current, radius),
            ),
            None => (
                Level::Info,
                format!(
                    "Anchor alarm ENABLED, temporarily no GPS for {} seconds.",
                    p.no_gps_count
                ),
                format!("No GPS {}s", p.no_gps_count),
            ),
        },

        StateTag::AlarmNoGps | StateTag::AlarmNoGpsMuted => (
            Level::Emergency,
            format!("No GPS position for {} seconds.", p.no_gps_count),
            format!("NO GPS {}s", p.no_gps_count),
        ),

        StateTag::AlarmDragging | StateTag::AlarmDraggingMuted => {
            let message = match p.current_radius_m {
                None => format!(
                    "Anchor dragging for {} seconds, temporarily no GPS.",
                    p.out_of_radius_count
                ),
                Some(current) if current > radius => format!(
                    "Anchor dragging for {} seconds, {}m out of {}m radius.",
                    p.out_of_radius_count,
                    current - radius,
                    radius
                ),
                Some(current) => format!(
                    "Anchor dragging for {} seconds, temporarily back in safe radius: {}m of {}m.",
                    p.out_of_radius_count, current, radius
                ),
            };
            let short = match p.current_radius_m {
                Some(current) if current > radius => format!("DRAGGING +{}m", current - radius),
                Some(current) => format!("DRAGGING {}m/{}m", current, radius),
                None => "DRAGGING, no GPS".to_string(),
            };
            (Level::Emergency, message, short)
        }
    }
}
