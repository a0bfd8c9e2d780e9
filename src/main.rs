use anchor_alarm_rs::service::{spawn_stdin_reader, Service};
use anchor_alarm_rs::timer::IntervalTimer;
use anchor_alarm_rs::{
    Controller, ControllerHandle, FixedPosition, GeoPoint, GpsChain, JsonFileSettings,
    LogCollaborator, SharedFix, StatusFileCollaborator,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "anchor_alarm")]
#[command(about = "Anchor drag alarm - watches the GPS position against a safe radius", long_about = None)]
struct Args {
    /// Settings file (JSON), created on first write
    #[arg(long, default_value = "anchor_alarm_settings.json")]
    settings: PathBuf,

    /// Mirror the latest snapshot to this JSON file
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Fallback GPS position "LAT,LON" used when no NMEA fix is fresh
    #[arg(long, value_parser = parse_position, allow_hyphen_values = true)]
    position: Option<GeoPoint>,

    /// NMEA fixes older than this are dropped (milliseconds)
    #[arg(long, default_value = "2000")]
    gps_timeout_ms: u64,

    /// Settings reload cadence in seconds (0 = never)
    #[arg(long, default_value = "5")]
    reload_secs: u32,
}

fn parse_position(s: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", s))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("bad latitude '{}'", lat))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("bad longitude '{}'", lon))?;
    let point = GeoPoint::new(lat, lon);
    if !point.is_valid() {
        return Err(format!("position {} out of range", point));
    }
    Ok(point)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let settings = JsonFileSettings::open(&args.settings)
        .with_context(|| format!("Failed to open settings {}", args.settings.display()))?;

    let fix = SharedFix::new(Duration::from_millis(args.gps_timeout_ms));
    let mut gps = GpsChain::new();
    gps.push(fix.clone());
    if let Some(position) = args.position {
        log::info!("Fallback GPS position {}", position);
        gps.push(FixedPosition(Some(position)));
    }

    let (handle, commands) = ControllerHandle::channel(64);
    let mut controller = Controller::new(settings, gps, handle);
    controller.register_collaborator(Box::new(LogCollaborator::new()));
    if let Some(path) = args.status_file {
        log::info!("Writing status to {}", path.display());
        controller.register_collaborator(Box::new(StatusFileCollaborator::new(path)));
    }

    println!("Anchor alarm. Commands: anchor_down, chain_out, anchor_up, mute, tolerance+, tolerance-, mooring, status, set:<key>=<value>, message:<text>, exit");
    println!("Lines starting with $ are read as NMEA sentences.");

    let lines = spawn_stdin_reader();
    let service = Service::new(controller, commands, fix, args.reload_secs);
    let controller = service.run(IntervalTimer::every_second(), lines).await;

    log::info!("Exiting in state {}", controller.state());
    Ok(())
}
