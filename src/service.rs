//! Event loop and operator console
//!
//! A single task owns the controller. Operator commands, console lines and the
//! 1 Hz tick are multiplexed with `select!`; input queued before a tick is
//! handled before that tick's decision.

use crate::controller::{Action, Command, Controller};
use crate::error::{AlarmError, AlarmResult};
use crate::gps::{GpsSource, SharedFix};
use crate::nmea;
use crate::settings::{parse_assignment, SettingsStore};
use crate::timer::Timer;
use crate::types::Level;
use std::io::BufRead;
use tokio::sync::mpsc;

/// Source id used for sentences typed or piped into the console
pub const CONSOLE_SOURCE: u32 = 0;

/// One parsed console line
#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleLine {
    Nmea(String),
    Action(Action),
    Exit,
}

/// Parse `command[:argument]`; lines starting with `$` are NMEA sentences
pub fn parse_console_line(line: &str) -> AlarmResult<Option<ConsoleLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.starts_with('$') {
        return Ok(Some(ConsoleLine::Nmea(line.to_string())));
    }

    let (command, argument) = match line.split_once(':') {
        Some((c, a)) => (c.trim(), a.trim()),
        None => (line, ""),
    };

    let action = match command {
        "exit" => return Ok(Some(ConsoleLine::Exit)),
        "anchor_down" => Action::AnchorDown,
        "chain_out" => Action::ChainOut,
        "anchor_up" => Action::AnchorUp,
        "mute" => Action::MuteAlarm,
        "tolerance+" => Action::IncreaseTolerance,
        "tolerance-" => Action::DecreaseTolerance,
        "mooring" => Action::MooringMode,
        "status" => Action::Status,
        "message" => Action::ShowMessage(Level::Info, argument.to_string()),
        "set" => {
            let (key, value) =
                parse_assignment(argument).map_err(|e| AlarmError::InvalidInput(e.to_string()))?;
            Action::Set(key, value)
        }
        other => {
            return Err(AlarmError::InvalidInput(format!(
                "Unknown command {}",
                other
            )))
        }
    };
    Ok(Some(ConsoleLine::Action(action)))
}

/// Forward stdin lines over a channel until EOF.
///
/// Reads on a dedicated thread so a pending read never holds up runtime shutdown.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(100);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

pub struct Service<S, G> {
    controller: Controller<S, G>,
    commands: mpsc::Receiver<Command>,
    fix: SharedFix,
    /// Poll the settings store every N ticks, 0 disables
    reload_every_ticks: u32,
}

impl<S: SettingsStore, G: GpsSource> Service<S, G> {
    pub fn new(
        controller: Controller<S, G>,
        commands: mpsc::Receiver<Command>,
        fix: SharedFix,
        reload_every_ticks: u32,
    ) -> Self {
        Service {
            controller,
            commands,
            fix,
            reload_every_ticks,
        }
    }

    /// Run until `exit` or until the timer stops. End of console input only
    /// stops reading the console. Returns the controller for inspection.
    pub async fn run<T: Timer>(
        self,
        mut timer: T,
        mut lines: mpsc::Receiver<String>,
    ) -> Controller<S, G> {
        let Service {
            mut controller,
            mut commands,
            fix,
            reload_every_ticks,
        } = self;
        let mut ticks: u64 = 0;
        let mut console_open = true;

        log::info!("Anchor alarm service started in state {}", controller.state());

        loop {
            tokio::select! {
                biased;

                Some(command) = commands.recv() => controller.execute(command),

                line = lines.recv(), if console_open => {
                    let Some(line) = line else {
                        log::info!("Console closed, watch keeps running");
                        console_open = false;
                        continue;
                    };
                    if !handle_line(&mut controller, &fix, &line) {
                        break;
                    }
                }

                alive = timer.tick() => {
                    if !alive {
                        log::info!("Timer stopped");
                        break;
                    }
                    controller.on_tick();
                    ticks += 1;

                    if reload_every_ticks > 0 && ticks % reload_every_ticks as u64 == 0 {
                        if let Err(e) = controller.poll_settings() {
                            log::warn!("Settings reload failed: {}", e);
                        }
                    }
                }
            }
        }

        log::info!("Anchor alarm service stopped after {} ticks", ticks);
        controller
    }
}

/// Returns false when the console asked to exit
fn handle_line<S: SettingsStore, G: GpsSource>(
    controller: &mut Controller<S, G>,
    fix: &SharedFix,
    line: &str,
) -> bool {
    match parse_console_line(line) {
        Ok(None) => {}
        Ok(Some(ConsoleLine::Exit)) => return false,
        Ok(Some(ConsoleLine::Nmea(sentence))) => match nmea::parse_sentence(&sentence) {
            Ok(Some(parsed)) => fix.ingest(CONSOLE_SOURCE, parsed),
            Ok(None) => log::debug!("Ignoring sentence {}", sentence),
            Err(e) => log::warn!("Bad NMEA sentence '{}': {}", sentence, e),
        },
        Ok(Some(ConsoleLine::Action(action))) => controller.execute(Command {
            action,
            reply: None,
        }),
        Err(e) => log::warn!("{}", e),
    }
    true
}
