use anyhow::{bail, Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use prometheus_arbiter::input::{InputEvent, InputQueue, JoystickSample, KeyCode, KeyHandler};
use prometheus_arbiter::lifecycle::LifecycleNode;
use prometheus_arbiter::transport::tcp::DEFAULT_PORT;
use prometheus_arbiter::transport::{SimConfig, SimulatedRobot, TcpRobot};
use prometheus_arbiter::{ControlLoop, CoreError, Mode, ModeController, RobotTransport, ShutdownHandle};
use std::collections::HashMap;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Drive the robot by keyboard or let it wander on its own.
/// Press 't' for teleoperation, 'w' for wander and 'q' to quit
#[derive(Parser, Debug)]
#[command(name = "teleop_wander", version, about)]
struct Cli {
    /// Robot server host
    #[arg(long, env = "PROMETHEUS_ROBOT_HOST", default_value = "10.0.126.18")]
    robot_host: String,

    /// Robot server port
    #[arg(long, env = "PROMETHEUS_ROBOT_PORT", default_value_t = DEFAULT_PORT)]
    robot_port: u16,

    /// Drive the built-in simulator instead of a robot
    #[arg(long)]
    simulate: bool,

    /// Mode to start in (teleop or wander)
    #[arg(long, default_value = "teleop")]
    start_mode: Mode,

    /// Simulator cycle length in milliseconds
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    cycle_ms: u64,

    /// Joystick samples arrive on stdin as "joy <x> <y> <trigger>"
    #[arg(long)]
    joystick: bool,

    /// Action parameter override, "<action>:<key>=<value>"; repeatable
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<ActionParam>,
}

#[derive(Debug, Clone, PartialEq)]
struct ActionParam {
    action: String,
    key: String,
    value: f64,
}

fn parse_param(raw: &str) -> std::result::Result<ActionParam, String> {
    let (action, assignment) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected <action>:<key>=<value>, got '{}'", raw))?;
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| format!("missing '=' in '{}'", raw))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value in '{}': {}", raw, e))?;
    Ok(ActionParam {
        action: action.trim().to_string(),
        key: key.trim().to_string(),
        value,
    })
}

/// Apply parameter overrides to whichever group holds each named action
fn configure_actions(modes: &ModeController, params: &[ActionParam]) -> Result<()> {
    let mut by_action: HashMap<&str, HashMap<String, f64>> = HashMap::new();
    for param in params {
        by_action
            .entry(param.action.as_str())
            .or_default()
            .insert(param.key.clone(), param.value);
    }

    for (action, values) in by_action {
        let mut found = false;
        for mode in Mode::ALL {
            let Some(group) = modes.group(mode) else {
                continue;
            };
            match group.configure_action(action, &values) {
                Ok(()) => {
                    info!("Configured '{}' in {} mode: {:?}", action, mode, values);
                    found = true;
                }
                Err(CoreError::UnknownAction(_)) => {}
                Err(e) => return Err(e).with_context(|| format!("configuring '{}'", action)),
            }
        }
        if !found {
            bail!(CoreError::UnknownAction(action.to_string()));
        }
    }
    Ok(())
}

/// Decode one line from the terminal into input events
fn decode_line(line: &str, joystick: bool) -> Vec<InputEvent> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix("joy ") {
        if !joystick {
            return Vec::new();
        }
        let fields: Vec<f64> = rest
            .split_whitespace()
            .filter_map(|f| f.parse().ok())
            .collect();
        return match fields.as_slice() {
            [x, y, trigger] => vec![InputEvent::Joystick(JoystickSample {
                x: *x,
                y: *y,
                trigger: *trigger != 0.0,
            })],
            _ => {
                warn!("Ignoring malformed joystick line '{}'", trimmed);
                Vec::new()
            }
        };
    }

    // a bare newline is the space bar of a line-buffered terminal
    if line.chars().all(|c| c == '\n' || c == '\r') {
        return vec![InputEvent::Key(KeyCode::Space)];
    }
    line.chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| {
            InputEvent::Key(match c {
                'i' => KeyCode::Up,
                'k' => KeyCode::Down,
                'j' => KeyCode::Left,
                'l' => KeyCode::Right,
                ' ' => KeyCode::Space,
                'q' | '\u{1b}' => KeyCode::Escape,
                other => KeyCode::Char(other),
            })
        })
        .collect()
}

/// Read the terminal on a plain thread so a blocked read never holds up exit
fn spawn_key_reader(keys: KeyHandler, joystick: bool, shutdown: ShutdownHandle) -> Result<()> {
    thread::Builder::new()
        .name("keyboard".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Keyboard read failed: {}", e);
                        break;
                    }
                };
                for event in decode_line(&line, joystick) {
                    keys.handle(event);
                }
                if shutdown.is_requested() {
                    break;
                }
            }
            debug!("Keyboard reader finished");
        })
        .context("starting the keyboard reader")?;
    Ok(())
}

fn build_transport(cli: &Cli) -> Box<dyn RobotTransport> {
    if cli.simulate {
        let config = SimConfig {
            period: Duration::from_millis(cli.cycle_ms),
            realtime: true,
            ..SimConfig::default()
        };
        Box::new(SimulatedRobot::demo(config))
    } else {
        Box::new(TcpRobot::new(&cli.robot_host, cli.robot_port))
    }
}

async fn run(cli: Cli) -> Result<()> {
    let modes = ModeController::standard(cli.joystick);
    configure_actions(&modes, &cli.params)?;
    let modes = Arc::new(modes);

    if !cli.joystick {
        println!("Note: Do not have a joystick, only the arrow keys on the keyboard will work.");
    }

    let queue = InputQueue::new();
    let shutdown = ShutdownHandle::new();
    let mut keys = KeyHandler::new(queue.clone());
    modes.register_key_handlers(&mut keys);
    {
        let shutdown = shutdown.clone();
        keys.add_key_handler(KeyCode::Escape, move || {
            info!("Escape pressed, shutting down");
            shutdown.request();
        });
    }

    let mut control =
        ControlLoop::new(build_transport(&cli), Arc::clone(&modes), queue).with_shutdown(shutdown.clone());
    control
        .on_configure()
        .with_context(|| format!("could not connect to {}", control.transport().target()))?;
    control.on_activate().context("could not enable the motors")?;

    let startup = modes
        .spawn_activation(cli.start_mode)
        .context("starting the mode worker")?;

    spawn_key_reader(keys, cli.joystick, shutdown.clone())?;
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
                shutdown.request();
            }
        });
    }

    let outcome = tokio::task::spawn_blocking(move || {
        let outcome = control.run();
        if let Err(e) = control.on_deactivate().and_then(|_| control.on_cleanup()) {
            warn!("Shutdown was not clean: {}", e);
        }
        outcome
    })
    .await
    .context("control loop panicked")?;

    shutdown.request();
    match startup.join() {
        Ok(Ok(activation)) => debug!("Startup activation #{} done", activation.sequence),
        Ok(Err(e)) => warn!("Startup activation failed: {}", e),
        Err(_) => warn!("Startup worker panicked"),
    }

    let cycles = outcome?;
    info!("Exiting after {} cycles", cycles);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
