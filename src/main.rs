mod config;
mod control;
mod curve;
mod error;
mod hwmon;
mod lifecycle;
mod util;


use std::path::{Path, PathBuf};

use clap::Parser;

use config::Args;
use control::{ControlLoop, Settings};
use curve::PwmTable;
use error::{Error, Result};
use hwmon::{HwmonPort, Nodes};
use lifecycle::AutoModeGuard;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "warn" };
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if args.debug {
        logger.target(env_logger::Target::Stdout);
    }
    logger.init();

    log::info!("Starting ({})...", VERSION);

    if let Err(err) = run(&args) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    // SAFETY: geteuid has no preconditions and cannot fail
    if unsafe { libc::geteuid() } != 0 {
        return Err(Error::Privilege);
    }

    let nodes = resolve_nodes(args)?;
    log::debug!("nodes: {:?}", nodes);

    let port = HwmonPort::new(nodes);
    let limits = port.read_limits()?;
    log::info!(
        "limits: pwm {}..={}, critical {:?}°C",
        limits.pwm_min,
        limits.pwm_max,
        limits.temp_crit_c
    );

    let table = PwmTable::build(&args.knots(), &limits)?;
    log::debug!("pwm table: {:?}", table.values());
    let stop = lifecycle::install_signal_handler()?;
    let control = ControlLoop::new(
        table,
        limits,
        Settings {
            interval: config::UPDATE_DELAY,
            reassert_speed: args.reassert_speed,
        },
        stop,
    );

    // Switch fan back to auto mode at exit.
    let mut port = AutoModeGuard::new(port);
    let outcome = control.run(&mut *port);
    let restored = port.restore();

    match (outcome, restored) {
        (Err(err), Err(restore_err)) => {
            log::error!("couldn't restore automatic fan control: {}", restore_err);
            Err(err)
        }
        (outcome, restored) => outcome.and(restored),
    }
}

/// Explicit node flags win over the discovered hwmon directory
fn resolve_nodes(args: &Args) -> Result<Nodes> {
    if let (Some(temp), Some(mode), Some(speed)) =
        (&args.tempctl, &args.pwmmodectrl, &args.pwmspeedctrl)
    {
        if args.hwmon.is_none() {
            return Ok(Nodes::explicit(temp.clone(), mode.clone(), speed.clone()));
        }
    }

    let dir: PathBuf = match &args.hwmon {
        Some(dir) if dir.is_dir() => dir.clone(),
        Some(dir) => {
            return Err(Error::config(format!(
                "{} is not a directory",
                dir.display()
            )))
        }
        None => hwmon::discover_hwmon_dir(Path::new(config::DRM_ROOT), &args.card)?,
    };

    let mut nodes = Nodes::in_dir(&dir);
    if let Some(temp) = &args.tempctl {
        nodes.temp = temp.clone();
    }
    if let Some(mode) = &args.pwmmodectrl {
        nodes.pwm_mode = mode.clone();
    }
    if let Some(speed) = &args.pwmspeedctrl {
        nodes.pwm_speed = speed.clone();
    }
    Ok(nodes)
}
