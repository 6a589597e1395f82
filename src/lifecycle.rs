use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::hwmon::{FanMode, FanPort};

/// Raises the returned flag on SIGINT/SIGTERM, nothing else
pub fn install_signal_handler() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler_ref = stop.clone();

    ctrlc::set_handler(move || {
        log::info!("stopping...");
        stop_handler_ref.store(true, Ordering::SeqCst);
    })?;

    Ok(stop)
}

/// Owns the port while we're in manual mode.
///
/// Automatic mode is written back exactly once: either through [`AutoModeGuard::restore`]
/// or, on any other way out (early return, unwinding panic), when the guard is dropped.
pub struct AutoModeGuard<P: FanPort> {
    port: P,
    restored: bool,
}

impl<P: FanPort> AutoModeGuard<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            restored: false,
        }
    }

    /// Hands the fan back to the firmware and reports whether that worked
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        log::debug!("restoring automatic fan control");
        self.port.write_pwm_mode(FanMode::Automatic)
    }
}

impl<P: FanPort> Deref for AutoModeGuard<P> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.port
    }
}

impl<P: FanPort> DerefMut for AutoModeGuard<P> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl<P: FanPort> Drop for AutoModeGuard<P> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        if let Err(err) = self.port.write_pwm_mode(FanMode::Automatic) {
            log::error!("couldn't restore automatic fan control: {}", err);
        }
    }
}
