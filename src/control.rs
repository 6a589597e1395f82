use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::HYSTERESIS_C;
use crate::curve::{Limits, PwmTable};
use crate::error::Result;
use crate::hwmon::{FanMode, FanPort};

/// Longest single sleep, so a stop request doesn't wait for the full interval
const SLEEP_SLICE: Duration = Duration::from_millis(50);

pub struct Settings {
    pub interval: Duration,
    /// Re-apply the curve when the speed node drifts from what we wrote
    pub reassert_speed: bool,
}

/// What we last told the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    pub temp_c: u8,
    pub pwm: u8,
}

pub struct ControlLoop {
    table: PwmTable,
    limits: Limits,
    settings: Settings,
    stop: Arc<AtomicBool>,
}

impl ControlLoop {
    pub fn new(table: PwmTable, limits: Limits, settings: Settings, stop: Arc<AtomicBool>) -> Self {
        Self {
            table,
            limits,
            settings,
            stop,
        }
    }

    /// Runs until the stop flag is raised or the hardware fails us.
    /// Leaves the fan in manual mode, restoring automatic mode is up to the caller.
    pub fn run<P: FanPort>(&self, port: &mut P) -> Result<()> {
        let mut state = self.start(port)?;

        loop {
            self.step(port, &mut state)?;

            if self.stop.load(Ordering::SeqCst) || self.sleep_unless_stopped() {
                log::debug!("stop requested at {}°C / {} PWM", state.temp_c, state.pwm);
                return Ok(());
            }
        }
    }

    /// Takes manual control and applies the curve once
    pub fn start<P: FanPort>(&self, port: &mut P) -> Result<LoopState> {
        if port.read_pwm_mode()? != FanMode::Manual {
            port.write_pwm_mode(FanMode::Manual)?;
        }

        let temp_c = port.read_temperature()?;
        let pwm = self.target_pwm(temp_c);
        port.write_pwm_speed(pwm)?;
        log::info!("starting at {}°C -> {} PWM", temp_c, pwm);

        Ok(LoopState { temp_c, pwm })
    }

    /// One poll cycle
    pub fn step<P: FanPort>(&self, port: &mut P, state: &mut LoopState) -> Result<()> {
        let temp_c = port.read_temperature()?;

        // The kernel may have switched us back to automatic mode.
        // (This seems to happen at system suspend / resume)
        if port.read_pwm_mode()? != FanMode::Manual {
            log::warn!("fan went back to automatic mode, reclaiming manual control");
            port.write_pwm_mode(FanMode::Manual)?;
            return self.apply(port, state, temp_c, self.target_pwm(temp_c), "Reclaiming");
        }

        if self.settings.reassert_speed {
            let current = port.read_pwm_speed()?;
            if current != state.pwm {
                log::debug!("fan runs at {} PWM instead of {}", current, state.pwm);
                return self.apply(port, state, temp_c, self.target_pwm(temp_c), "Reasserting");
            }
        }

        if self.overheating(temp_c) {
            if state.pwm != self.limits.pwm_max {
                return self.apply(port, state, temp_c, self.limits.pwm_max, "Overheating");
            }
            state.temp_c = temp_c;
            return Ok(());
        }

        let pwm = self.table.pwm_at(temp_c);

        // We're always increasing if necessary.
        if temp_c > state.temp_c && pwm != state.pwm {
            return self.apply(port, state, temp_c, pwm, "Increasing");
        }

        // We're only decreasing if we're HYSTERESIS_C colder.
        if i32::from(temp_c) < i32::from(state.temp_c) - i32::from(HYSTERESIS_C) && pwm != state.pwm
        {
            return self.apply(port, state, temp_c, pwm, "Decreasing");
        }

        Ok(())
    }

    /// Curve value, or full speed close to the critical temperature
    pub fn target_pwm(&self, temp_c: u8) -> u8 {
        if self.overheating(temp_c) {
            self.limits.pwm_max
        } else {
            self.table.pwm_at(temp_c)
        }
    }

    fn overheating(&self, temp_c: u8) -> bool {
        self.limits
            .overheat_c()
            .is_some_and(|overheat| i32::from(temp_c) >= overheat)
    }

    fn apply<P: FanPort>(
        &self,
        port: &mut P,
        state: &mut LoopState,
        temp_c: u8,
        pwm: u8,
        reason: &str,
    ) -> Result<()> {
        log::debug!("{}: {}°C -> {} PWM", reason, temp_c, pwm);
        port.write_pwm_speed(pwm)?;
        *state = LoopState { temp_c, pwm };
        Ok(())
    }

    /// Returns true if the stop flag got raised while sleeping
    fn sleep_unless_stopped(&self) -> bool {
        let deadline = Instant::now() + self.settings.interval;
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
