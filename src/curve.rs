use crate::config::{OVERHEAT_MARGIN_C, PWM_MAX, TEMP_MAX_C, TEMP_RANGE_C};
use crate::error::{Error, Result};

/// Vertex of the fan curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Knot {
    pub temp_c: i32,
    pub pwm: i32,
}

/// What the hardware allows, read once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub pwm_min: u8,
    pub pwm_max: u8,
    pub temp_crit_c: Option<i32>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            pwm_min: 0,
            pwm_max: PWM_MAX as u8,
            temp_crit_c: None,
        }
    }
}

impl Limits {
    /// Temperature from which on the fan is pinned to `pwm_max`
    pub fn overheat_c(&self) -> Option<i32> {
        self.temp_crit_c.map(|crit| crit - OVERHEAT_MARGIN_C)
    }
}

/// Precomputed PWM value for every whole degree in 0..TEMP_RANGE_C
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PwmTable {
    values: [u8; TEMP_RANGE_C],
}

impl PwmTable {
    pub fn build(knots: &[Knot; 3], limits: &Limits) -> Result<Self> {
        validate(knots, limits)?;

        let [k0, k1, k2] = *knots;
        let mut values = [0u8; TEMP_RANGE_C];
        for (i, value) in values.iter_mut().enumerate() {
            let t = i as i32;
            // Truncating division keeps old curve files producing the same speeds
            let pwm = if t <= k0.temp_c {
                k0.pwm
            } else if t >= k2.temp_c {
                k2.pwm
            } else if t <= k1.temp_c {
                k0.pwm + (t - k0.temp_c) * (k1.pwm - k0.pwm) / (k1.temp_c - k0.temp_c)
            } else {
                k1.pwm + (t - k1.temp_c) * (k2.pwm - k1.pwm) / (k2.temp_c - k1.temp_c)
            };
            *value = pwm as u8;
        }

        Ok(Self { values })
    }

    /// Temperatures past the table end map to the last entry
    pub fn pwm_at(&self, temp_c: u8) -> u8 {
        self.values[usize::from(temp_c).min(TEMP_RANGE_C - 1)]
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }
}

fn validate(knots: &[Knot; 3], limits: &Limits) -> Result<()> {
    let [k0, k1, k2] = *knots;

    if k0.pwm < 0 || k2.pwm > PWM_MAX {
        return Err(Error::config(format!(
            "PWM points must be between 0 and {}",
            PWM_MAX
        )));
    }
    if k1.pwm < k0.pwm || k2.pwm < k1.pwm {
        return Err(Error::config(
            "PWM points must be monotonic, e.g. pwm0 <= pwm1 <= pwm2",
        ));
    }
    if k0.temp_c < 0 || k2.temp_c > TEMP_MAX_C {
        return Err(Error::config(format!(
            "temperature points must be between 0 and {}",
            TEMP_MAX_C
        )));
    }
    if k1.temp_c <= k0.temp_c || k2.temp_c <= k1.temp_c {
        return Err(Error::config(
            "temperature points must be strictly increasing, e.g. tmp0 < tmp1 < tmp2",
        ));
    }

    if k0.pwm < i32::from(limits.pwm_min) || k2.pwm > i32::from(limits.pwm_max) {
        return Err(Error::config(format!(
            "PWM points must be between pwm_min ({}) and pwm_max ({})",
            limits.pwm_min, limits.pwm_max
        )));
    }
    if let Some(overheat) = limits.overheat_c() {
        if k2.temp_c >= overheat {
            return Err(Error::config(format!(
                "tmp2 ({}°C) must stay below {}°C, {}°C under the critical temperature",
                k2.temp_c, overheat, OVERHEAT_MARGIN_C
            )));
        }
    }

    Ok(())
}
