use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::curve::Knot;

/// Polling rate
/// How often we read the temperature and potentially update the fan speed
pub const UPDATE_DELAY: Duration = Duration::from_millis(500);

/// Temperature has to drop this far below the last applied one before we slow the fan down
pub const HYSTERESIS_C: u8 = 5;

/// Distance to the critical temperature at which we stop following the curve and go full speed
pub const OVERHEAT_MARGIN_C: i32 = 5;

/// Size of the lookup table, valid temperatures are 0..TEMP_RANGE_C
pub const TEMP_RANGE_C: usize = 120;

/// Highest temperature we accept from the sensor
pub const TEMP_MAX_C: i32 = TEMP_RANGE_C as i32 - 1;

/// Highest PWM duty cycle the hardware understands
pub const PWM_MAX: i32 = 255;

/// How many hwmonN directories we probe below a card
pub const HWMON_PROBE_LIMIT: u32 = 16;

/// Where the kernel exposes the GPUs
pub const DRM_ROOT: &str = "/sys/class/drm";

/// Default fan curve
pub const DEFAULT_CURVE: [Knot; 3] = [
    Knot { temp_c: 65, pwm: 0 },
    Knot {
        temp_c: 80,
        pwm: 153,
    },
    Knot {
        temp_c: 90,
        pwm: 255,
    },
];

#[derive(Parser, Debug)]
#[command(version, about = "Fan curve daemon for hwmon driven GPUs")]
pub struct Args {
    /// Print curve transitions to stdout
    #[arg(long)]
    pub debug: bool,

    /// GPU whose hwmon directory is looked up under /sys/class/drm (cardN or N)
    #[arg(long, default_value = "card0")]
    pub card: String,

    /// Use this hwmon directory instead of looking it up
    #[arg(long)]
    pub hwmon: Option<PathBuf>,

    /// GPU temperature file
    #[arg(long)]
    pub tempctl: Option<PathBuf>,

    /// PWM mode control file
    #[arg(long)]
    pub pwmmodectrl: Option<PathBuf>,

    /// PWM speed control file
    #[arg(long)]
    pub pwmspeedctrl: Option<PathBuf>,

    /// First temperature point
    #[arg(long, default_value_t = DEFAULT_CURVE[0].temp_c, allow_negative_numbers = true)]
    pub tmp0: i32,

    /// First PWM point
    #[arg(long, default_value_t = DEFAULT_CURVE[0].pwm, allow_negative_numbers = true)]
    pub pwm0: i32,

    /// Second temperature point
    #[arg(long, default_value_t = DEFAULT_CURVE[1].temp_c, allow_negative_numbers = true)]
    pub tmp1: i32,

    /// Second PWM point
    #[arg(long, default_value_t = DEFAULT_CURVE[1].pwm, allow_negative_numbers = true)]
    pub pwm1: i32,

    /// Third temperature point
    #[arg(long, default_value_t = DEFAULT_CURVE[2].temp_c, allow_negative_numbers = true)]
    pub tmp2: i32,

    /// Third PWM point
    #[arg(long, default_value_t = DEFAULT_CURVE[2].pwm, allow_negative_numbers = true)]
    pub pwm2: i32,

    /// Re-apply the curve when the hardware reports a different speed than we set
    #[arg(long)]
    pub reassert_speed: bool,
}

impl Args {
    pub fn knots(&self) -> [Knot; 3] {
        [
            Knot {
                temp_c: self.tmp0,
                pwm: self.pwm0,
            },
            Knot {
                temp_c: self.tmp1,
                pwm: self.pwm1,
            },
            Knot {
                temp_c: self.tmp2,
                pwm: self.pwm2,
            },
        ]
    }
}
