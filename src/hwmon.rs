use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::{HWMON_PROBE_LIMIT, PWM_MAX, TEMP_MAX_C};
use crate::curve::Limits;
use crate::error::{Error, Result};
use crate::util;

/// Value of `pwm1_enable` that hands the fan to us
const PWM_MODE_MANUAL: i64 = 1;
const PWM_MODE_AUTOMATIC: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Automatic,
    Manual,
}

impl FanMode {
    /// Anything but the manual encoding counts as automatic
    pub fn from_raw(raw: i64) -> Self {
        if raw == PWM_MODE_MANUAL {
            FanMode::Manual
        } else {
            FanMode::Automatic
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            FanMode::Manual => PWM_MODE_MANUAL,
            FanMode::Automatic => PWM_MODE_AUTOMATIC,
        }
    }
}

/// The hardware as the control loop sees it.
///
/// Every call is a single open/read-or-write/close, nothing is cached.
pub trait FanPort {
    /// Whole degrees Celsius, 0..=119
    fn read_temperature(&mut self) -> Result<u8>;
    fn read_pwm_speed(&mut self) -> Result<u8>;
    fn read_pwm_mode(&mut self) -> Result<FanMode>;
    fn write_pwm_mode(&mut self, mode: FanMode) -> Result<()>;
    fn write_pwm_speed(&mut self, pwm: u8) -> Result<()>;
}

/// Paths of the nodes we talk to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nodes {
    pub temp: PathBuf,
    pub pwm_mode: PathBuf,
    pub pwm_speed: PathBuf,
    pub pwm_min: Option<PathBuf>,
    pub pwm_max: Option<PathBuf>,
    pub temp_crit: Option<PathBuf>,
}

impl Nodes {
    /// Standard node names of the first fan/sensor in a hwmon directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            temp: dir.join("temp1_input"),
            pwm_mode: dir.join("pwm1_enable"),
            pwm_speed: dir.join("pwm1"),
            pwm_min: Some(dir.join("pwm1_min")),
            pwm_max: Some(dir.join("pwm1_max")),
            temp_crit: Some(dir.join("temp1_crit")),
        }
    }

    /// Only the nodes given explicitly, no limit nodes
    pub fn explicit(temp: PathBuf, pwm_mode: PathBuf, pwm_speed: PathBuf) -> Self {
        Self {
            temp,
            pwm_mode,
            pwm_speed,
            pwm_min: None,
            pwm_max: None,
            temp_crit: None,
        }
    }
}

pub struct HwmonPort {
    nodes: Nodes,
}

impl HwmonPort {
    pub fn new(nodes: Nodes) -> Self {
        Self { nodes }
    }

    /// Reads `pwm1_min`, `pwm1_max` and `temp1_crit`; missing nodes keep their defaults
    pub fn read_limits(&self) -> Result<Limits> {
        let mut limits = Limits::default();

        if let Some(path) = existing(&self.nodes.pwm_min) {
            limits.pwm_min = pwm_in_range(path, util::read_node(path)?)?;
        }
        if let Some(path) = existing(&self.nodes.pwm_max) {
            limits.pwm_max = pwm_in_range(path, util::read_node(path)?)?;
        }
        if let Some(path) = existing(&self.nodes.temp_crit) {
            limits.temp_crit_c = Some((util::read_node(path)? / 1000) as i32);
        }

        if limits.pwm_min > limits.pwm_max {
            return Err(Error::config(format!(
                "pwm_min ({}) is above pwm_max ({})",
                limits.pwm_min, limits.pwm_max
            )));
        }
        Ok(limits)
    }
}

impl FanPort for HwmonPort {
    fn read_temperature(&mut self) -> Result<u8> {
        let path = &self.nodes.temp;
        let degree = util::read_node(path)? / 1000;
        if !(0..=i64::from(TEMP_MAX_C)).contains(&degree) {
            return Err(Error::sensor_read(path, format!("got {}°C", degree)));
        }
        Ok(degree as u8)
    }

    fn read_pwm_speed(&mut self) -> Result<u8> {
        let path = &self.nodes.pwm_speed;
        pwm_in_range(path, util::read_node(path)?)
    }

    fn read_pwm_mode(&mut self) -> Result<FanMode> {
        util::read_node(&self.nodes.pwm_mode).map(FanMode::from_raw)
    }

    fn write_pwm_mode(&mut self, mode: FanMode) -> Result<()> {
        util::write_node(&self.nodes.pwm_mode, &mode.raw().to_string())
    }

    fn write_pwm_speed(&mut self, pwm: u8) -> Result<()> {
        util::write_node(&self.nodes.pwm_speed, &pwm.to_string())
    }
}

fn existing(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|path| path.exists())
}

fn pwm_in_range(path: &Path, raw: i64) -> Result<u8> {
    if !(0..=i64::from(PWM_MAX)).contains(&raw) {
        return Err(Error::sensor_read(path, format!("got PWM {}", raw)));
    }
    Ok(raw as u8)
}

/// Turns `card0` or `0` into `card0`
pub fn normalize_card(card: &str) -> Result<String> {
    let re = Regex::new(r"^(?:card)?(?<idx>\d+)$").map_err(|err| Error::config(err.to_string()))?;
    re.captures(card.trim())
        .and_then(|c| c.name("idx"))
        .map(|idx| format!("card{}", idx.as_str()))
        .ok_or_else(|| Error::config(format!("invalid card identifier '{}'", card)))
}

/// First `hwmonN` directory below `<drm_root>/<card>/device/hwmon`
pub fn discover_hwmon_dir(drm_root: &Path, card: &str) -> Result<PathBuf> {
    let base = drm_root.join(normalize_card(card)?).join("device").join("hwmon");

    (0..HWMON_PROBE_LIMIT)
        .map(|n| base.join(format!("hwmon{}", n)))
        .find(|dir| dir.is_dir())
        .inspect(|dir| log::debug!("using hwmon directory {}", dir.display()))
        .ok_or_else(|| {
            Error::config(format!(
                "no hwmon directory found in {} (probed hwmon0..hwmon{})",
                base.display(),
                HWMON_PROBE_LIMIT - 1
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_hwmon(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn reads_temperature_in_whole_degrees() {
        let dir = fake_hwmon(&[("temp1_input", "54999\n")]);
        let mut port = HwmonPort::new(Nodes::in_dir(dir.path()));
        assert_eq!(port.read_temperature().unwrap(), 54);
    }

    #[test]
    fn rejects_temperature_out_of_range() {
        let dir = fake_hwmon(&[("temp1_input", "120000\n")]);
        let mut port = HwmonPort::new(Nodes::in_dir(dir.path()));
        assert!(matches!(
            port.read_temperature(),
            Err(Error::SensorRead { .. })
        ));

        fs::write(dir.path().join("temp1_input"), "-2000\n").unwrap();
        assert!(port.read_temperature().is_err());
    }

    #[test]
    fn rejects_garbage_and_missing_nodes() {
        let dir = fake_hwmon(&[("temp1_input", "hot\n")]);
        let mut port = HwmonPort::new(Nodes::in_dir(dir.path()));
        assert!(matches!(
            port.read_temperature(),
            Err(Error::SensorRead { .. })
        ));
        assert!(matches!(
            port.read_pwm_speed(),
            Err(Error::SensorRead { .. })
        ));
    }

    #[test]
    fn reads_pwm_speed_and_mode() {
        let dir = fake_hwmon(&[("pwm1", "153\n"), ("pwm1_enable", "1\n")]);
        let mut port = HwmonPort::new(Nodes::in_dir(dir.path()));
        assert_eq!(port.read_pwm_speed().unwrap(), 153);
        assert_eq!(port.read_pwm_mode().unwrap(), FanMode::Manual);

        fs::write(dir.path().join("pwm1_enable"), "0\n").unwrap();
        assert_eq!(port.read_pwm_mode().unwrap(), FanMode::Automatic);

        fs::write(dir.path().join("pwm1"), "256\n").unwrap();
        assert!(port.read_pwm_speed().is_err());
    }

    #[test]
    fn writes_mode_and_speed_as_text() {
        let dir = fake_hwmon(&[("pwm1", "255\n"), ("pwm1_enable", "2\n")]);
        let mut port = HwmonPort::new(Nodes::in_dir(dir.path()));

        port.write_pwm_mode(FanMode::Manual).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("pwm1_enable")).unwrap(), "1");
        port.write_pwm_mode(FanMode::Automatic).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("pwm1_enable")).unwrap(), "2");

        port.write_pwm_speed(76).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("pwm1")).unwrap(), "76");
    }

    #[test]
    fn write_to_missing_node_fails() {
        let dir = fake_hwmon(&[]);
        let mut port = HwmonPort::new(Nodes::in_dir(dir.path()));
        assert!(matches!(
            port.write_pwm_speed(10),
            Err(Error::ControlWrite { .. })
        ));
        assert!(!dir.path().join("pwm1").exists());
    }

    #[test]
    fn limits_default_when_nodes_are_missing() {
        let dir = fake_hwmon(&[]);
        let port = HwmonPort::new(Nodes::in_dir(dir.path()));
        assert_eq!(port.read_limits().unwrap(), Limits::default());
    }

    #[test]
    fn limits_are_read_from_nodes() {
        let dir = fake_hwmon(&[
            ("pwm1_min", "20\n"),
            ("pwm1_max", "240\n"),
            ("temp1_crit", "94000\n"),
        ]);
        let port = HwmonPort::new(Nodes::in_dir(dir.path()));
        assert_eq!(
            port.read_limits().unwrap(),
            Limits {
                pwm_min: 20,
                pwm_max: 240,
                temp_crit_c: Some(94),
            }
        );
    }

    #[test]
    fn normalizes_card_identifiers() {
        assert_eq!(normalize_card("card1").unwrap(), "card1");
        assert_eq!(normalize_card("2").unwrap(), "card2");
        assert!(normalize_card("renderD128").is_err());
    }

    #[test]
    fn discovers_first_existing_hwmon_dir() {
        let root = tempfile::tempdir().unwrap();
        let hwmon = root.path().join("card0/device/hwmon");
        fs::create_dir_all(hwmon.join("hwmon3")).unwrap();
        fs::create_dir_all(hwmon.join("hwmon5")).unwrap();
        // a plain file is not a candidate
        fs::write(hwmon.join("hwmon1"), "").unwrap();

        assert_eq!(
            discover_hwmon_dir(root.path(), "card0").unwrap(),
            hwmon.join("hwmon3")
        );
    }

    #[test]
    fn discovery_fails_without_hwmon_dir() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("card0/device/hwmon")).unwrap();
        assert!(matches!(
            discover_hwmon_dir(root.path(), "card0"),
            Err(Error::Config(_))
        ));
    }
}
