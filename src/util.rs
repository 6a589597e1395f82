use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

/// Reads the first line of a hwmon node as an integer
pub fn read_node(path: &Path) -> Result<i64> {
    let content =
        fs::read_to_string(path).map_err(|err| Error::sensor_read(path, err.to_string()))?;
    log_node_io("read", path, &content);

    content
        .lines()
        .next()
        .map(str::trim)
        .and_then(|line| line.parse().ok())
        .ok_or_else(|| Error::sensor_read(path, "couldn't read data"))
}

/// Writes a value to an existing hwmon node, never creates one
pub fn write_node(path: &Path, value: &str) -> Result<()> {
    log_node_io("write", path, value);

    let write_err = |source| Error::ControlWrite {
        path: path.to_path_buf(),
        value: value.to_string(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(write_err)?;
    file.write_all(value.as_bytes()).map_err(write_err)
}

fn log_node_io(op: &str, path: &Path, value: &str) {
    log::trace!("{} {}: \"{}\"", op, path.display(), value.trim_end());
}
