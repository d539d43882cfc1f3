//! GPIO lines over the Linux sysfs interface.
//!
//! Pull-up bias is not expressible through sysfs; the trigger and mode
//! inputs must be biased by the board setup (e.g. `gpio=23,27=ip,pu` in
//! the Raspberry Pi `config.txt`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin, StatefulOutputPin};

#[derive(Debug, thiserror::Error)]
pub enum GpioError {
    #[error("gpio{pin}: {source}")]
    Io {
        pin: u32,
        #[source]
        source: io::Error,
    },
    #[error("gpio{pin}: unexpected value {value:?}")]
    BadValue { pin: u32, value: String },
}

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    /// Output, driven low on export.
    Out,
}

/// One exported GPIO line.
#[derive(Debug)]
pub struct SysfsPin {
    pin: u32,
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `pin` under `root` (normally `/sys/class/gpio`) if needed and
    /// set its direction.
    pub fn export(root: &Path, pin: u32, direction: Direction) -> Result<Self, GpioError> {
        let io_err = |source| GpioError::Io { pin, source };

        let dir = root.join(format!("gpio{pin}"));
        if !dir.exists() {
            fs::write(root.join("export"), pin.to_string()).map_err(io_err)?;
        }
        let mode = match direction {
            Direction::In => "in",
            Direction::Out => "low",
        };
        fs::write(dir.join("direction"), mode).map_err(io_err)?;

        tracing::debug!(pin, ?direction, "gpio exported");
        Ok(Self {
            pin,
            value_path: dir.join("value"),
        })
    }

    fn read_level(&self) -> Result<bool, GpioError> {
        let raw = fs::read_to_string(&self.value_path).map_err(|source| GpioError::Io {
            pin: self.pin,
            source,
        })?;
        match raw.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(GpioError::BadValue {
                pin: self.pin,
                value: other.to_string(),
            }),
        }
    }

    fn write_level(&mut self, high: bool) -> Result<(), GpioError> {
        fs::write(&self.value_path, if high { "1" } else { "0" }).map_err(|source| GpioError::Io {
            pin: self.pin,
            source,
        })
    }
}

impl ErrorType for SysfsPin {
    type Error = GpioError;
}

impl InputPin for SysfsPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.read_level()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read_level()?)
    }
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_level(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_level(true)
    }
}

impl StatefulOutputPin for SysfsPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        self.read_level()
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.read_level()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fake sysfs tree with `gpio{pin}` already exported.
    fn fake_root(name: &str, pin: u32, value: &str) -> PathBuf {
        let root = std::env::temp_dir()
            .join(format!("rfdrop-gpio-{}-{}", std::process::id(), name));
        let dir = root.join(format!("gpio{pin}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("value"), value).unwrap();
        root
    }

    #[test]
    fn output_pin_writes_and_toggles() {
        let root = fake_root("out", 17, "0\n");
        let mut led = SysfsPin::export(&root, 17, Direction::Out).unwrap();
        assert_eq!(fs::read_to_string(root.join("gpio17/direction")).unwrap(), "low");

        led.set_high().unwrap();
        assert_eq!(fs::read_to_string(root.join("gpio17/value")).unwrap(), "1");
        assert!(led.is_set_high().unwrap());

        led.toggle().unwrap();
        assert_eq!(fs::read_to_string(root.join("gpio17/value")).unwrap(), "0");
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn input_pin_reads_level() {
        let root = fake_root("in", 27, "1\n");
        let mut button = SysfsPin::export(&root, 27, Direction::In).unwrap();
        assert!(button.is_high().unwrap());

        fs::write(root.join("gpio27/value"), "0\n").unwrap();
        assert!(button.is_low().unwrap());
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn garbage_value_is_an_error() {
        let root = fake_root("bad", 23, "x\n");
        let mut mode = SysfsPin::export(&root, 23, Direction::In).unwrap();
        assert!(matches!(mode.is_high(), Err(GpioError::BadValue { pin: 23, .. })));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_root_fails_export() {
        let root = std::env::temp_dir().join(format!("rfdrop-gpio-none-{}", std::process::id()));
        let err = SysfsPin::export(&root, 5, Direction::In).unwrap_err();
        assert!(matches!(err, GpioError::Io { pin: 5, .. }));
    }
}
