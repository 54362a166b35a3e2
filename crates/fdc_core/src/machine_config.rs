/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    machine_config.rs

    Floppy controller configuration definitions.
*/

use std::path::Path;

use crate::device_types::fdc::{FdcType, FdcVariant, StandardGeometry};
use anyhow::{anyhow, Context, Error};
use serde_derive::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct FloppyControllerConfig {
    #[serde(rename = "type")]
    pub fdc_type: FdcType,
    #[serde(default)]
    pub variant: FdcVariant,
    pub seek_time_us: Option<f64>,
    #[serde(default)]
    pub drive: Vec<FloppyDriveConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FloppyDriveConfig {
    #[serde(rename = "type")]
    pub drive_type: StandardGeometry,
    pub write_protect: Option<bool>,
    pub always_ready: Option<bool>,
}

#[derive(Clone, Debug, Deserialize)]
struct FloppyConfigFile {
    fdc: FloppyControllerConfig,
}

impl FloppyControllerConfig {
    /// Parse a controller configuration from a TOML document with an `[fdc]` table.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Error> {
        let file: FloppyConfigFile = toml::from_str(toml_str).context("Error parsing floppy controller config")?;
        file.fdc.validate()?;
        Ok(file.fdc)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read floppy controller config: {}", path.display()))?;
        Self::from_toml_str(&toml_str)
    }

    fn validate(&self) -> Result<(), Error> {
        if let Some(seek_time) = self.seek_time_us {
            if !seek_time.is_finite() || seek_time < 0.0 {
                log::error!("Invalid seek time in floppy controller config: {}", seek_time);
                return Err(anyhow!("seek_time_us must be a non-negative number, got {}", seek_time));
            }
        }
        if self.drive.is_empty() {
            log::warn!("Floppy controller config has no drives");
        }
        Ok(())
    }
}
