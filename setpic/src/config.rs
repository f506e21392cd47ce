//! setpic configuration
//!
//! Read from `--config` or `$XDG_CONFIG_HOME/st2205/config.toml`
//! (`~/.config/st2205/config.toml` when unset). Every key is optional:
//!
//! ```toml
//! device = "/dev/sdb"
//! direct_io = true
//! require_block_device = true
//!
//! # firmware without a parameter block
//! [panel]
//! width = 320
//! height = 240
//! bpp = 24
//! protocol = 1
//! offset_x = 0
//! offset_y = 0
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use st2205::{DescriptorSource, OpenOptions, PanelDescriptor, PanelOffset};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Block device of the frame, e.g. `/dev/sdb`
    pub device: Option<PathBuf>,
    pub direct_io: bool,
    pub require_block_device: bool,
    /// Fixed panel geometry instead of the firmware parameter block
    pub panel: Option<PanelConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: None,
            direct_io: true,
            require_block_device: true,
            panel: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_bpp")]
    pub bpp: u8,
    /// 0 = PCF8833, 1 = Mercury
    #[serde(default = "default_protocol")]
    pub protocol: u8,
    #[serde(default)]
    pub offset_x: i8,
    #[serde(default)]
    pub offset_y: i8,
}

fn default_bpp() -> u8 {
    24
}

fn default_protocol() -> u8 {
    1
}

impl PanelConfig {
    pub fn descriptor(&self) -> Result<PanelDescriptor> {
        let offset = PanelOffset {
            x: self.offset_x,
            y: self.offset_y,
        };
        PanelDescriptor::new(self.width, self.height, self.bpp, self.protocol, offset)
            .context("invalid [panel] section")
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
            .map(|dir| dir.join("st2205/config.toml"))
    }

    /// Load `explicit` if given (it must exist), else the default file if it
    /// exists, else built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => p,
                None => {
                    tracing::debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn open_options(&self) -> Result<OpenOptions> {
        let descriptor = match &self.panel {
            Some(panel) => DescriptorSource::Fixed(panel.descriptor()?),
            None => DescriptorSource::Firmware,
        };
        Ok(OpenOptions::new()
            .direct_io(self.direct_io)
            .require_block_device(self.require_block_device)
            .descriptor(descriptor))
    }
}
