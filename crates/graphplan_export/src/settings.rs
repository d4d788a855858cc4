// SPDX-License-Identifier: MIT OR Apache-2.0
//! Export settings.
//!
//! Settings are read from a RON file next to the workflows being exported.
//! A missing file means defaults.

use graphplan_graph::CompileOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE_NAME: &str = "graphplan.ron";

/// File name offered when none is given
pub const DEFAULT_FILENAME: &str = "workflow_merged.json";

/// Export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Format version
    pub version: u32,
    /// Ask for the output file name when none is given on the command line
    pub prompt_filename: bool,
    /// File name used when not prompting, and offered when prompting
    pub default_filename: String,
    /// Override for the pass-through hop limit
    pub max_link_hops: Option<usize>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            prompt_filename: true,
            default_filename: DEFAULT_FILENAME.to_string(),
            max_link_hops: None,
        }
    }
}

impl ExportSettings {
    /// Load settings from a file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: ExportSettings = ron::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "Settings version {} is newer than supported version {}",
                    settings.version, SETTINGS_FORMAT_VERSION
                ),
            ));
        }

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Compiler options derived from these settings
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            max_link_hops: self.max_link_hops,
        }
    }
}
