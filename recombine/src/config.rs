//! The run configuration file.
//!
//! ```json
//! {
//!   "inputs": {
//!     "base": "Base-Regular.ufo",
//!     "cjk": { "path": "CJK.designspace", "font": "Bold" }
//!   },
//!   "base": "base",
//!   "output": "Recombined.ufo",
//!   "familyname": "Recombined Sans",
//!   "fontname": "RecombinedSans-Regular"
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_OUTPUT: &str = "output.ufo";

/// An input font file, optionally naming one member of a designspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InputFont {
    Path(PathBuf),
    Member {
        path: PathBuf,
        font: Option<String>,
    },
}

impl InputFont {
    pub fn path(&self) -> &Path {
        match self {
            InputFont::Path(path) | InputFont::Member { path, .. } => path,
        }
    }

    pub fn member(&self) -> Option<&str> {
        match self {
            InputFont::Path(_) => None,
            InputFont::Member { font, .. } => font.as_deref(),
        }
    }

    fn resolve_against(&mut self, dir: &Path) {
        match self {
            InputFont::Path(path) | InputFont::Member { path, .. } => {
                *path = dir.join(&*path);
            }
        }
    }
}

/// Naming overrides written to the output font.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Metadata {
    pub copyright: Option<String>,
    pub familyname: Option<String>,
    pub subfamilyname: Option<String>,
    pub uniqueid: Option<String>,
    pub fullname: Option<String>,
    pub version: Option<String>,
    /// PostScript name.
    pub fontname: Option<String>,
    pub license: Option<String>,
    pub licenseurl: Option<String>,
}

impl Metadata {
    /// The overrides that are set, keyed by OpenType name ID.
    pub fn name_entries(&self) -> Vec<(u16, &str)> {
        [
            (0, &self.copyright),
            (1, &self.familyname),
            (2, &self.subfamilyname),
            (3, &self.uniqueid),
            (4, &self.fullname),
            (5, &self.version),
            (6, &self.fontname),
            (13, &self.license),
            (14, &self.licenseurl),
        ]
        .into_iter()
        .filter_map(|(id, value)| value.as_deref().map(|value| (id, value)))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.name_entries().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    inputs: BTreeMap<String, InputFont>,
    base: Option<String>,
    output: Option<PathBuf>,
    #[serde(flatten)]
    metadata: Metadata,
}

/// A validated run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub inputs: BTreeMap<String, InputFont>,
    /// Id of the font rules write into; always a key of `inputs`.
    pub base: String,
    pub output: PathBuf,
    pub metadata: Metadata,
}

impl RunConfig {
    /// Reads a config file. Relative paths in it are taken relative to the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        for input in config.inputs.values_mut() {
            input.resolve_against(dir);
        }
        config.output = dir.join(&config.output);
        Ok(config)
    }

    /// Parses and validates a config document without touching paths.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        let base = raw.base.ok_or(ConfigError::MissingBase)?;
        if !raw.inputs.contains_key(&base) {
            return Err(ConfigError::UnknownBase(base));
        }
        Ok(RunConfig {
            inputs: raw.inputs,
            base,
            output: raw.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            metadata: raw.metadata,
        })
    }
}
