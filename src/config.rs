//! YAML configuration: session defaults loaded once at startup and passed
//! explicitly to everything that needs them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::photo::{Caption, CaptionType};
use crate::settings::{ConflictRule, OutputFormat};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Directories searched for `*.xml` template descriptors.
    #[serde(default = "Config::default_template_dirs")]
    pub template_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub caption: CaptionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CaptionConfig {
    #[serde(default, rename = "type")]
    pub kind: CaptionType,
    #[serde(default)]
    pub text: String,
    #[serde(default = "CaptionConfig::default_font")]
    pub font: String,
    /// Glyph height as a percentage of the slot height.
    #[serde(default = "CaptionConfig::default_size")]
    pub size: u32,
    #[serde(default = "CaptionConfig::default_color")]
    pub color: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub on_conflict: ConflictRule,
    /// External editor command the exported pages are handed to.
    #[serde(default)]
    pub editor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PreviewConfig {
    /// Longest edge of preview renders, in pixels.
    #[serde(default = "PreviewConfig::default_max_dim")]
    pub max_dim: u32,
}

impl Config {
    fn default_template_dirs() -> Vec<PathBuf> {
        vec![PathBuf::from("templates")]
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.caption.size == 0 || self.caption.size > 100 {
            return Err(Error::InvalidConfig(format!(
                "caption size must be 1..=100 percent, got {}",
                self.caption.size
            )));
        }
        if self.caption.kind != CaptionType::None
            && Caption::parse_color(&self.caption.color).is_none()
        {
            return Err(Error::InvalidConfig(format!(
                "caption color {:?} is not #rrggbb",
                self.caption.color
            )));
        }
        if self.preview.max_dim < 16 {
            return Err(Error::InvalidConfig(
                "preview max-dim must be at least 16".into(),
            ));
        }
        Ok(())
    }

    /// Default caption descriptor for photos that carry none, or `None`
    /// when captions are off.
    pub fn caption_default(&self) -> Option<Caption> {
        if self.caption.kind == CaptionType::None {
            return None;
        }
        Some(Caption {
            kind: self.caption.kind,
            font: self.caption.font.clone(),
            size: self.caption.size,
            color: Caption::parse_color(&self.caption.color).unwrap_or([0, 0, 0]),
            text: self.caption.text.clone(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            template_dirs: Self::default_template_dirs(),
            caption: CaptionConfig::default(),
            output: OutputConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            kind: CaptionType::None,
            text: String::new(),
            font: Self::default_font(),
            size: Self::default_size(),
            color: Self::default_color(),
        }
    }
}

impl CaptionConfig {
    fn default_font() -> String {
        "DejaVu Sans".into()
    }

    fn default_size() -> u32 {
        8
    }

    fn default_color() -> String {
        "#ffffff".into()
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            on_conflict: ConflictRule::default(),
            editor: None,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_dim: Self::default_max_dim(),
        }
    }
}

impl PreviewConfig {
    fn default_max_dim() -> u32 {
        1024
    }
}

/// Load and parse the YAML config file.
pub fn from_yaml_file(path: &Path) -> Result<Config, Error> {
    let text = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&text)?;
    Ok(cfg)
}
