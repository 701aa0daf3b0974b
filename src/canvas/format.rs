use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// The two drawing backends driven by a [`super::Canvas`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Raster,
    Vector,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raster => f.write_str("Raster"),
            Self::Vector => f.write_str("Vector"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Svg,
    Png,
    Gif,
    #[serde(alias = "jpeg")]
    #[cfg_attr(feature = "cli", value(alias = "jpeg"))]
    Jpg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [Self::Svg, Self::Png, Self::Gif, Self::Jpg];

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Jpg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Jpg => "jpg",
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::Svg => Backend::Vector,
            Self::Png | Self::Gif | Self::Jpg => Backend::Raster,
        }
    }

    /// Whether the encoded image keeps an alpha channel.
    pub fn has_alpha(&self) -> bool {
        !matches!(self, Self::Jpg)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "svg" | "image/svg+xml" => Ok(Self::Svg),
            "png" | "image/png" => Ok(Self::Png),
            "gif" | "image/gif" => Ok(Self::Gif),
            "jpg" | "jpeg" | "image/jpeg" => Ok(Self::Jpg),
            _ => Err(RenderError::UnsupportedFormat(input.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
