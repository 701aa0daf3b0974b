use geo::{AffineTransform, coord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::paint::Color;
use crate::parser::{CsvOptions, SourceKind};
use crate::style::UniformStyle;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub margin: f64,
    pub crop: bool,
    pub background: Option<Color>,
    /// Display scale handed to the stylers.
    pub scale: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            margin: 0.0,
            crop: true,
            background: None,
            scale: 1.0,
        }
    }
}

/// Maps source coordinates (longitude/latitude or projected metres) onto the canvas:
/// scale first, then translate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformConfig {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl TransformConfig {
    pub fn to_affine(&self) -> AffineTransform {
        AffineTransform::scale(self.scale_x, self.scale_y, coord! { x: 0.0, y: 0.0 })
            .translated(self.translate_x, self.translate_y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub source: PathBuf,
    #[serde(default)]
    pub kind: Option<SourceKind>,
    #[serde(default = "default_longitude_column")]
    pub longitude_column: String,
    #[serde(default = "default_latitude_column")]
    pub latitude_column: String,
    #[serde(default)]
    pub style: UniformStyle,
}

fn default_longitude_column() -> String {
    CsvOptions::default().longitude_column
}

fn default_latitude_column() -> String {
    CsvOptions::default().latitude_column
}

impl LayerConfig {
    pub fn from_source(source: PathBuf) -> Self {
        Self {
            name: None,
            source,
            kind: None,
            longitude_column: default_longitude_column(),
            latitude_column: default_latitude_column(),
            style: UniformStyle::default(),
        }
    }

    /// Configured name, or the source's file stem.
    pub fn layer_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.source
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(crate::canvas::DEFAULT_LAYER_NAME)
            .to_string()
    }

    pub fn source_kind(&self) -> SourceKind {
        self.kind
            .unwrap_or_else(|| SourceKind::from_path(&self.source))
    }

    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions::with_columns(self.longitude_column.clone(), self.latitude_column.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub render: RenderConfig,
    pub transform: TransformConfig,
    pub layers: Vec<LayerConfig>,
}

/// Loads a JSON config, falling back to JSON5 for hand-written files with comments or
/// trailing commas. Relative layer sources are resolved against the config's directory.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(path)?;
    let mut config: Config = match serde_json::from_str(&contents) {
        Ok(config) => config,
        Err(json_err) => json5::from_str(&contents).map_err(|json5_err| {
            anyhow::anyhow!("invalid config {}: {json_err} (json5: {json5_err})", path.display())
        })?,
    };

    if let Some(base) = path.parent() {
        for layer in &mut config.layers {
            if layer.source.is_relative() {
                layer.source = base.join(&layer.source);
            }
        }
    }
    Ok(config)
}
