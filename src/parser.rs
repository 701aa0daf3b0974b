mod json;
mod tabular;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::shape::ShapeGroup;

pub use json::{parse_geojson_file, parse_geojson_str, parse_geojson_value};
pub use tabular::{CsvDialect, CsvOptions, parse_csv, parse_csv_bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Geojson,
    Csv,
}

impl SourceKind {
    /// `.csv`, `.tsv` and `.txt` are tabular; everything else is read as GeoJSON.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv" | "tsv" | "txt") => Self::Csv,
            _ => Self::Geojson,
        }
    }
}

/// Reads one input source into a shape group named `name`.
pub fn parse_source(
    path: &Path,
    kind: SourceKind,
    name: &str,
    options: &CsvOptions,
) -> Result<ShapeGroup, ParseError> {
    match kind {
        SourceKind::Geojson => parse_geojson_file(path, name),
        SourceKind::Csv => parse_csv(path, name, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_extension() {
        assert_eq!(SourceKind::from_path(Path::new("cities.CSV")), SourceKind::Csv);
        assert_eq!(SourceKind::from_path(Path::new("reefs.geojson")), SourceKind::Geojson);
        assert_eq!(SourceKind::from_path(Path::new("reefs.json")), SourceKind::Geojson);
        assert_eq!(SourceKind::from_path(Path::new("noext")), SourceKind::Geojson);
    }
}
