use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::geometry::Geometry;
use crate::shape::{AttributeValue, Attributes, ShapeGroup, ShapeGroupBuilder};

static QUOTED_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^.*"(.+)".*$"#).unwrap());

/// One delimiter/quoting convention tried while looking for the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub quote: u8,
    pub trim: bool,
}

impl CsvDialect {
    pub const COMMA: Self = Self {
        delimiter: b',',
        quote: b'"',
        trim: false,
    };
    /// Spreadsheet exports from office suites using `;`.
    pub const SEMICOLON: Self = Self {
        delimiter: b';',
        quote: b'"',
        trim: false,
    };
    /// Comma separated with padded cells.
    pub const EXCEL: Self = Self {
        delimiter: b',',
        quote: b'"',
        trim: true,
    };
    pub const TAB: Self = Self {
        delimiter: b'\t',
        quote: b'"',
        trim: false,
    };

    pub fn candidates() -> Vec<CsvDialect> {
        vec![Self::COMMA, Self::SEMICOLON, Self::EXCEL, Self::TAB]
    }

    fn reader<'a>(&self, input: &'a [u8]) -> csv::Reader<&'a [u8]> {
        ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .trim(if self.trim { Trim::All } else { Trim::None })
            .comment(Some(b'#'))
            .has_headers(false)
            .flexible(true)
            .from_reader(input)
    }
}

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub longitude_column: String,
    pub latitude_column: String,
    /// Tried in order; the first whose header holds both coordinate columns wins.
    pub dialects: Vec<CsvDialect>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            longitude_column: "LONGITUDE".to_string(),
            latitude_column: "LATITUDE".to_string(),
            dialects: CsvDialect::candidates(),
        }
    }
}

impl CsvOptions {
    pub fn with_columns(longitude: impl Into<String>, latitude: impl Into<String>) -> Self {
        Self {
            longitude_column: longitude.into(),
            latitude_column: latitude.into(),
            ..Self::default()
        }
    }
}

struct Header {
    labels: Vec<String>,
    longitude: usize,
    latitude: usize,
}

pub fn parse_csv(path: &Path, name: &str, options: &CsvOptions) -> Result<ShapeGroup, ParseError> {
    let input = std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv_bytes(&input, name, options).ok_or_else(|| ParseError::InvalidCsv {
        path: path.to_path_buf(),
        longitude: options.longitude_column.clone(),
        latitude: options.latitude_column.clone(),
    })
}

/// Returns `None` when no dialect yields a header with both coordinate columns.
pub fn parse_csv_bytes(input: &[u8], name: &str, options: &CsvOptions) -> Option<ShapeGroup> {
    for dialect in &options.dialects {
        let mut reader = dialect.reader(input);
        let mut records = reader.records();
        let header = match records.next() {
            Some(Ok(record)) => read_header(&record, options),
            Some(Err(err)) => {
                debug!(delimiter = %char::from(dialect.delimiter), %err, "unreadable CSV header");
                None
            }
            None => None,
        };
        let Some(header) = header else {
            continue;
        };
        debug!(source = name, delimiter = %char::from(dialect.delimiter), "CSV header found");

        let mut group = ShapeGroupBuilder::new(name);
        for record in records {
            match record {
                Ok(record) => {
                    if let Some((geometry, attributes)) = read_row(&record, &header) {
                        group.add(geometry, Arc::new(attributes));
                    }
                }
                Err(err) => warn!(source = name, %err, "unreadable CSV row, skipped"),
            }
        }
        return Some(group.build());
    }
    None
}

fn read_header(record: &StringRecord, options: &CsvOptions) -> Option<Header> {
    let labels: Vec<String> = record.iter().map(clean_label).collect();
    let position = |column: &str| labels.iter().position(|label| label == column);
    let longitude = position(&options.longitude_column)?;
    let latitude = position(&options.latitude_column)?;
    Some(Header {
        labels,
        longitude,
        latitude,
    })
}

fn clean_label(raw: &str) -> String {
    let label = raw.trim_start_matches('\u{feff}').trim();
    QUOTED_LABEL_RE.replace(label, "$1").trim().to_string()
}

fn read_row(record: &StringRecord, header: &Header) -> Option<(Geometry, Attributes)> {
    let longitude = record.get(header.longitude).map(str::trim).unwrap_or_default();
    let latitude = record.get(header.latitude).map(str::trim).unwrap_or_default();
    if longitude.is_empty() || latitude.is_empty() {
        return None;
    }
    let (Ok(x), Ok(y)) = (longitude.parse::<f64>(), latitude.parse::<f64>()) else {
        let line = record.position().map(|pos| pos.line()).unwrap_or_default();
        warn!(line, longitude, latitude, "coordinates are not numbers, row skipped");
        return None;
    };

    let attributes = header
        .labels
        .iter()
        .zip(record.iter())
        .filter(|(label, _)| !label.is_empty())
        .map(|(label, value)| (label.clone(), AttributeValue::parse(value)))
        .collect();
    Some((Geometry::point(x, y), attributes))
}
