//! Reads the perfume catalog CSV into [`CatalogItem`]s.
//!
//! Column types are inferred per column the way a dataframe reader would: a
//! column whose non-empty cells all parse as numbers is emitted as numbers in
//! the response projection, everything else as strings, empty cells as null.

use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Number, Value};
use tracing::{debug, info};

use crate::{
    error::{ApiError, Result},
    models::perfume::{combine_notes, CatalogItem},
};

pub const PRICE_COLUMN: &str = "price";
pub const SIZE_COLUMN: &str = "size";
pub const GENDER_COLUMN: &str = "gender";
pub const SITUATION_COLUMN: &str = "situation";
pub const CONCENTRATE_COLUMN: &str = "concentrate";
pub const TOP_NOTES_COLUMN: &str = "top notes";
pub const MID_NOTES_COLUMN: &str = "mid notes";
pub const BASE_NOTES_COLUMN: &str = "base notes";
pub const LOCAL_COLUMN: &str = "is_lokal";

const ID_COLUMNS: [&str; 2] = ["ID_Perfume", "id"];
const NAME_COLUMNS: [&str; 2] = ["perfume", "name"];
const BRAND_COLUMN: &str = "brand";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Integer;
    for cell in cells.map(str::trim).filter(|c| !c.is_empty()) {
        if kind == ColumnKind::Integer && cell.parse::<i64>().is_err() {
            kind = ColumnKind::Float;
        }
        if kind == ColumnKind::Float && cell.parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
    }
    kind
}

fn cell_value(cell: &str, kind: ColumnKind) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(cell.to_string())),
        ColumnKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(cell.to_string())),
        ColumnKind::Text => Value::String(cell.to_string()),
    }
}

fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

struct Columns {
    headers: Vec<String>,
}

impl Columns {
    fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.position(name).ok_or_else(|| {
            ApiError::ModelLoadError(format!("Catalog is missing required column '{}'", name))
        })
    }

    fn first_of(&self, names: &[&str]) -> Option<usize> {
        names.iter().find_map(|name| self.position(name))
    }
}

/// The immutable product catalog, in file order.
#[derive(Debug, Clone)]
pub struct Catalog {
    columns: Vec<String>,
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading catalog from '{}'...", path.display());
        let file = File::open(path).map_err(|e| {
            ApiError::ModelLoadError(format!(
                "Failed to open catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        let catalog = Self::from_reader(file)?;
        info!("Catalog loaded: {} perfumes", catalog.len());
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().flexible(false).from_reader(reader);
        let columns = Columns {
            headers: reader
                .headers()?
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
        };

        let price = columns.require(PRICE_COLUMN)?;
        let size = columns.require(SIZE_COLUMN)?;
        let gender = columns.require(GENDER_COLUMN)?;
        let situation = columns.require(SITUATION_COLUMN)?;
        let concentrate = columns.require(CONCENTRATE_COLUMN)?;
        let top = columns.require(TOP_NOTES_COLUMN)?;
        let mid = columns.require(MID_NOTES_COLUMN)?;
        let base = columns.require(BASE_NOTES_COLUMN)?;
        let id = columns.first_of(&ID_COLUMNS);
        let name = columns.first_of(&NAME_COLUMNS);
        let brand = columns.position(BRAND_COLUMN);
        let local = columns.position(LOCAL_COLUMN);

        let rows = reader.records().collect::<std::result::Result<Vec<StringRecord>, _>>()?;
        let kinds: Vec<ColumnKind> = (0..columns.headers.len())
            .map(|column| infer_kind(rows.iter().filter_map(|row| row.get(column))))
            .collect();
        debug!(columns = ?columns.headers, "Catalog columns");

        let number = |row: &StringRecord, column: usize, line: usize| -> Result<f64> {
            let cell = row.get(column).unwrap_or_default().trim();
            cell.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    ApiError::ModelLoadError(format!(
                        "Catalog row {} has a non-numeric '{}': '{}'",
                        line, columns.headers[column], cell
                    ))
                })
        };
        let text = |row: &StringRecord, column: usize| -> Option<String> {
            row.get(column)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
        };

        let mut items = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            // Header is line 1
            let line = index + 2;

            let mut record = Map::new();
            for (column, header) in columns.headers.iter().enumerate() {
                let cell = row.get(column).unwrap_or_default();
                record.insert(header.clone(), cell_value(cell, kinds[column]));
            }

            let top_notes = text(row, top).unwrap_or_default();
            let mid_notes = text(row, mid).unwrap_or_default();
            let base_notes = text(row, base).unwrap_or_default();
            let notes_combined = combine_notes(
                Some(top_notes.as_str()),
                Some(mid_notes.as_str()),
                Some(base_notes.as_str()),
            );

            items.push(CatalogItem {
                id: id
                    .and_then(|c| text(row, c))
                    .unwrap_or_else(|| index.to_string()),
                name: name.and_then(|c| text(row, c)),
                brand: brand.and_then(|c| text(row, c)),
                price: number(row, price, line)?,
                size: number(row, size, line)?,
                gender: text(row, gender).unwrap_or_default(),
                situation: text(row, situation).unwrap_or_default(),
                concentrate: text(row, concentrate).unwrap_or_default(),
                top_notes,
                mid_notes,
                base_notes,
                notes_combined,
                is_local: local.and_then(|c| row.get(c)).and_then(parse_flag),
                record,
            });
        }

        Ok(Self {
            columns: columns.headers,
            items,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
