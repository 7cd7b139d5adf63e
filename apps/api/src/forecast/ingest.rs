//! Row Validator/Normalizer: turns uploaded tabular rows into typed `KeywordRow`s.
//!
//! Input errors (empty upload, missing required column mapping) fail the request.
//! Per-cell problems never do: unparsable numbers fall back to documented defaults
//! and are counted in the `ValidationSummary` so callers can surface warnings.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::forecast::models::{
    normalize_keyword, Difficulty, KeywordRow, DEFAULT_CATEGORY, DEFAULT_INTENT,
    DEFAULT_START_RANK,
};
use crate::forecast::ForecastError;

/// Cell text treated as "no value".
const PLACEHOLDERS: &[&str] = &["", "-", "--", "—", "–", "n/a", "na", "null", "none"];

/// Characters stripped from numeric cells before parsing.
const NUMERIC_NOISE: &[char] = &['$', '€', '£', '¥', ',', '_', ' ', '\u{a0}', '\''];

/// Raw upload: either JSON records or CSV text with a header row.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawRows {
    Records(Vec<Map<String, Value>>),
    Csv(String),
}

/// Which source column supplies each field.
///
/// `keyword`, `volume` and `difficulty` are required; an absent entry is
/// rejected by `validate_rows` as a missing column rather than at decode time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMapping {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub start_rank: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub rows_received: usize,
    pub rows_accepted: usize,
    pub rows_dropped_empty_keyword: usize,
    pub duplicates_merged: usize,
    pub volume_defaulted: usize,
    pub start_rank_defaulted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidatedRows {
    pub rows: Vec<KeywordRow>,
    pub summary: ValidationSummary,
}

type Table = Vec<HashMap<String, String>>;

/// Validates and normalizes an upload against a column mapping.
pub fn validate_rows(raw: &RawRows, mapping: &ColumnMapping) -> Result<ValidatedRows, ForecastError> {
    let table = match raw {
        RawRows::Records(records) => records_to_table(records),
        RawRows::Csv(text) => csv_to_table(text)?,
    };

    if table.is_empty() {
        return Err(ForecastError::EmptyRows);
    }

    let columns: HashSet<&str> = table
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let keyword_col = require_column(&columns, "keyword", mapping.keyword.as_deref())?;
    let volume_col = require_column(&columns, "volume", mapping.volume.as_deref())?;
    let difficulty_col = require_column(&columns, "difficulty", mapping.difficulty.as_deref())?;
    let start_rank_col = optional_column(&columns, mapping.start_rank.as_deref());
    let intent_col = optional_column(&columns, mapping.intent.as_deref());
    let category_col = optional_column(&columns, mapping.category.as_deref());

    let mut summary = ValidationSummary {
        rows_received: table.len(),
        ..ValidationSummary::default()
    };
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::with_capacity(table.len());

    for raw_row in &table {
        let keyword = cell(raw_row, Some(keyword_col));
        if keyword.is_empty() {
            summary.rows_dropped_empty_keyword += 1;
            continue;
        }
        if !seen.insert(normalize_keyword(keyword)) {
            summary.duplicates_merged += 1;
            continue;
        }

        let volume = match parse_numeric(cell(raw_row, Some(volume_col))) {
            Some(v) if v >= 0.0 => v,
            _ => {
                summary.volume_defaulted += 1;
                0.0
            }
        };

        let start_rank = match parse_numeric(cell(raw_row, start_rank_col)) {
            Some(r) if r > 0.0 => r,
            _ => {
                summary.start_rank_defaulted += 1;
                DEFAULT_START_RANK
            }
        };

        rows.push(KeywordRow {
            keyword: keyword.to_string(),
            volume,
            difficulty: Difficulty::parse(cell(raw_row, Some(difficulty_col))),
            start_rank,
            intent: text_or_default(cell(raw_row, intent_col), DEFAULT_INTENT),
            category: text_or_default(cell(raw_row, category_col), DEFAULT_CATEGORY),
        });
    }

    summary.rows_accepted = rows.len();
    Ok(ValidatedRows { rows, summary })
}

/// Parses a numeric cell, tolerating currency symbols, thousands separators,
/// trailing percent signs and placeholder dashes. Returns `None` when unparsable.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        return None;
    }

    let cleaned: String = trimmed
        .trim_end_matches('%')
        .chars()
        .filter(|c| !NUMERIC_NOISE.contains(c))
        .collect();

    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn cell<'a>(row: &'a HashMap<String, String>, column: Option<&str>) -> &'a str {
    column
        .and_then(|c| row.get(c))
        .map(|v| v.trim())
        .unwrap_or("")
}

fn text_or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Resolves a mapped column name: exact match first, then case-insensitive.
fn find_column<'a>(columns: &HashSet<&'a str>, wanted: &str) -> Option<&'a str> {
    let wanted = wanted.trim();
    if wanted.is_empty() {
        return None;
    }
    if let Some(exact) = columns.get(wanted) {
        return Some(*exact);
    }
    columns
        .iter()
        .find(|c| c.trim().eq_ignore_ascii_case(wanted))
        .copied()
}

fn require_column<'a>(
    columns: &HashSet<&'a str>,
    field: &str,
    wanted: Option<&str>,
) -> Result<&'a str, ForecastError> {
    optional_column(columns, wanted).ok_or_else(|| ForecastError::MissingColumn {
        field: field.to_string(),
    })
}

fn optional_column<'a>(columns: &HashSet<&'a str>, wanted: Option<&str>) -> Option<&'a str> {
    wanted.and_then(|w| find_column(columns, w))
}

fn records_to_table(records: &[Map<String, Value>]) -> Table {
    records
        .iter()
        .map(|record| {
            record
                .iter()
                .map(|(k, v)| (k.clone(), value_to_text(v)))
                .collect()
        })
        .collect()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn csv_to_table(text: &str) -> Result<Table, ForecastError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ForecastError::Csv(e.to_string()))?
        .clone();

    let mut table = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ForecastError::Csv(e.to_string()))?;
        let row: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        table.push(row);
    }
    Ok(table)
}
