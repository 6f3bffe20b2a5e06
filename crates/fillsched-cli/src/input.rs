//! Loading lots, configuration and sequences from files

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use fillsched_core::{Configuration, Lot, LotId};
use std::path::Path;

/// Configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "fillsched.toml";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp; a bare date means midnight
pub fn parse_datetime(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for format in DATETIME_FORMATS {
        if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(at);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .with_context(|| format!("invalid date/time '{text}' (expected YYYY-MM-DD[ HH:MM[:SS]])"))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Load configuration from `path`, else `fillsched.toml`, else defaults
pub fn load_config(path: Option<&Path>) -> Result<Configuration> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                tracing::debug!("no configuration file, using defaults");
                return Ok(Configuration::default());
            }
            fallback.to_path_buf()
        }
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = if is_json(&path) {
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse JSON config {}", path.display()))?
    } else {
        toml::from_str(&text)
            .with_context(|| format!("failed to parse TOML config {}", path.display()))?
    };
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Load lots from a CSV or JSON file
pub fn load_lots(path: &Path, config: &Configuration) -> Result<Vec<Lot>> {
    if is_json(path) {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("failed to parse lots from {}", path.display()));
    }
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_lots_csv(file, config).with_context(|| format!("failed to read lots from {}", path.display()))
}

/// Column positions resolved from the CSV header
struct Columns {
    lot_id: usize,
    lot_type: usize,
    vials: usize,
    fill_hours: Option<usize>,
    priority: Option<usize>,
    target_start: Option<usize>,
    target_end: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| find(name).with_context(|| format!("missing column '{name}'"));
        Ok(Self {
            lot_id: required("Lot ID")?,
            lot_type: required("Type")?,
            vials: required("Vials")?,
            fill_hours: find("Fill Hours"),
            priority: find("Priority"),
            target_start: find("Target Start"),
            target_end: find("Target End"),
        })
    }
}

fn string_field(record: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| record.get(i))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Read lots from CSV. `Fill Hours` falls back to vials / `fill_rate_vph`.
pub fn read_lots_csv<R: std::io::Read>(reader: R, config: &Configuration) -> Result<Vec<Lot>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut lots = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let row = row_idx + 2;

        let lot_id = string_field(&record, Some(columns.lot_id)).unwrap_or_default();
        let lot_type = string_field(&record, Some(columns.lot_type)).unwrap_or_default();
        let vials_text = string_field(&record, Some(columns.vials)).unwrap_or_default();
        let Ok(vials) = vials_text.replace(',', "").parse::<i64>() else {
            bail!("row {row}: invalid Vials '{vials_text}'");
        };

        let mut lot = match string_field(&record, columns.fill_hours) {
            Some(text) => {
                let hours = text
                    .parse::<f64>()
                    .with_context(|| format!("row {row}: invalid Fill Hours '{text}'"))?;
                Lot::new(lot_id, lot_type, vials, hours)
            }
            None => Lot::from_quantity(lot_id, lot_type, vials, config.fill_rate_vph),
        };

        if let Some(level) = string_field(&record, columns.priority) {
            lot = lot.priority(level.to_ascii_lowercase());
        }
        let target_start = string_field(&record, columns.target_start)
            .map(|s| parse_datetime(&s).with_context(|| format!("row {row}: Target Start")))
            .transpose()?;
        let target_end = string_field(&record, columns.target_end)
            .map(|s| parse_datetime(&s).with_context(|| format!("row {row}: Target End")))
            .transpose()?;
        lots.push(lot.window(target_start, target_end));
    }
    Ok(lots)
}

/// Lot ids, one per line (first CSV field); `#` comments and a `Lot ID` header are skipped
pub fn load_sequence(path: &Path) -> Result<Vec<LotId>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sequence {}", path.display()))?;
    Ok(parse_sequence(&text))
}

pub fn parse_sequence(text: &str) -> Vec<LotId> {
    text.lines()
        .map(|line| line.split(',').next().unwrap_or_default().trim())
        .filter(|id| !id.is_empty() && !id.starts_with('#'))
        .filter(|id| !id.eq_ignore_ascii_case("lot id"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn csv_with_and_without_fill_hours() {
        let csv = "\
Lot ID,Type,Vials,Fill Hours,Priority,Target End
L001,VialE,39840,,High,
L002,VialH,\"120,000\",5.5,,2025-01-08 12:00
";
        let lots = read_lots_csv(csv.as_bytes(), &Configuration::default()).unwrap();
        assert_eq!(lots.len(), 2);
        assert!((lots[0].fill_hours - 2.0).abs() < 1e-9);
        assert_eq!(lots[0].priority.as_deref(), Some("high"));
        assert_eq!(lots[1].quantity, 120_000);
        assert_eq!(lots[1].fill_hours, 5.5);
        assert_eq!(
            lots[1].target_end,
            Some(parse_datetime("2025-01-08 12:00").unwrap())
        );
    }

    #[test]
    fn csv_missing_required_column() {
        let err = read_lots_csv("Lot ID,Type\nL1,A\n".as_bytes(), &Configuration::default())
            .unwrap_err();
        assert!(err.to_string().contains("Vials"));
    }

    #[test]
    fn datetime_formats() {
        let a = parse_datetime("2025-01-06 06:00").unwrap();
        let b = parse_datetime("2025-01-06T06:00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_datetime("2025-01-06").is_ok());
        assert!(parse_datetime("next monday").is_err());
    }

    #[test]
    fn sequence_lines() {
        let ids = parse_sequence("Lot ID\n# comment\nL3\n L1 ,extra\n\nL2\n");
        assert_eq!(ids, vec!["L3", "L1", "L2"]);
    }
}
