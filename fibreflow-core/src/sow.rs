//! Scope-of-work records: poles, drops and fibre segments.
//!
//! Input types deserialize from both JSON request bodies and CSV rows, so the
//! HTTP upload and the CLI import share one validation path.

use std::collections::HashMap;
use std::io::Read;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FibreError, Result};

/// Rows per bulk statement
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Import step tracked in `sow_import_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStep {
    Poles,
    Drops,
    Fibre,
}

impl ImportStep {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "poles" | "pole" => Some(Self::Poles),
            "drops" | "drop" => Some(Self::Drops),
            "fibre" | "fiber" => Some(Self::Fibre),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poles => "poles",
            Self::Drops => "drops",
            Self::Fibre => "fibre",
        }
    }

    /// Position in the poles → drops → fibre workflow.
    pub fn order(&self) -> i32 {
        match self {
            Self::Poles => 1,
            Self::Drops => 2,
            Self::Fibre => 3,
        }
    }
}

/// Something with a per-project natural key.
pub trait SowItem {
    /// Field name of the natural key, used in error reports
    const KEY_FIELD: &'static str;

    /// Natural key, trimmed; `None` when missing or blank.
    fn key(&self) -> Option<&str>;

    /// Validate and return the key.
    fn validated_key(&self) -> std::result::Result<&str, String> {
        self.key()
            .ok_or_else(|| format!("{} is required", Self::KEY_FIELD))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoleInput {
    #[serde(alias = "label_1", alias = "poleNumber")]
    pub pole_number: Option<String>,
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: Option<f64>,
    pub status: Option<String>,
    pub pole_type: Option<String>,
    pub pole_spec: Option<String>,
    pub height: Option<f64>,
    pub diameter: Option<f64>,
    pub owner: Option<String>,
    pub pon_no: Option<i32>,
    pub zone_no: Option<i32>,
    pub address: Option<String>,
    pub municipality: Option<String>,
    pub created_date: Option<String>,
    pub created_by: Option<String>,
    pub comments: Option<String>,
    pub raw_data: Option<Value>,
}

impl SowItem for PoleInput {
    const KEY_FIELD: &'static str = "pole_number";

    fn key(&self) -> Option<&str> {
        non_blank(self.pole_number.as_deref())
    }
}

impl PoleInput {
    pub fn status_or_default(&self) -> &str {
        non_blank(self.status.as_deref()).unwrap_or("pending")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropInput {
    #[serde(alias = "label", alias = "dropNumber")]
    pub drop_number: Option<String>,
    #[serde(alias = "strtfeat", alias = "poleNumber")]
    pub pole_number: Option<String>,
    pub cable_type: Option<String>,
    pub cable_spec: Option<String>,
    pub cable_length: Option<String>,
    pub cable_capacity: Option<String>,
    pub start_point: Option<String>,
    pub end_point: Option<String>,
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(alias = "lng", alias = "lon")]
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub pon_no: Option<i32>,
    pub zone_no: Option<i32>,
    pub municipality: Option<String>,
    pub status: Option<String>,
    pub created_date: Option<String>,
    pub created_by: Option<String>,
    pub raw_data: Option<Value>,
}

impl SowItem for DropInput {
    const KEY_FIELD: &'static str = "drop_number";

    fn key(&self) -> Option<&str> {
        non_blank(self.drop_number.as_deref())
    }
}

impl DropInput {
    pub fn status_or_default(&self) -> &str {
        non_blank(self.status.as_deref()).unwrap_or("planned")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FibreInput {
    #[serde(alias = "cable_id", alias = "segmentId")]
    pub segment_id: Option<String>,
    pub cable_size: Option<String>,
    pub layer: Option<String>,
    pub length: Option<f64>,
    pub distance: Option<f64>,
    pub pon_no: Option<i32>,
    pub zone_no: Option<i32>,
    pub string_completed: Option<f64>,
    pub date_completed: Option<String>,
    pub contractor: Option<String>,
    pub status: Option<String>,
    pub is_complete: Option<bool>,
    pub raw_data: Option<Value>,
}

impl SowItem for FibreInput {
    const KEY_FIELD: &'static str = "segment_id";

    fn key(&self) -> Option<&str> {
        non_blank(self.segment_id.as_deref())
    }
}

impl FibreInput {
    /// `length` wins over `distance`; zero when neither is given.
    pub fn resolved_distance(&self) -> f64 {
        self.length.or(self.distance).unwrap_or(0.0)
    }

    pub fn status_or_default(&self) -> &str {
        non_blank(self.status.as_deref()).unwrap_or("planned")
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Per-item failure collected during an upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub item: String,
    pub error: String,
}

/// Counts reported after an upsert pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub errors: Vec<ItemError>,
}

impl UpsertOutcome {
    pub fn merge(&mut self, other: UpsertOutcome) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.errors.extend(other.errors);
    }

    pub fn processed(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// An upload row as received: decoded, or the reason it could not be.
pub type Incoming<T> = std::result::Result<T, String>;

/// Decode JSON upload items one by one so a bad item fails alone.
pub fn decode_items<T: DeserializeOwned>(values: Vec<Value>) -> Vec<Incoming<T>> {
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
        .collect()
}

/// Upload rows ready for the database, one per key.
#[derive(Debug)]
pub struct Partitioned<T> {
    /// Last occurrence of each key, in first-seen order
    pub items: Vec<T>,
    /// Earlier rows per key that a later row replaced
    pub superseded: HashMap<String, u64>,
    pub errors: Vec<ItemError>,
}

/// Split incoming rows into keyed items and per-item errors.
///
/// A key repeated within one upload behaves like successive upserts: the
/// later row replaces the earlier one, which is counted in `superseded`.
pub fn partition_valid<T, I>(items: I) -> Partitioned<T>
where
    T: SowItem,
    I: IntoIterator<Item = Incoming<T>>,
{
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut out = Partitioned {
        items: Vec::new(),
        superseded: HashMap::new(),
        errors: Vec::new(),
    };

    for (idx, incoming) in items.into_iter().enumerate() {
        let item = match incoming {
            Ok(item) => item,
            Err(error) => {
                out.errors.push(ItemError {
                    item: format!("#{}", idx + 1),
                    error,
                });
                continue;
            }
        };
        let key = match item.validated_key() {
            Ok(key) => key.to_owned(),
            Err(error) => {
                out.errors.push(ItemError {
                    item: format!("#{}", idx + 1),
                    error,
                });
                continue;
            }
        };
        match position.get(&key) {
            Some(&pos) => {
                out.items[pos] = item;
                *out.superseded.entry(key).or_insert(0) += 1;
            }
            None => {
                position.insert(key, out.items.len());
                out.items.push(item);
            }
        }
    }

    out
}

/// Aggregate fibre progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FibreStats {
    pub total_segments: i64,
    pub total_distance: f64,
    pub completed_segments: i64,
    pub completed_distance: f64,
}

impl FibreStats {
    /// Fold `(distance, is_complete)` pairs.
    pub fn from_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = (f64, bool)>,
    {
        segments
            .into_iter()
            .fold(Self::default(), |mut acc, (distance, complete)| {
                acc.total_segments += 1;
                acc.total_distance += distance;
                if complete {
                    acc.completed_segments += 1;
                    acc.completed_distance += distance;
                }
                acc
            })
    }

    pub fn completion_percentage(&self) -> f64 {
        completion_percentage(self.completed_distance, self.total_distance)
    }
}

/// Percentage rounded to two decimals; zero when `total` is zero.
pub fn completion_percentage(done: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    ((done / total) * 10_000.0).round() / 100.0
}

/// Read CSV rows into typed records.
///
/// Header names are matched against field names and aliases. A UTF-8 BOM on
/// the first header is removed.
pub fn parse_csv<T, R>(reader: R, delimiter: u8) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let cleaned: csv::StringRecord = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}'))
        .collect();
    rdr.set_headers(cleaned.clone());

    let mut out = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let item = record
            .deserialize(Some(&cleaned))
            .map_err(|e| FibreError::invalid_record(idx + 2, e.to_string()))?;
        out.push(item);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pole_aliases_from_json() {
        let pole: PoleInput =
            serde_json::from_value(json!({"label_1": "LAW.P.A001", "lat": -26.2, "lng": 28.3}))
                .unwrap();
        assert_eq!(pole.key(), Some("LAW.P.A001"));
        assert_eq!(pole.latitude, Some(-26.2));
        assert_eq!(pole.status_or_default(), "pending");
    }

    #[test]
    fn blank_key_is_rejected() {
        let drop = DropInput {
            drop_number: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(drop.validated_key().unwrap_err(), "drop_number is required");
    }

    #[test]
    fn fibre_length_wins_over_distance() {
        let f = FibreInput {
            length: Some(12.5),
            distance: Some(99.0),
            ..Default::default()
        };
        assert_eq!(f.resolved_distance(), 12.5);
        assert_eq!(FibreInput::default().resolved_distance(), 0.0);
    }

    fn segment(id: &str, contractor: &str) -> Incoming<FibreInput> {
        Ok(FibreInput {
            segment_id: Some(id.into()),
            contractor: Some(contractor.into()),
            ..Default::default()
        })
    }

    #[test]
    fn partition_keeps_last_occurrence_and_reports_missing_keys() {
        let items = vec![
            segment("S1", "first"),
            Ok(FibreInput::default()),
            segment("S2", "only"),
            segment("S1", "second"),
            segment(" S1 ", "third"),
        ];
        let parts = partition_valid(items);
        assert_eq!(parts.items.len(), 2);
        assert_eq!(parts.items[0].contractor.as_deref(), Some("third"));
        assert_eq!(parts.items[1].key(), Some("S2"));
        assert_eq!(parts.superseded["S1"], 2);
        assert!(!parts.superseded.contains_key("S2"));
        assert_eq!(parts.errors.len(), 1);
        assert_eq!(parts.errors[0].item, "#2");
    }

    #[test]
    fn undecodable_items_fail_alone() {
        let decoded: Vec<Incoming<PoleInput>> = decode_items(vec![
            json!({"pole_number": "P1"}),
            json!({"pole_number": "P2", "pon_no": "seven"}),
            json!("not an object"),
        ]);
        let parts = partition_valid(decoded);
        assert_eq!(parts.items.len(), 1);
        assert_eq!(parts.items[0].key(), Some("P1"));
        let failed: Vec<&str> = parts.errors.iter().map(|e| e.item.as_str()).collect();
        assert_eq!(failed, vec!["#2", "#3"]);
        assert!(parts.errors[0].error.contains("invalid type"));
    }

    #[test]
    fn fibre_stats_fold() {
        let stats = FibreStats::from_segments([(100.0, true), (50.0, false), (50.0, true)]);
        assert_eq!(stats.total_segments, 3);
        assert_eq!(stats.completed_segments, 2);
        assert_eq!(stats.total_distance, 200.0);
        assert_eq!(stats.completed_distance, 150.0);
        assert_eq!(stats.completion_percentage(), 75.0);
    }

    #[test]
    fn completion_percentage_rounds_and_guards_zero() {
        assert_eq!(completion_percentage(1.0, 3.0), 33.33);
        assert_eq!(completion_percentage(5.0, 0.0), 0.0);
    }

    #[test]
    fn import_step_order() {
        let mut steps = vec![ImportStep::Fibre, ImportStep::Poles, ImportStep::Drops];
        steps.sort_by_key(ImportStep::order);
        assert_eq!(
            steps,
            vec![ImportStep::Poles, ImportStep::Drops, ImportStep::Fibre]
        );
        assert_eq!(ImportStep::parse("fiber"), Some(ImportStep::Fibre));
    }

    #[test]
    fn csv_rows_with_bom_and_blank_values() {
        let data = "\u{feff}pole_number,lat,lng,height\nP1,-26.2,28.3,\n,,,\nP2,-26.25,28.31,9\n";
        let poles: Vec<PoleInput> = parse_csv(data.as_bytes(), b',').unwrap();
        assert_eq!(poles.len(), 2);
        assert_eq!(poles[0].pole_number.as_deref(), Some("P1"));
        assert_eq!(poles[0].height, None);
        assert_eq!(poles[1].height, Some(9.0));
    }
}
