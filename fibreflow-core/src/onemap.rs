//! OneMap field-data export: parsing, verification and change planning.
//!
//! Exports arrive as `;`-delimited CSV with free-form headers. Records are
//! kept as header → value maps; accessors pull the columns the import
//! pipeline cares about.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;
use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FibreError, Result};

pub const COL_PROPERTY_ID: &str = "Property ID";
pub const COL_NAD_ID: &str = "1map NAD ID";
pub const COL_POLE_NUMBER: &str = "Pole Number";
pub const COL_DROP_NUMBER: &str = "Drop Number";
pub const COL_STATUS: &str = "Status";
pub const COL_LATITUDE: &str = "Latitude";
pub const COL_LONGITUDE: &str = "Longitude";
pub const COL_LAT_LNG: &str = "Latitude Longitude";
pub const COL_ADDRESS: &str = "Location Address";
pub const COL_SITE: &str = "Site";
pub const COL_PONS: &str = "PONs";
pub const COL_SECTIONS: &str = "Sections";
pub const COL_FLOW_NAME_GROUPS: &str = "Flow Name Groups";
pub const COL_POLE_PERMISSION_AGENT: &str = "Field Agent Name (pole permission)";
pub const COL_LAST_MODIFIED: &str = "lst_mod_dt";
pub const COL_LAST_MODIFIED_DATE: &str = "Last Modified Date";

/// More drops than this on one pole is a data error
pub const MAX_DROPS_PER_POLE: usize = 12;

/// Lawley build area
pub const LAWLEY_LAT: (f64, f64) = (-26.35, -26.15);
pub const LAWLEY_LNG: (f64, f64) = (28.20, 28.40);

/// Days between 1899-12-30 and the Unix epoch
const EXCEL_EPOCH_OFFSET_DAYS: f64 = 25569.0;

/// One row of an export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OneMapRecord {
    pub fields: BTreeMap<String, String>,
}

impl OneMapRecord {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Trimmed, non-empty column value.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn property_id(&self) -> Option<&str> {
        self.get(COL_PROPERTY_ID)
    }

    pub fn pole_number(&self) -> Option<&str> {
        self.get(COL_POLE_NUMBER)
    }

    pub fn drop_number(&self) -> Option<&str> {
        self.get(COL_DROP_NUMBER)
    }

    pub fn status(&self) -> Option<&str> {
        self.get(COL_STATUS)
    }

    pub fn address(&self) -> Option<&str> {
        self.get(COL_ADDRESS)
    }

    /// Latitude/longitude from the split columns, falling back to the
    /// combined `"lat,lng"` column.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.get(COL_LATITUDE).and_then(parse_coordinate);
        let lng = self.get(COL_LONGITUDE).and_then(parse_coordinate);
        if let (Some(lat), Some(lng)) = (lat, lng) {
            return Some((lat, lng));
        }

        let combined = self.get(COL_LAT_LNG)?;
        let (lat, lng) = combined.split_once(',')?;
        Some((parse_coordinate(lat)?, parse_coordinate(lng)?))
    }

    /// Best available identifier for tracking this row across imports.
    pub fn tracking_id(&self) -> TrackingId {
        if let Some(pole) = self.pole_number() {
            return TrackingId::new(TrackingKind::Pole, pole);
        }
        if let Some(drop) = self.drop_number() {
            return TrackingId::new(TrackingKind::Drop, drop);
        }
        if let Some((lat, lng)) = self.coordinates() {
            return TrackingId::new(TrackingKind::Gps, format!("{:.4},{:.4}", lat, lng));
        }
        if let Some(address) = self.address() {
            return TrackingId::new(TrackingKind::Address, address);
        }
        TrackingId::new(
            TrackingKind::PropertyId,
            self.property_id().unwrap_or_default(),
        )
    }

    pub fn normalized_status(&self) -> String {
        self.status().map(normalize_status).unwrap_or_default()
    }

    /// Modification timestamp from either export column name.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.get(COL_LAST_MODIFIED)
            .or_else(|| self.get(COL_LAST_MODIFIED_DATE))
            .and_then(parse_export_date)
    }
}

fn parse_coordinate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingKind {
    Pole,
    Drop,
    Gps,
    Address,
    PropertyId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingId {
    #[serde(rename = "type")]
    pub kind: TrackingKind,
    pub value: String,
}

impl TrackingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pole => "pole",
            Self::Drop => "drop",
            Self::Gps => "gps",
            Self::Address => "address",
            Self::PropertyId => "property_id",
        }
    }
}

impl TrackingId {
    fn new(kind: TrackingKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Lower-case, collapse whitespace and fold known spelling variants.
pub fn normalize_status(status: &str) -> String {
    status
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("permissions", "permission")
        .replace("sign ups", "sign up")
        .replace("home sign up", "home signup")
        .trim()
        .to_string()
}

/// Milestones counted on first appearance per pole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    PolePermission,
    PolePlanted,
    HomeSignup,
    HomeInstall,
}

impl Milestone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PolePermission => "pole_permission",
            Self::PolePlanted => "pole_planted",
            Self::HomeSignup => "home_signup",
            Self::HomeInstall => "home_install",
        }
    }

    pub fn classify(normalized_status: &str) -> Option<Self> {
        if normalized_status.contains("pole permission") {
            Some(Self::PolePermission)
        } else if normalized_status.contains("pole planted") || normalized_status.contains("installed") {
            Some(Self::PolePlanted)
        } else if normalized_status.contains("home signup") {
            Some(Self::HomeSignup)
        } else if normalized_status.contains("home install") {
            Some(Self::HomeInstall)
        } else {
            None
        }
    }
}

/// Convert an Excel serial day number to a UTC timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<DateTime<Utc>> {
    if !serial.is_finite() {
        return None;
    }
    let millis = ((serial - EXCEL_EPOCH_OFFSET_DAYS) * 86_400_000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
}

/// Parse the date formats seen in exports: Excel serials, RFC 3339,
/// `YYYY-MM-DD HH:MM:SS`, `YYYY/MM/DD HH:MM` and bare dates.
pub fn parse_export_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(serial) = value.parse::<f64>() {
        return excel_serial_to_datetime(serial);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Batch identifier derived from the import start time.
pub fn batch_id(now: DateTime<Utc>) -> String {
    format!("IMP_{}", now.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}

/// Parse a OneMap CSV export.
///
/// Rows without a `Property ID` are rejected: the staging table is keyed on it.
pub fn parse_csv<R: Read>(reader: R, delimiter: u8) -> Result<Vec<OneMapRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(FibreError::empty_input("OneMap export"));
    }
    if !headers.iter().any(|h| h == COL_PROPERTY_ID) {
        return Err(FibreError::missing_column(COL_PROPERTY_ID));
    }

    let mut records = Vec::new();
    for (idx, row) in rdr.records().enumerate() {
        let row = row?;
        if row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let record = OneMapRecord::from_pairs(
            headers
                .iter()
                .zip(row.iter())
                .filter(|(h, _)| !h.is_empty())
                .map(|(h, v)| (h.clone(), v.to_string())),
        );
        if record.property_id().is_none() {
            return Err(FibreError::invalid_record(idx + 2, "missing Property ID"));
        }
        records.push(record);
    }

    Ok(records)
}

/// Totals over the whole export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountVerification {
    pub total_records: usize,
    pub unique_property_ids: usize,
    pub unique_poles: usize,
    pub unique_addresses: usize,
    pub duplicate_property_ids: usize,
    pub status_breakdown: BTreeMap<String, usize>,
}

pub fn verify_counts(records: &[OneMapRecord]) -> CountVerification {
    let mut property_ids = HashSet::new();
    let mut poles = HashSet::new();
    let mut addresses = HashSet::new();
    let mut status_breakdown = BTreeMap::new();

    for r in records {
        property_ids.insert(r.property_id().unwrap_or_default());
        if let Some(p) = r.pole_number() {
            poles.insert(p);
        }
        if let Some(a) = r.address() {
            addresses.insert(a);
        }
        *status_breakdown
            .entry(r.status().unwrap_or("No Status").to_string())
            .or_insert(0) += 1;
    }

    CountVerification {
        total_records: records.len(),
        unique_property_ids: property_ids.len(),
        unique_poles: poles.len(),
        unique_addresses: addresses.len(),
        duplicate_property_ids: records.len() - property_ids.len(),
        status_breakdown,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check<T> {
    pub passed: bool,
    pub violations: Vec<T>,
}

impl<T> Check<T> {
    fn from_violations(violations: Vec<T>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

impl<T> Default for Check<T> {
    fn default() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropViolation {
    pub pole: String,
    pub drop_count: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsViolation {
    pub property_id: String,
    pub pole_number: Option<String>,
    pub gps: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusConflict {
    pub pole: String,
    pub conflicting_statuses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessChecks {
    pub drops_per_pole: Check<DropViolation>,
    pub gps_bounds: Check<GpsViolation>,
    pub conflicting_statuses: Check<StatusConflict>,
}

impl BusinessChecks {
    pub fn passed(&self) -> bool {
        self.drops_per_pole.passed && self.gps_bounds.passed && self.conflicting_statuses.passed
    }
}

pub fn within_lawley(lat: f64, lng: f64) -> bool {
    (LAWLEY_LAT.0..=LAWLEY_LAT.1).contains(&lat) && (LAWLEY_LNG.0..=LAWLEY_LNG.1).contains(&lng)
}

pub fn check_business_logic(records: &[OneMapRecord]) -> BusinessChecks {
    let mut drops_per_pole: BTreeMap<&str, HashSet<&str>> = BTreeMap::new();
    let mut statuses_per_pole: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut gps_violations = Vec::new();

    for r in records {
        let pole = r.pole_number();

        if let (Some(pole), Some(drop)) = (pole, r.drop_number()) {
            drops_per_pole.entry(pole).or_default().insert(drop);
        }

        if let Some((lat, lng)) = r.coordinates() {
            if !within_lawley(lat, lng) {
                gps_violations.push(GpsViolation {
                    property_id: r.property_id().unwrap_or_default().to_string(),
                    pole_number: pole.map(str::to_string),
                    gps: format!("{},{}", lat, lng),
                    address: r.address().map(str::to_string),
                });
            }
        }

        if let Some(pole) = pole {
            statuses_per_pole
                .entry(pole)
                .or_default()
                .insert(r.status().unwrap_or_default());
        }
    }

    let drop_violations = drops_per_pole
        .into_iter()
        .filter(|(_, drops)| drops.len() > MAX_DROPS_PER_POLE)
        .map(|(pole, drops)| DropViolation {
            pole: pole.to_string(),
            drop_count: drops.len(),
            limit: MAX_DROPS_PER_POLE,
        })
        .collect();

    let conflicts = statuses_per_pole
        .into_iter()
        .filter(|(_, statuses)| statuses.len() > 1)
        .map(|(pole, statuses)| StatusConflict {
            pole: pole.to_string(),
            conflicting_statuses: statuses.into_iter().map(str::to_string).collect(),
        })
        .collect();

    BusinessChecks {
        drops_per_pole: Check::from_violations(drop_violations),
        gps_bounds: Check::from_violations(gps_violations),
        conflicting_statuses: Check::from_violations(conflicts),
    }
}

/// What the staging table already holds for a property
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub version: i32,
    pub status: Option<String>,
}

/// Write plan for one incoming row
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPlan {
    pub property_id: String,
    pub tracking: TrackingId,
    pub normalized_status: String,
    pub is_new: bool,
    pub version: i32,
    pub status_change: Option<StatusChange>,
    pub first_instance: Option<Option<Milestone>>,
}

impl RecordPlan {
    pub fn is_first_instance(&self) -> bool {
        self.first_instance.is_some()
    }

    pub fn change_type(&self) -> &'static str {
        match (self.is_new, &self.status_change) {
            (true, _) => "new",
            (false, Some(_)) => "status_change",
            (false, None) => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub property_id: String,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub pole_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPole {
    pub pole: String,
    pub address: Option<String>,
    pub status: Option<String>,
    pub is_first_instance: bool,
}

/// Tracks `(pole, normalized status)` pairs already seen in this import.
#[derive(Debug, Default)]
pub struct FirstInstanceTracker {
    seen: HashSet<(String, String)>,
}

impl FirstInstanceTracker {
    /// Seed with pairs recorded by earlier imports.
    pub fn with_known<I>(known: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            seen: known.into_iter().collect(),
        }
    }

    /// Returns true the first time a pole reaches a status.
    pub fn observe(&mut self, tracking: &TrackingId, normalized_status: &str) -> bool {
        if tracking.kind != TrackingKind::Pole || normalized_status.is_empty() {
            return false;
        }
        self.seen
            .insert((tracking.value.clone(), normalized_status.to_string()))
    }
}

/// Decide how to write a row given what is stored for it.
pub fn plan_record(
    record: &OneMapRecord,
    existing: Option<&StoredRecord>,
    tracker: &mut FirstInstanceTracker,
) -> RecordPlan {
    let property_id = record.property_id().unwrap_or_default().to_string();
    let tracking = record.tracking_id();
    let normalized_status = record.normalized_status();
    let first = tracker.observe(&tracking, &normalized_status);

    let status_change = existing.and_then(|stored| {
        let new_status = record.status().map(str::to_string);
        (stored.status != new_status).then(|| StatusChange {
            property_id: property_id.clone(),
            old_status: stored.status.clone(),
            new_status,
            pole_number: record.pole_number().map(str::to_string),
        })
    });

    RecordPlan {
        property_id,
        normalized_status: normalized_status.clone(),
        is_new: existing.is_none(),
        version: existing.map_or(1, |s| s.version + 1),
        status_change,
        first_instance: first.then(|| Milestone::classify(&normalized_status)),
        tracking,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_records: usize,
    pub new_records: usize,
    pub updated_records: usize,
    pub duplicate_property_ids: usize,
    pub first_pole_permissions: usize,
    pub first_pole_planted: usize,
    pub first_home_signups: usize,
    pub first_home_installs: usize,
    pub total_home_signups: usize,
    pub verification_passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportChecks {
    pub count_verification: CountVerification,
    pub business_logic_checks: BusinessChecks,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportChanges {
    pub new_poles: Vec<NewPole>,
    pub status_changes: Vec<StatusChange>,
}

/// Verification report for one import batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch_id: String,
    pub file_name: String,
    pub summary: ImportSummary,
    pub checks: ImportChecks,
    pub changes: ImportChanges,
}

impl ImportReport {
    /// Run the record-independent checks.
    pub fn verify(batch_id: &str, file_name: &str, records: &[OneMapRecord]) -> Self {
        let counts = verify_counts(records);
        let business = check_business_logic(records);
        Self {
            batch_id: batch_id.to_string(),
            file_name: file_name.to_string(),
            summary: ImportSummary {
                total_records: records.len(),
                duplicate_property_ids: counts.duplicate_property_ids,
                verification_passed: business.passed(),
                ..Default::default()
            },
            checks: ImportChecks {
                count_verification: counts,
                business_logic_checks: business,
            },
            changes: ImportChanges::default(),
        }
    }

    /// Fold one applied plan into the counters.
    pub fn record(&mut self, record: &OneMapRecord, plan: &RecordPlan) {
        if plan.is_new {
            self.summary.new_records += 1;
            if let Some(pole) = record.pole_number() {
                self.changes.new_poles.push(NewPole {
                    pole: pole.to_string(),
                    address: record.address().map(str::to_string),
                    status: record.status().map(str::to_string),
                    is_first_instance: plan.is_first_instance(),
                });
            }
        } else {
            self.summary.updated_records += 1;
        }

        if let Some(change) = &plan.status_change {
            self.changes.status_changes.push(change.clone());
        }

        match plan.first_instance {
            Some(Some(Milestone::PolePermission)) => self.summary.first_pole_permissions += 1,
            Some(Some(Milestone::PolePlanted)) => self.summary.first_pole_planted += 1,
            Some(Some(Milestone::HomeSignup)) => self.summary.first_home_signups += 1,
            Some(Some(Milestone::HomeInstall)) => self.summary.first_home_installs += 1,
            _ => {}
        }

        if plan.normalized_status.contains("home signup") && record.drop_number().is_some() {
            self.summary.total_home_signups += 1;
        }
    }

    /// Plain-text rendering stored beside the JSON report.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let pass = |ok: bool| if ok { "PASSED" } else { "FAILED" };
        let checks = &self.checks.business_logic_checks;

        let _ = writeln!(out, "OneMap import report");
        let _ = writeln!(out, "Batch: {}", self.batch_id);
        let _ = writeln!(out, "File: {}", self.file_name);
        let _ = writeln!(out);
        let _ = writeln!(out, "Summary");
        let _ = writeln!(out, "- Total records: {}", self.summary.total_records);
        let _ = writeln!(out, "- New records: {}", self.summary.new_records);
        let _ = writeln!(out, "- Updated records: {}", self.summary.updated_records);
        let _ = writeln!(out, "- Duplicate property ids: {}", self.summary.duplicate_property_ids);
        let _ = writeln!(out, "- First pole permissions: {}", self.summary.first_pole_permissions);
        let _ = writeln!(out, "- First poles planted: {}", self.summary.first_pole_planted);
        let _ = writeln!(out, "- First home signups: {}", self.summary.first_home_signups);
        let _ = writeln!(out, "- First home installs: {}", self.summary.first_home_installs);
        let _ = writeln!(out, "- Total home signups: {}", self.summary.total_home_signups);
        let _ = writeln!(out);
        let _ = writeln!(out, "Status breakdown");
        for (status, count) in &self.checks.count_verification.status_breakdown {
            let _ = writeln!(out, "- {}: {}", status, count);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Checks");
        let _ = writeln!(
            out,
            "- Drops per pole (max {}): {} ({} violations)",
            MAX_DROPS_PER_POLE,
            pass(checks.drops_per_pole.passed),
            checks.drops_per_pole.violations.len()
        );
        let _ = writeln!(
            out,
            "- GPS bounds: {} ({} violations)",
            pass(checks.gps_bounds.passed),
            checks.gps_bounds.violations.len()
        );
        let _ = writeln!(
            out,
            "- Status conflicts: {} ({} poles)",
            pass(checks.conflicting_statuses.passed),
            checks.conflicting_statuses.violations.len()
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Changes");
        let _ = writeln!(out, "- New poles: {}", self.changes.new_poles.len());
        let _ = writeln!(out, "- Status changes: {}", self.changes.status_changes.len());
        let _ = writeln!(
            out,
            "Verification: {}",
            pass(self.summary.verification_passed)
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(pairs: &[(&str, &str)]) -> OneMapRecord {
        OneMapRecord::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn tracking_priority() {
        let r = record(&[(COL_PROPERTY_ID, "1"), (COL_POLE_NUMBER, "LAW.P.B167"), (COL_DROP_NUMBER, "DR1")]);
        assert_eq!(r.tracking_id().kind, TrackingKind::Pole);

        let r = record(&[(COL_PROPERTY_ID, "1"), (COL_DROP_NUMBER, "DR1")]);
        assert_eq!(r.tracking_id().kind, TrackingKind::Drop);

        let r = record(&[(COL_PROPERTY_ID, "1"), (COL_LATITUDE, "-26.123456"), (COL_LONGITUDE, "28.2")]);
        assert_eq!(r.tracking_id(), TrackingId::new(TrackingKind::Gps, "-26.1235,28.2000"));

        let r = record(&[(COL_PROPERTY_ID, "1"), (COL_ADDRESS, " 12 Main Rd ")]);
        assert_eq!(r.tracking_id().value, "12 Main Rd");

        let r = record(&[(COL_PROPERTY_ID, "77")]);
        assert_eq!(r.tracking_id(), TrackingId::new(TrackingKind::PropertyId, "77"));
    }

    #[test]
    fn combined_coordinates_fallback() {
        let r = record(&[(COL_LAT_LNG, "-26.2, 28.3")]);
        assert_eq!(r.coordinates(), Some((-26.2, 28.3)));
    }

    #[test]
    fn status_normalization() {
        assert_eq!(
            normalize_status("Pole Permissions:   Approved"),
            "pole permission: approved"
        );
        assert_eq!(normalize_status("Home Sign Ups: Approved"), "home signup: approved");
        assert_eq!(
            Milestone::classify(&normalize_status("Home Installation: Installed")),
            Some(Milestone::PolePlanted)
        );
        assert_eq!(Milestone::classify("unknown"), None);
    }

    #[test]
    fn excel_serial_dates() {
        let dt = excel_serial_to_datetime(45292.5).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        assert!(parse_export_date("2024-03-05").is_some());
        assert!(parse_export_date("2024/03/05 10:15").is_some());
        assert!(parse_export_date("not a date").is_none());

        let r = record(&[(COL_LAST_MODIFIED_DATE, "45292.5")]);
        assert_eq!(r.last_modified(), Some(dt));
    }

    #[test]
    fn batch_id_format() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 8, 30, 15).unwrap();
        assert_eq!(batch_id(now), "IMP_2025-07-01T08-30-15-000Z");
    }

    #[test]
    fn parses_semicolon_csv_with_bom() {
        let data = "\u{feff}Property ID;Pole Number;Status\n1;P1;Pole Permission: Approved\n;;\n2;;\n";
        let records = parse_csv(data.as_bytes(), b';').unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pole_number(), Some("P1"));
        assert_eq!(records[1].pole_number(), None);
    }

    #[test]
    fn csv_without_property_column_is_rejected() {
        let err = parse_csv("Pole Number\nP1\n".as_bytes(), b';').unwrap_err();
        assert!(matches!(err, FibreError::MissingColumn { .. }));
    }

    #[test]
    fn business_checks_flag_violations() {
        let mut records: Vec<OneMapRecord> = (0..13)
            .map(|i| {
                record(&[
                    (COL_PROPERTY_ID, &i.to_string()),
                    (COL_POLE_NUMBER, "P1"),
                    (COL_DROP_NUMBER, &format!("D{}", i)),
                    (COL_STATUS, "Pole Permission: Approved"),
                ])
            })
            .collect();
        records.push(record(&[
            (COL_PROPERTY_ID, "99"),
            (COL_POLE_NUMBER, "P1"),
            (COL_STATUS, "Pole Planted"),
            (COL_LATITUDE, "-25.0"),
            (COL_LONGITUDE, "28.3"),
        ]));

        let checks = check_business_logic(&records);
        assert!(!checks.passed());
        assert_eq!(checks.drops_per_pole.violations[0].drop_count, 13);
        assert_eq!(checks.gps_bounds.violations.len(), 1);
        assert_eq!(checks.conflicting_statuses.violations[0].conflicting_statuses.len(), 2);
    }

    #[test]
    fn counts_duplicates_and_statuses() {
        let records = vec![
            record(&[(COL_PROPERTY_ID, "1"), (COL_STATUS, "A")]),
            record(&[(COL_PROPERTY_ID, "1"), (COL_STATUS, "A")]),
            record(&[(COL_PROPERTY_ID, "2")]),
        ];
        let counts = verify_counts(&records);
        assert_eq!(counts.unique_property_ids, 2);
        assert_eq!(counts.duplicate_property_ids, 1);
        assert_eq!(counts.status_breakdown["A"], 2);
        assert_eq!(counts.status_breakdown["No Status"], 1);
    }

    #[test]
    fn plan_new_then_changed() {
        let mut tracker = FirstInstanceTracker::default();
        let r = record(&[
            (COL_PROPERTY_ID, "1"),
            (COL_POLE_NUMBER, "P1"),
            (COL_STATUS, "Pole Permission: Approved"),
        ]);

        let plan = plan_record(&r, None, &mut tracker);
        assert!(plan.is_new);
        assert_eq!(plan.version, 1);
        assert_eq!(plan.first_instance, Some(Some(Milestone::PolePermission)));
        assert_eq!(plan.change_type(), "new");

        let stored = StoredRecord {
            version: 3,
            status: Some("Pole Permission: Pending".into()),
        };
        let plan = plan_record(&r, Some(&stored), &mut tracker);
        assert!(!plan.is_new);
        assert_eq!(plan.version, 4);
        assert!(plan.status_change.is_some());
        assert!(!plan.is_first_instance());
        assert_eq!(plan.change_type(), "status_change");
    }

    #[test]
    fn report_counts_milestones_and_text() {
        let records = vec![
            record(&[
                (COL_PROPERTY_ID, "1"),
                (COL_POLE_NUMBER, "P1"),
                (COL_STATUS, "Pole Permission: Approved"),
            ]),
            record(&[
                (COL_PROPERTY_ID, "2"),
                (COL_DROP_NUMBER, "D1"),
                (COL_STATUS, "Home Sign Ups: Approved"),
            ]),
        ];
        let mut report = ImportReport::verify("IMP_x", "export.csv", &records);
        let mut tracker = FirstInstanceTracker::default();
        for r in &records {
            let plan = plan_record(r, None, &mut tracker);
            report.record(r, &plan);
        }

        assert_eq!(report.summary.new_records, 2);
        assert_eq!(report.summary.first_pole_permissions, 1);
        assert_eq!(report.summary.total_home_signups, 1);
        assert_eq!(report.changes.new_poles.len(), 1);

        let text = report.render_text();
        assert!(text.contains("Batch: IMP_x"));
        assert!(text.contains("New records: 2"));
    }
}
