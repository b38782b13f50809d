//! SOW tracking: poles, drops and fibre segments per project
//!
//! Uploads upsert in chunks of `batch_size` rows, one statement per chunk.
//! A failed chunk is retried row by row so only the offending rows are
//! reported, and the rest of the upload continues; chunks are not atomic
//! together.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use fibreflow_core::sow::{
    partition_valid, DropInput, FibreInput, FibreStats, ImportStep, Incoming, ItemError,
    Partitioned, PoleInput, SowItem, UpsertOutcome,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::query_builder::Separated;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::DbError;

/// An upload row that maps onto one `sow_*` table.
///
/// `COLUMNS` starts with the natural key column, which matches
/// `SowItem::KEY_FIELD`; `push_row` binds values in the same order.
pub trait SowRecord: SowItem + Send + Sync {
    const STEP: ImportStep;
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn push_row(&self, row: &mut Separated<'_, '_, Postgres, &'static str>);
}

fn key_owned<T: SowItem>(item: &T) -> Option<String> {
    item.key().map(str::to_owned)
}

impl SowRecord for PoleInput {
    const STEP: ImportStep = ImportStep::Poles;
    const TABLE: &'static str = "sow_poles";
    const COLUMNS: &'static [&'static str] = &[
        "pole_number",
        "latitude",
        "longitude",
        "status",
        "pole_type",
        "pole_spec",
        "height",
        "diameter",
        "owner",
        "pon_no",
        "zone_no",
        "address",
        "municipality",
        "created_date",
        "created_by",
        "comments",
        "raw_data",
    ];

    fn push_row(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(key_owned(self))
            .push_bind(self.latitude)
            .push_bind(self.longitude)
            .push_bind(self.status_or_default().to_owned())
            .push_bind(self.pole_type.clone())
            .push_bind(self.pole_spec.clone())
            .push_bind(self.height)
            .push_bind(self.diameter)
            .push_bind(self.owner.clone())
            .push_bind(self.pon_no)
            .push_bind(self.zone_no)
            .push_bind(self.address.clone())
            .push_bind(self.municipality.clone())
            .push_bind(self.created_date.clone())
            .push_bind(self.created_by.clone())
            .push_bind(self.comments.clone())
            .push_bind(self.raw_data.clone());
    }
}

impl SowRecord for DropInput {
    const STEP: ImportStep = ImportStep::Drops;
    const TABLE: &'static str = "sow_drops";
    const COLUMNS: &'static [&'static str] = &[
        "drop_number",
        "pole_number",
        "cable_type",
        "cable_spec",
        "cable_length",
        "cable_capacity",
        "start_point",
        "end_point",
        "latitude",
        "longitude",
        "address",
        "pon_no",
        "zone_no",
        "municipality",
        "status",
        "created_date",
        "created_by",
        "raw_data",
    ];

    fn push_row(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        row.push_bind(key_owned(self))
            .push_bind(self.pole_number.as_deref().map(|p| p.trim().to_owned()))
            .push_bind(self.cable_type.clone())
            .push_bind(self.cable_spec.clone())
            .push_bind(self.cable_length.clone())
            .push_bind(self.cable_capacity.clone())
            .push_bind(self.start_point.clone())
            .push_bind(self.end_point.clone())
            .push_bind(self.latitude)
            .push_bind(self.longitude)
            .push_bind(self.address.clone())
            .push_bind(self.pon_no)
            .push_bind(self.zone_no)
            .push_bind(self.municipality.clone())
            .push_bind(self.status_or_default().to_owned())
            .push_bind(self.created_date.clone())
            .push_bind(self.created_by.clone())
            .push_bind(self.raw_data.clone());
    }
}

impl SowRecord for FibreInput {
    const STEP: ImportStep = ImportStep::Fibre;
    const TABLE: &'static str = "sow_fibre";
    const COLUMNS: &'static [&'static str] = &[
        "segment_id",
        "cable_size",
        "layer",
        "distance",
        "pon_no",
        "zone_no",
        "string_completed",
        "date_completed",
        "contractor",
        "status",
        "is_complete",
        "raw_data",
    ];

    fn push_row(&self, row: &mut Separated<'_, '_, Postgres, &'static str>) {
        let status = self.status_or_default();
        let complete = self
            .is_complete
            .unwrap_or_else(|| status.eq_ignore_ascii_case("completed"));
        row.push_bind(key_owned(self))
            .push_bind(self.cable_size.clone())
            .push_bind(self.layer.clone())
            .push_bind(self.resolved_distance())
            .push_bind(self.pon_no)
            .push_bind(self.zone_no)
            .push_bind(self.string_completed)
            .push_bind(self.date_completed.clone())
            .push_bind(self.contractor.clone())
            .push_bind(status.to_owned())
            .push_bind(complete)
            .push_bind(self.raw_data.clone());
    }
}

/// Postgres accepts at most this many bind parameters per statement
const MAX_BIND_PARAMS: usize = u16::MAX as usize;

/// Rows per statement: `batch_size`, capped so one chunk's binds fit.
fn chunk_rows<T: SowRecord>(batch_size: usize) -> usize {
    batch_size.clamp(1, MAX_BIND_PARAMS / (T::COLUMNS.len() + 1))
}

/// `col = EXCLUDED.col` for every non-key column.
fn update_set<T: SowRecord>() -> String {
    T::COLUMNS
        .iter()
        .skip(1)
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .chain(std::iter::once("updated_at = NOW()".to_owned()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn item_error<T: SowItem>(item: &T, error: &DbError) -> ItemError {
    ItemError {
        item: item.key().unwrap_or_default().to_owned(),
        error: error.to_string(),
    }
}

/// Status stored for an import step.
fn step_status(outcome: &UpsertOutcome) -> &'static str {
    match (outcome.processed(), outcome.errors.is_empty()) {
        (_, true) => "completed",
        (0, false) => "failed",
        (_, false) => "completed_with_errors",
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SowPole {
    pub id: Uuid,
    pub project_id: Uuid,
    pub pole_number: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SowDrop {
    pub id: Uuid,
    pub project_id: Uuid,
    pub drop_number: String,
    pub pole_number: Option<String>,
    pub cable_type: Option<String>,
    pub cable_spec: Option<String>,
    pub cable_length: Option<String>,
    pub cable_capacity: Option<String>,
    pub start_point: Option<String>,
    pub end_point: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub pon_no: Option<i32>,
    pub zone_no: Option<i32>,
    pub municipality: Option<String>,
    pub status: String,
    pub created_date: Option<String>,
    pub created_by: Option<String>,
    pub raw_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SowFibre {
    pub id: Uuid,
    pub project_id: Uuid,
    pub segment_id: String,
    pub cable_size: Option<String>,
    pub layer: Option<String>,
    pub distance: f64,
    pub pon_no: Option<i32>,
    pub zone_no: Option<i32>,
    pub string_completed: Option<f64>,
    pub date_completed: Option<String>,
    pub contractor: Option<String>,
    pub status: String,
    pub is_complete: bool,
    pub raw_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct SowSummary {
    pub project_id: Uuid,
    pub total_poles: i64,
    pub total_drops: i64,
    pub total_fibre_segments: i64,
    pub total_fibre_length: f64,
    pub completed_fibre_length: f64,
    pub poles_with_drops: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PoleDrops {
    pub pole_number: String,
    pub drop_count: i64,
    pub drop_numbers: Vec<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportStatus {
    pub import_type: String,
    pub status: String,
    pub records_imported: i64,
    pub error_count: i64,
    pub errors: Value,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSow {
    pub project_id: Uuid,
    pub poles: Vec<SowPole>,
    pub drops: Vec<SowDrop>,
    pub fibre: Vec<SowFibre>,
    pub summary: SowSummary,
    pub pole_drops: Vec<PoleDrops>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FibreReport {
    pub segments: Vec<SowFibre>,
    pub stats: FibreStats,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub inserted: u64,
    pub updated: u64,
    pub errors: Vec<ItemError>,
    pub summary: SowSummary,
}

/// Aggregates over the three SOW tables for project `$1`
const SUMMARY_SELECT: &str = r#"
    SELECT $1::uuid AS project_id,
           (SELECT COUNT(*) FROM sow_poles WHERE project_id = $1) AS total_poles,
           (SELECT COUNT(*) FROM sow_drops WHERE project_id = $1) AS total_drops,
           (SELECT COUNT(*) FROM sow_fibre WHERE project_id = $1) AS total_fibre_segments,
           (SELECT COALESCE(SUM(distance), 0) FROM sow_fibre WHERE project_id = $1)
               AS total_fibre_length,
           (SELECT COALESCE(SUM(distance) FILTER (WHERE is_complete), 0)
              FROM sow_fibre WHERE project_id = $1) AS completed_fibre_length,
           (SELECT COUNT(DISTINCT p.pole_number)
              FROM sow_poles p
              JOIN sow_drops d ON d.project_id = p.project_id AND d.pole_number = p.pole_number
             WHERE p.project_id = $1) AS poles_with_drops,
           NOW() AS updated_at
"#;

pub struct SowRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> SowRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_project(&self, project_id: Uuid) -> Result<(), DbError> {
        super::ProjectRepo::new(self.pool).ensure_exists(project_id).await
    }

    /// Create the summary row if it does not exist yet.
    pub async fn initialize(&self, project_id: Uuid) -> Result<SowSummary, DbError> {
        self.ensure_project(project_id).await?;
        sqlx::query(
            "INSERT INTO sow_project_summary (project_id) VALUES ($1) ON CONFLICT (project_id) DO NOTHING",
        )
        .bind(project_id)
        .execute(self.pool)
        .await?;
        self.summary(project_id).await
    }

    /// Upsert `items` in chunks, then refresh the summary and record the
    /// import status for this step.
    pub async fn upsert<T: SowRecord>(
        &self,
        project_id: Uuid,
        items: Vec<Incoming<T>>,
        batch_size: usize,
    ) -> Result<UploadResult, DbError> {
        self.ensure_project(project_id).await?;

        let Partitioned {
            items,
            superseded,
            errors,
        } = partition_valid(items);
        let mut outcome = UpsertOutcome {
            errors,
            ..Default::default()
        };
        let rejected = outcome.errors.len();

        for chunk in items.chunks(chunk_rows::<T>(batch_size)) {
            match self.upsert_chunk(project_id, chunk).await {
                Ok(chunk_outcome) => outcome.merge(chunk_outcome),
                Err(e) if chunk.len() == 1 => outcome.errors.push(item_error(&chunk[0], &e)),
                Err(e) => {
                    tracing::warn!(
                        %project_id,
                        step = T::STEP.as_str(),
                        rows = chunk.len(),
                        error = %e,
                        "SOW chunk failed, retrying row by row"
                    );
                    self.upsert_rows(project_id, chunk, &mut outcome).await;
                }
            }
        }

        // Replaced duplicates count as updates when their key was stored.
        let failed: HashSet<&str> = outcome.errors[rejected..]
            .iter()
            .map(|e| e.item.as_str())
            .collect();
        let replaced: u64 = superseded
            .iter()
            .filter(|(key, _)| !failed.contains(key.as_str()))
            .map(|(_, n)| n)
            .sum();
        outcome.updated += replaced;

        let summary = self.refresh_summary(project_id).await?;
        self.record_import_status(project_id, T::STEP, &outcome).await?;
        tracing::info!(
            %project_id,
            step = T::STEP.as_str(),
            inserted = outcome.inserted,
            updated = outcome.updated,
            errors = outcome.errors.len(),
            "SOW upload processed"
        );

        Ok(UploadResult {
            inserted: outcome.inserted,
            updated: outcome.updated,
            errors: outcome.errors,
            summary,
        })
    }

    async fn upsert_rows<T: SowRecord>(
        &self,
        project_id: Uuid,
        rows: &[T],
        outcome: &mut UpsertOutcome,
    ) {
        for row in rows {
            match self.upsert_chunk(project_id, std::slice::from_ref(row)).await {
                Ok(row_outcome) => outcome.merge(row_outcome),
                Err(e) => outcome.errors.push(item_error(row, &e)),
            }
        }
    }

    async fn upsert_chunk<T: SowRecord>(
        &self,
        project_id: Uuid,
        chunk: &[T],
    ) -> Result<UpsertOutcome, DbError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} (project_id, {}) ",
            T::TABLE,
            T::COLUMNS.join(", ")
        ));
        qb.push_values(chunk, |mut row, item| {
            row.push_bind(project_id);
            item.push_row(&mut row);
        });
        qb.push(format!(
            " ON CONFLICT (project_id, {}) DO UPDATE SET {} RETURNING (xmax = 0) AS inserted",
            T::KEY_FIELD,
            update_set::<T>()
        ));

        let flags: Vec<(bool,)> = qb.build_query_as().fetch_all(self.pool).await?;
        let inserted = flags.iter().filter(|(fresh,)| *fresh).count() as u64;
        Ok(UpsertOutcome {
            inserted,
            updated: flags.len() as u64 - inserted,
            errors: Vec::new(),
        })
    }

    async fn refresh_summary(&self, project_id: Uuid) -> Result<SowSummary, DbError> {
        let summary = sqlx::query_as::<_, SowSummary>(&format!(
            r#"
            INSERT INTO sow_project_summary (
                project_id, total_poles, total_drops, total_fibre_segments,
                total_fibre_length, completed_fibre_length, poles_with_drops, updated_at
            )
            {}
            ON CONFLICT (project_id) DO UPDATE SET
                total_poles = EXCLUDED.total_poles,
                total_drops = EXCLUDED.total_drops,
                total_fibre_segments = EXCLUDED.total_fibre_segments,
                total_fibre_length = EXCLUDED.total_fibre_length,
                completed_fibre_length = EXCLUDED.completed_fibre_length,
                poles_with_drops = EXCLUDED.poles_with_drops,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
            SUMMARY_SELECT
        ))
        .bind(project_id)
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    async fn record_import_status(
        &self,
        project_id: Uuid,
        step: ImportStep,
        outcome: &UpsertOutcome,
    ) -> Result<(), DbError> {
        let errors = serde_json::to_value(&outcome.errors).unwrap_or(Value::Null);
        sqlx::query(
            r#"
            INSERT INTO sow_import_status (
                project_id, import_type, status, records_imported, error_count, errors
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (project_id, import_type) DO UPDATE SET
                status = EXCLUDED.status,
                records_imported = EXCLUDED.records_imported,
                error_count = EXCLUDED.error_count,
                errors = EXCLUDED.errors,
                imported_at = NOW()
            "#,
        )
        .bind(project_id)
        .bind(step.as_str())
        .bind(step_status(outcome))
        .bind(outcome.processed() as i64)
        .bind(outcome.errors.len() as i64)
        .bind(errors)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Stored summary, or one computed on the fly when none is stored.
    pub async fn summary(&self, project_id: Uuid) -> Result<SowSummary, DbError> {
        let stored = sqlx::query_as::<_, SowSummary>(
            "SELECT * FROM sow_project_summary WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(self.pool)
        .await?;

        match stored {
            Some(summary) => Ok(summary),
            None => Ok(sqlx::query_as::<_, SowSummary>(SUMMARY_SELECT)
                .bind(project_id)
                .fetch_one(self.pool)
                .await?),
        }
    }

    pub async fn project(&self, project_id: Uuid) -> Result<ProjectSow, DbError> {
        self.ensure_project(project_id).await?;
        let (poles, drops, fibre, summary, pole_drops) = tokio::try_join!(
            self.poles(project_id),
            self.drops(project_id),
            self.segments(project_id, None, None),
            self.summary(project_id),
            self.pole_drops(project_id),
        )?;
        Ok(ProjectSow {
            project_id,
            poles,
            drops,
            fibre,
            summary,
            pole_drops,
        })
    }

    async fn poles(&self, project_id: Uuid) -> Result<Vec<SowPole>, DbError> {
        let rows = sqlx::query_as::<_, SowPole>(
            "SELECT * FROM sow_poles WHERE project_id = $1 ORDER BY pole_number",
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn drops(&self, project_id: Uuid) -> Result<Vec<SowDrop>, DbError> {
        let rows = sqlx::query_as::<_, SowDrop>(
            "SELECT * FROM sow_drops WHERE project_id = $1 ORDER BY drop_number",
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn segments(
        &self,
        project_id: Uuid,
        contractor: Option<&str>,
        status: Option<&str>,
    ) -> Result<Vec<SowFibre>, DbError> {
        let rows = sqlx::query_as::<_, SowFibre>(
            r#"
            SELECT * FROM sow_fibre
            WHERE project_id = $1
              AND ($2::text IS NULL OR contractor = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY segment_id
            "#,
        )
        .bind(project_id)
        .bind(contractor)
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn pole_drops(&self, project_id: Uuid) -> Result<Vec<PoleDrops>, DbError> {
        let rows = sqlx::query_as::<_, PoleDrops>(
            r#"
            SELECT p.pole_number,
                   COUNT(d.id) AS drop_count,
                   COALESCE(
                       ARRAY_AGG(d.drop_number ORDER BY d.drop_number)
                           FILTER (WHERE d.id IS NOT NULL),
                       '{}'
                   ) AS drop_numbers
            FROM sow_poles p
            LEFT JOIN sow_drops d ON d.project_id = p.project_id AND d.pole_number = p.pole_number
            WHERE p.project_id = $1
            GROUP BY p.pole_number
            ORDER BY p.pole_number
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn fibre(
        &self,
        project_id: Uuid,
        contractor: Option<&str>,
        status: Option<&str>,
    ) -> Result<FibreReport, DbError> {
        self.ensure_project(project_id).await?;
        let segments = self.segments(project_id, contractor, status).await?;
        let stats = FibreStats::from_segments(segments.iter().map(|s| (s.distance, s.is_complete)));
        Ok(FibreReport {
            completion_percentage: stats.completion_percentage(),
            segments,
            stats,
        })
    }

    /// Import status per step in workflow order.
    pub async fn import_status(&self, project_id: Uuid) -> Result<Vec<ImportStatus>, DbError> {
        self.ensure_project(project_id).await?;
        let mut rows = sqlx::query_as::<_, ImportStatus>(
            r#"
            SELECT import_type, status, records_imported, error_count, errors, imported_at
            FROM sow_import_status
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        rows.sort_by_key(|r| ImportStep::parse(&r.import_type).map_or(i32::MAX, |s| s.order()));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{database_pool, insert_project};

    #[test]
    fn update_set_skips_the_key() {
        let set = update_set::<FibreInput>();
        assert!(set.starts_with("cable_size = EXCLUDED.cable_size"));
        assert!(!set.contains("segment_id ="));
        assert!(set.ends_with("updated_at = NOW()"));
    }

    #[test]
    fn key_column_leads_every_table() {
        assert_eq!(PoleInput::COLUMNS[0], PoleInput::KEY_FIELD);
        assert_eq!(DropInput::COLUMNS[0], DropInput::KEY_FIELD);
        assert_eq!(FibreInput::COLUMNS[0], FibreInput::KEY_FIELD);
    }

    #[test]
    fn chunk_statement_binds_one_row_per_item() {
        let poles = vec![
            PoleInput {
                pole_number: Some("LAW.P.A001".into()),
                ..Default::default()
            },
            PoleInput {
                pole_number: Some("LAW.P.A002".into()),
                ..Default::default()
            },
        ];
        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO sow_poles (project_id, ...) ");
        qb.push_values(&poles, |mut row, item| {
            row.push_bind(Uuid::nil());
            item.push_row(&mut row);
        });
        let per_row = PoleInput::COLUMNS.len() + 1;
        assert!(qb.sql().contains(&format!("${}", per_row * 2)));
        assert!(!qb.sql().contains(&format!("${}", per_row * 2 + 1)));
    }

    #[test]
    fn chunks_stay_within_bind_limit() {
        assert_eq!(chunk_rows::<PoleInput>(500), 500);
        assert_eq!(chunk_rows::<PoleInput>(0), 1);
        let capped = chunk_rows::<PoleInput>(5000);
        assert!(capped < 5000);
        assert!(capped * (PoleInput::COLUMNS.len() + 1) <= MAX_BIND_PARAMS);
        let widest = chunk_rows::<FibreInput>(usize::MAX);
        assert!(widest * (FibreInput::COLUMNS.len() + 1) <= MAX_BIND_PARAMS);
    }

    #[test]
    fn step_status_from_outcome() {
        let mut outcome = UpsertOutcome {
            inserted: 3,
            ..Default::default()
        };
        assert_eq!(step_status(&outcome), "completed");
        outcome.errors.push(ItemError {
            item: "#4".into(),
            error: "pole_number is required".into(),
        });
        assert_eq!(step_status(&outcome), "completed_with_errors");
        outcome.inserted = 0;
        assert_eq!(step_status(&outcome), "failed");
    }

    fn poles(range: std::ops::Range<usize>, prefix: &str) -> Vec<Incoming<PoleInput>> {
        range
            .map(|i| {
                Ok(PoleInput {
                    pole_number: Some(format!("{prefix}{i:05}")),
                    ..Default::default()
                })
            })
            .collect()
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn oversized_batch_is_split_to_fit() {
        let pool = database_pool().await;
        let project_id = insert_project(&pool).await;
        let repo = SowRepo::new(&pool);

        let result = repo
            .upsert(project_id, poles(0..4000, "BIG-"), 5000)
            .await
            .unwrap();
        assert_eq!(result.inserted, 4000);
        assert!(result.errors.is_empty());
        assert_eq!(result.summary.total_poles, 4000);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn upload_spans_several_chunks() {
        let pool = database_pool().await;
        let project_id = insert_project(&pool).await;
        let repo = SowRepo::new(&pool);

        let first = repo.upsert(project_id, poles(0..5, "CH-"), 2).await.unwrap();
        assert_eq!((first.inserted, first.updated), (5, 0));

        let second = repo.upsert(project_id, poles(3..8, "CH-"), 2).await.unwrap();
        assert_eq!((second.inserted, second.updated), (3, 2));
        assert_eq!(second.summary.total_poles, 8);

        let status = repo.import_status(project_id).await.unwrap();
        assert_eq!(status[0].status, "completed");
        assert_eq!(status[0].records_imported, 5);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn failing_row_does_not_sink_its_chunk() {
        let pool = database_pool().await;
        let project_id = insert_project(&pool).await;

        let mut items = poles(0..3, "RT-");
        // Postgres rejects NUL bytes in text
        items[1] = Ok(PoleInput {
            pole_number: Some("RT-00001".into()),
            comments: Some("bad\0byte".into()),
            ..Default::default()
        });
        let result = SowRepo::new(&pool)
            .upsert(project_id, items, 10)
            .await
            .unwrap();
        assert_eq!(result.inserted, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].item, "RT-00001");
    }
}
