//! OneMap export staging
//!
//! An import runs as one batch: the batch row is created first, every
//! record is applied inside a single transaction, then the batch is marked
//! `completed` (or `failed` with the error) and the report is stored.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fibreflow_core::onemap::{
    self, plan_record, FirstInstanceTracker, ImportReport, OneMapRecord, StoredRecord,
};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};

use super::DbError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImportBatch {
    pub id: String,
    pub file_name: String,
    pub status: String,
    pub total_rows: i64,
    pub new_records: i64,
    pub updated_records: i64,
    pub duplicate_count: i64,
    pub verification_passed: Option<bool>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct OneMapRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> OneMapRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Stage `records` as a new batch and return its verification report.
    pub async fn import(
        &self,
        file_name: &str,
        records: &[OneMapRecord],
    ) -> Result<ImportReport, DbError> {
        let batch_id = onemap::batch_id(Utc::now());
        sqlx::query("INSERT INTO onemap_import_batches (id, file_name, total_rows) VALUES ($1, $2, $3)")
            .bind(&batch_id)
            .bind(file_name)
            .bind(records.len() as i64)
            .execute(self.pool)
            .await?;
        tracing::info!(%batch_id, file_name, rows = records.len(), "OneMap import started");

        let mut report = ImportReport::verify(&batch_id, file_name, records);
        if let Err(e) = self.apply(&batch_id, records, &mut report).await {
            tracing::error!(%batch_id, error = %e, "OneMap import failed");
            self.fail(&batch_id, &e.to_string()).await;
            return Err(e);
        }

        self.complete(&report).await?;
        tracing::info!(
            %batch_id,
            new = report.summary.new_records,
            updated = report.summary.updated_records,
            passed = report.summary.verification_passed,
            "OneMap import completed"
        );
        Ok(report)
    }

    async fn apply(
        &self,
        batch_id: &str,
        records: &[OneMapRecord],
        report: &mut ImportReport,
    ) -> Result<(), DbError> {
        let property_ids: Vec<String> = records
            .iter()
            .filter_map(|r| r.property_id().map(str::to_owned))
            .collect();
        let poles: Vec<String> = records
            .iter()
            .filter_map(|r| r.pole_number().map(str::to_owned))
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut stored = stored_records(&mut tx, &property_ids).await?;
        let known = known_first_instances(&mut tx, &poles).await?;
        let mut tracker = FirstInstanceTracker::with_known(known);

        let mut skipped = 0usize;
        for record in records {
            let Some(property_id) = record.property_id() else {
                skipped += 1;
                continue;
            };
            let plan = plan_record(record, stored.get(property_id), &mut tracker);

            let coords = record.coordinates();
            sqlx::query(
                r#"
                INSERT INTO onemap_imports (
                    property_id, pole_number, drop_number, status, normalized_status,
                    tracking_type, tracking_value, latitude, longitude, address,
                    last_modified, raw_data, version, import_batch_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (property_id) DO UPDATE SET
                    pole_number = EXCLUDED.pole_number,
                    drop_number = EXCLUDED.drop_number,
                    status = EXCLUDED.status,
                    normalized_status = EXCLUDED.normalized_status,
                    tracking_type = EXCLUDED.tracking_type,
                    tracking_value = EXCLUDED.tracking_value,
                    latitude = EXCLUDED.latitude,
                    longitude = EXCLUDED.longitude,
                    address = EXCLUDED.address,
                    last_modified = EXCLUDED.last_modified,
                    raw_data = EXCLUDED.raw_data,
                    version = EXCLUDED.version,
                    import_batch_id = EXCLUDED.import_batch_id,
                    updated_at = NOW()
                "#,
            )
            .bind(&plan.property_id)
            .bind(record.pole_number())
            .bind(record.drop_number())
            .bind(record.status())
            .bind(&plan.normalized_status)
            .bind(plan.tracking.kind.as_str())
            .bind(&plan.tracking.value)
            .bind(coords.map(|(lat, _)| lat))
            .bind(coords.map(|(_, lng)| lng))
            .bind(record.address())
            .bind(record.last_modified())
            .bind(Json(&record.fields))
            .bind(plan.version)
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

            if let Some(milestone) = plan.first_instance {
                sqlx::query(
                    r#"
                    INSERT INTO onemap_first_instances (
                        pole_number, normalized_status, milestone, property_id, import_batch_id
                    )
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (pole_number, normalized_status) DO NOTHING
                    "#,
                )
                .bind(&plan.tracking.value)
                .bind(&plan.normalized_status)
                .bind(milestone.map(|m| m.as_str()))
                .bind(&plan.property_id)
                .bind(batch_id)
                .execute(&mut *tx)
                .await?;
            }

            let (old_status, new_status) = match &plan.status_change {
                Some(change) => (change.old_status.as_deref(), change.new_status.as_deref()),
                None => (None, record.status()),
            };
            sqlx::query(
                r#"
                INSERT INTO onemap_change_history (
                    property_id, import_batch_id, change_type, old_status, new_status, tracking_value
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&plan.property_id)
            .bind(batch_id)
            .bind(plan.change_type())
            .bind(old_status)
            .bind(new_status)
            .bind(&plan.tracking.value)
            .execute(&mut *tx)
            .await?;

            report.record(record, &plan);
            stored.insert(
                plan.property_id.clone(),
                StoredRecord {
                    version: plan.version,
                    status: record.status().map(str::to_owned),
                },
            );
        }

        tx.commit().await?;
        if skipped > 0 {
            tracing::warn!(batch_id, skipped, "records without a property id were skipped");
        }
        Ok(())
    }

    async fn complete(&self, report: &ImportReport) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE onemap_import_batches SET
                status = 'completed',
                new_records = $2,
                updated_records = $3,
                duplicate_count = $4,
                verification_passed = $5,
                completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&report.batch_id)
        .bind(report.summary.new_records as i64)
        .bind(report.summary.updated_records as i64)
        .bind(report.summary.duplicate_property_ids as i64)
        .bind(report.summary.verification_passed)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO onemap_import_reports (batch_id, report, report_text)
            VALUES ($1, $2, $3)
            ON CONFLICT (batch_id) DO UPDATE SET
                report = EXCLUDED.report,
                report_text = EXCLUDED.report_text
            "#,
        )
        .bind(&report.batch_id)
        .bind(Json(report))
        .bind(report.render_text())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Mark a batch failed; a failure to do so is only logged.
    async fn fail(&self, batch_id: &str, message: &str) {
        let result = sqlx::query(
            "UPDATE onemap_import_batches SET status = 'failed', error_message = $2, completed_at = NOW() WHERE id = $1",
        )
        .bind(batch_id)
        .bind(message)
        .execute(self.pool)
        .await;
        if let Err(e) = result {
            tracing::warn!(batch_id, error = %e, "could not mark batch failed");
        }
    }

    pub async fn batches(&self, limit: u32) -> Result<Vec<ImportBatch>, DbError> {
        let rows = sqlx::query_as::<_, ImportBatch>(
            "SELECT * FROM onemap_import_batches ORDER BY started_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn report(&self, batch_id: &str) -> Result<ImportReport, DbError> {
        let row: Option<(Json<ImportReport>,)> =
            sqlx::query_as("SELECT report FROM onemap_import_reports WHERE batch_id = $1")
                .bind(batch_id)
                .fetch_optional(self.pool)
                .await?;
        row.map(|(Json(report),)| report)
            .ok_or_else(|| DbError::not_found("import report", batch_id))
    }
}

async fn stored_records(
    conn: &mut PgConnection,
    property_ids: &[String],
) -> Result<HashMap<String, StoredRecord>, DbError> {
    let rows: Vec<(String, i32, Option<String>)> = sqlx::query_as(
        "SELECT property_id, version, status FROM onemap_imports WHERE property_id = ANY($1)",
    )
    .bind(property_ids)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, version, status)| (id, StoredRecord { version, status }))
        .collect())
}

async fn known_first_instances(
    conn: &mut PgConnection,
    poles: &[String],
) -> Result<Vec<(String, String)>, DbError> {
    let rows = sqlx::query_as(
        "SELECT pole_number, normalized_status FROM onemap_first_instances WHERE pole_number = ANY($1)",
    )
    .bind(poles)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http::test_support::database_pool;

    fn export(property_id: &str, pole: &str, status: &str) -> Vec<OneMapRecord> {
        vec![OneMapRecord::from_pairs([
            (onemap::COL_PROPERTY_ID, property_id),
            (onemap::COL_POLE_NUMBER, pole),
            (onemap::COL_STATUS, status),
            (onemap::COL_LATITUDE, "-26.25"),
            (onemap::COL_LONGITUDE, "28.30"),
        ])]
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn reimport_bumps_version_and_tracks_changes() {
        let pool = database_pool().await;
        let repo = OneMapRepo::new(&pool);
        let id = uuid::Uuid::new_v4().simple().to_string();
        let pole = format!("LAW.P.{}", &id[..8]);

        let first = repo
            .import("day1.csv", &export(&id, &pole, "Pole Permission: Approved"))
            .await
            .unwrap();
        assert_eq!(first.summary.new_records, 1);
        assert_eq!(first.summary.first_pole_permissions, 1);

        // batch ids have millisecond resolution
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = repo
            .import("day2.csv", &export(&id, &pole, "Pole Permission: Approved"))
            .await
            .unwrap();
        assert_eq!(second.summary.new_records, 0);
        assert_eq!(second.summary.updated_records, 1);
        assert!(second.changes.status_changes.is_empty());
        assert_eq!(second.summary.first_pole_permissions, 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let third = repo
            .import("day3.csv", &export(&id, &pole, "Pole Planted"))
            .await
            .unwrap();
        assert_eq!(third.summary.updated_records, 1);
        assert_eq!(third.changes.status_changes.len(), 1);
        assert_eq!(
            third.changes.status_changes[0].old_status.as_deref(),
            Some("Pole Permission: Approved")
        );
        assert_eq!(third.summary.first_pole_planted, 1);

        let (version,): (i32,) =
            sqlx::query_as("SELECT version FROM onemap_imports WHERE property_id = $1")
                .bind(&id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(version, 3);

        let stored = repo.report(&third.batch_id).await.unwrap();
        assert_eq!(stored, third);
    }
}
