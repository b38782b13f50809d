//! Project-scoped stock positions and movements
//!
//! Movement creation and bulk transactions run in one transaction each; the
//! level arithmetic comes from `fibreflow_core::stock`.

use chrono::{DateTime, Utc};
use fibreflow_core::stock::{line_cost, MovementType, StockError, StockLevels, StockStatus};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{paginate, DbError};
use crate::models::{Paginated, Pagination};

const DUPLICATE_ITEM: &str = "An item with this item code already exists for the project";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockPosition {
    pub id: Uuid,
    pub project_id: Uuid,
    pub item_code: String,
    pub item_name: String,
    pub item_description: Option<String>,
    pub category: Option<String>,
    pub unit_of_measure: String,
    pub available_quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub total_quantity: Decimal,
    pub reorder_point: Option<Decimal>,
    pub reorder_quantity: Option<Decimal>,
    pub maximum_stock_level: Option<Decimal>,
    pub unit_cost: Decimal,
    pub total_value: Decimal,
    pub warehouse_location: Option<String>,
    pub bin_location: Option<String>,
    pub stock_status: String,
    pub supplier_id: Option<Uuid>,
    pub last_movement_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Movement header with its items aggregated as JSON
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub project_id: Uuid,
    pub movement_type: String,
    pub reference_number: Option<String>,
    pub reference_type: Option<String>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(default)]
    pub items: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct NewStockPosition {
    pub item_code: String,
    pub item_name: String,
    pub item_description: Option<String>,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
    pub available_quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub reorder_point: Option<Decimal>,
    pub reorder_quantity: Option<Decimal>,
    pub maximum_stock_level: Option<Decimal>,
    pub unit_cost: Decimal,
    pub warehouse_location: Option<String>,
    pub bin_location: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StockChanges {
    pub item_name: Option<String>,
    pub item_description: Option<String>,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
    pub available_quantity: Option<Decimal>,
    pub reserved_quantity: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub reorder_quantity: Option<Decimal>,
    pub maximum_stock_level: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub warehouse_location: Option<String>,
    pub bin_location: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StockFilter {
    pub category: Option<String>,
    pub stock_status: Option<String>,
    pub warehouse_location: Option<String>,
    pub bin_location: Option<String>,
    pub item_code: Option<String>,
    pub low_stock: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub movement_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMovementItem {
    pub item_code: String,
    pub item_name: Option<String>,
    pub planned_quantity: Decimal,
    pub actual_quantity: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub lot_number: Option<String>,
    pub serial_numbers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub reference_number: Option<String>,
    pub reference_type: Option<String>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub items: Vec<NewMovementItem>,
}

#[derive(Debug, Clone)]
pub struct BulkItem {
    pub item_code: String,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub movement_id: Uuid,
    pub movement_type: MovementType,
    pub items_processed: usize,
    pub total_cost: Decimal,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct StockTotals {
    pub total_items: i64,
    pub total_value: Decimal,
    pub low_stock_items: i64,
    pub critical_items: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CategoryValue {
    pub category: String,
    pub item_count: i64,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockLevel {
    pub item_code: String,
    pub item_name: String,
    pub available_quantity: Decimal,
    pub maximum_stock_level: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    /// Available as a share of the maximum level, when one is set
    pub level_percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockDashboard {
    #[serde(flatten)]
    pub totals: StockTotals,
    pub recent_movements: Vec<StockMovement>,
    pub top_categories: Vec<CategoryValue>,
    pub stock_levels: Vec<StockLevel>,
}

#[derive(Debug, FromRow)]
struct LockedLevels {
    id: Uuid,
    item_name: String,
    available_quantity: Decimal,
    reserved_quantity: Decimal,
    total_quantity: Decimal,
    unit_cost: Decimal,
    reorder_point: Option<Decimal>,
    maximum_stock_level: Option<Decimal>,
}

impl LockedLevels {
    fn levels(&self) -> StockLevels {
        StockLevels {
            available: self.available_quantity,
            reserved: self.reserved_quantity,
            total: self.total_quantity,
        }
    }
}

const MOVEMENT_WITH_ITEMS: &str = r#"
    SELECT m.*,
           COALESCE(
               json_agg(i.* ORDER BY i.created_at) FILTER (WHERE i.id IS NOT NULL),
               '[]'::json
           ) AS items
    FROM stock_movements m
    LEFT JOIN stock_movement_items i ON i.movement_id = m.id
"#;

/// Stock repository
pub struct StockRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        project_id: Uuid,
        filter: &StockFilter,
        page: Pagination,
    ) -> Result<Paginated<StockPosition>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT *, COUNT(*) OVER() AS total
            FROM stock_positions
            WHERE project_id = $1
              AND ($2::text IS NULL OR category = $2)
              AND ($3::text IS NULL OR stock_status = $3)
              AND ($4::text IS NULL OR warehouse_location = $4)
              AND ($5::text IS NULL OR bin_location = $5)
              AND ($6::text IS NULL OR item_code ILIKE $6)
              AND (NOT $7 OR available_quantity <= reorder_point)
            ORDER BY item_code
            LIMIT $8 OFFSET $9
            "#,
        )
        .bind(project_id)
        .bind(filter.category.as_deref())
        .bind(filter.stock_status.as_deref())
        .bind(filter.warehouse_location.as_deref())
        .bind(filter.bin_location.as_deref())
        .bind(filter.item_code.as_deref())
        .bind(filter.low_stock)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    pub async fn create(
        &self,
        project_id: Uuid,
        s: &NewStockPosition,
    ) -> Result<StockPosition, DbError> {
        let status = StockStatus::classify(
            s.available_quantity,
            s.reorder_point,
            s.maximum_stock_level,
        );
        let total = s.available_quantity + s.reserved_quantity;

        sqlx::query_as::<_, StockPosition>(
            r#"
            INSERT INTO stock_positions (
                project_id, item_code, item_name, item_description, category,
                unit_of_measure, available_quantity, reserved_quantity, total_quantity,
                reorder_point, reorder_quantity, maximum_stock_level, unit_cost, total_value,
                warehouse_location, bin_location, stock_status, supplier_id, notes
            )
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'each'), $7, $8, $9, $10, $11, $12, $13,
                    $7 * $13, $14, $15, $16, $17, $18)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(&s.item_code)
        .bind(&s.item_name)
        .bind(&s.item_description)
        .bind(&s.category)
        .bind(&s.unit_of_measure)
        .bind(s.available_quantity)
        .bind(s.reserved_quantity)
        .bind(total)
        .bind(s.reorder_point)
        .bind(s.reorder_quantity)
        .bind(s.maximum_stock_level)
        .bind(s.unit_cost)
        .bind(&s.warehouse_location)
        .bind(&s.bin_location)
        .bind(status.as_str())
        .bind(s.supplier_id)
        .bind(&s.notes)
        .fetch_one(self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::Conflict(msg) if msg.contains("item_code") => {
                DbError::Conflict(DUPLICATE_ITEM.into())
            }
            DbError::Conflict(msg) if msg.contains("supplier") => {
                DbError::InvalidInput("supplier_id does not exist".into())
            }
            DbError::Conflict(_) => DbError::not_found("project", project_id),
            other => other,
        })
    }

    pub async fn get(&self, project_id: Uuid, id: Uuid) -> Result<StockPosition, DbError> {
        sqlx::query_as::<_, StockPosition>(
            "SELECT * FROM stock_positions WHERE id = $1 AND project_id = $2",
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("stock item", id))
    }

    /// Partial update; totals, value and status are re-derived from the
    /// resulting quantities.
    pub async fn update(
        &self,
        project_id: Uuid,
        id: Uuid,
        c: &StockChanges,
    ) -> Result<StockPosition, DbError> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, StockPosition>(
            "SELECT * FROM stock_positions WHERE id = $1 AND project_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("stock item", id))?;

        let available = c.available_quantity.unwrap_or(current.available_quantity);
        let reserved = c.reserved_quantity.unwrap_or(current.reserved_quantity);
        let unit_cost = c.unit_cost.unwrap_or(current.unit_cost);
        let status = StockStatus::classify(
            available,
            c.reorder_point.or(current.reorder_point),
            c.maximum_stock_level.or(current.maximum_stock_level),
        );

        let updated = sqlx::query_as::<_, StockPosition>(
            r#"
            UPDATE stock_positions SET
                item_name = COALESCE($2, item_name),
                item_description = COALESCE($3, item_description),
                category = COALESCE($4, category),
                unit_of_measure = COALESCE($5, unit_of_measure),
                available_quantity = $6,
                reserved_quantity = $7,
                total_quantity = $6 + $7,
                reorder_point = COALESCE($8, reorder_point),
                reorder_quantity = COALESCE($9, reorder_quantity),
                maximum_stock_level = COALESCE($10, maximum_stock_level),
                unit_cost = $11,
                total_value = $6 * $11,
                warehouse_location = COALESCE($12, warehouse_location),
                bin_location = COALESCE($13, bin_location),
                supplier_id = COALESCE($14, supplier_id),
                notes = COALESCE($15, notes),
                stock_status = $16,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&c.item_name)
        .bind(&c.item_description)
        .bind(&c.category)
        .bind(&c.unit_of_measure)
        .bind(available)
        .bind(reserved)
        .bind(c.reorder_point)
        .bind(c.reorder_quantity)
        .bind(c.maximum_stock_level)
        .bind(unit_cost)
        .bind(&c.warehouse_location)
        .bind(&c.bin_location)
        .bind(c.supplier_id)
        .bind(&c.notes)
        .bind(status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete(&self, project_id: Uuid, id: Uuid) -> Result<(), DbError> {
        sqlx::query("DELETE FROM stock_positions WHERE id = $1 AND project_id = $2 RETURNING id")
            .bind(id)
            .bind(project_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("stock item", id))?;
        Ok(())
    }

    pub async fn movements(
        &self,
        project_id: Uuid,
        filter: &MovementFilter,
        page: Pagination,
    ) -> Result<Paginated<StockMovement>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT m.*,
                   COALESCE(
                       json_agg(i.* ORDER BY i.created_at) FILTER (WHERE i.id IS NOT NULL),
                       '[]'::json
                   ) AS items,
                   COUNT(*) OVER() AS total
            FROM stock_movements m
            LEFT JOIN stock_movement_items i ON i.movement_id = m.id
            WHERE m.project_id = $1
              AND ($2::text IS NULL OR m.movement_type = $2)
              AND ($3::text IS NULL OR m.status = $3)
            GROUP BY m.id
            ORDER BY m.created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(project_id)
        .bind(filter.movement_type.as_deref())
        .bind(filter.status.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool)
        .await?;

        paginate(rows, page)
    }

    async fn movement(&self, id: Uuid) -> Result<StockMovement, DbError> {
        sqlx::query_as::<_, StockMovement>(&format!(
            "{} WHERE m.id = $1 GROUP BY m.id",
            MOVEMENT_WITH_ITEMS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("stock movement", id))
    }

    /// Record a movement and its items. Stock levels are not touched; use
    /// [`Self::bulk_transaction`] for that.
    pub async fn create_movement(
        &self,
        project_id: Uuid,
        m: &NewMovement,
    ) -> Result<StockMovement, DbError> {
        let mut tx = self.pool.begin().await?;
        let movement_id = insert_movement(&mut tx, project_id, m).await?;

        for item in &m.items {
            let stocked = sqlx::query_as::<_, (String, Decimal)>(
                "SELECT item_name, unit_cost FROM stock_positions WHERE project_id = $1 AND item_code = $2",
            )
            .bind(project_id)
            .bind(&item.item_code)
            .fetch_optional(&mut *tx)
            .await?;

            let name = item
                .item_name
                .clone()
                .or_else(|| stocked.as_ref().map(|(n, _)| n.clone()))
                .ok_or_else(|| DbError::InvalidInput(StockError::UnknownItem(item.item_code.clone()).to_string()))?;
            let quantity = item.actual_quantity.unwrap_or(item.planned_quantity);
            let (unit, total) = line_cost(quantity, item.unit_cost, stocked.map(|(_, c)| c));

            sqlx::query(
                r#"
                INSERT INTO stock_movement_items (
                    movement_id, item_code, item_name, planned_quantity, actual_quantity,
                    unit_cost, total_cost, lot_number, serial_numbers
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(movement_id)
            .bind(&item.item_code)
            .bind(name)
            .bind(item.planned_quantity)
            .bind(item.actual_quantity)
            .bind(unit)
            .bind(total)
            .bind(&item.lot_number)
            .bind(&item.serial_numbers)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.movement(movement_id).await
    }

    /// Apply a batch of item quantities to stock levels and record them as one
    /// completed movement. Any failing item rolls the whole batch back.
    pub async fn bulk_transaction(
        &self,
        project_id: Uuid,
        movement_type: MovementType,
        reference_number: Option<&str>,
        items: &[BulkItem],
    ) -> Result<BulkOutcome, DbError> {
        let mut tx = self.pool.begin().await?;
        let header = NewMovement {
            movement_type,
            reference_number: reference_number.map(str::to_owned),
            reference_type: Some("bulk".into()),
            from_location: None,
            to_location: None,
            status: "completed".into(),
            reason: None,
            notes: None,
            created_by: None,
            items: Vec::new(),
        };
        let movement_id = insert_movement(&mut tx, project_id, &header).await?;
        let mut total_cost = Decimal::ZERO;

        for item in items {
            let locked = sqlx::query_as::<_, LockedLevels>(
                r#"
                SELECT id, item_name, available_quantity, reserved_quantity, total_quantity,
                       unit_cost, reorder_point, maximum_stock_level
                FROM stock_positions
                WHERE project_id = $1 AND item_code = $2
                FOR UPDATE
                "#,
            )
            .bind(project_id)
            .bind(&item.item_code)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                DbError::InvalidInput(StockError::UnknownItem(item.item_code.clone()).to_string())
            })?;

            let next = locked
                .levels()
                .apply(&item.item_code, movement_type, item.quantity)
                .map_err(|e| DbError::InvalidInput(e.to_string()))?;
            let (unit, line_total) = line_cost(item.quantity, item.unit_cost, Some(locked.unit_cost));
            total_cost += line_total;

            write_levels(&mut tx, &locked, next).await?;

            sqlx::query(
                r#"
                INSERT INTO stock_movement_items (
                    movement_id, item_code, item_name, planned_quantity, actual_quantity,
                    unit_cost, total_cost, status
                )
                VALUES ($1, $2, $3, $4, $4, $5, $6, 'completed')
                "#,
            )
            .bind(movement_id)
            .bind(&item.item_code)
            .bind(&locked.item_name)
            .bind(item.quantity)
            .bind(unit)
            .bind(line_total)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(
            %project_id,
            %movement_id,
            movement_type = movement_type.as_str(),
            items = items.len(),
            "bulk stock transaction applied"
        );

        Ok(BulkOutcome {
            movement_id,
            movement_type,
            items_processed: items.len(),
            total_cost,
        })
    }

    pub async fn dashboard(&self, project_id: Uuid) -> Result<StockDashboard, DbError> {
        let (totals, recent_movements, top_categories, stock_levels) = tokio::try_join!(
            self.totals(project_id),
            self.recent_movements(project_id),
            self.top_categories(project_id),
            self.stock_levels(project_id),
        )?;
        Ok(StockDashboard {
            totals,
            recent_movements,
            top_categories,
            stock_levels,
        })
    }

    async fn totals(&self, project_id: Uuid) -> Result<StockTotals, DbError> {
        let totals = sqlx::query_as::<_, StockTotals>(
            r#"
            SELECT COUNT(*) AS total_items,
                   COALESCE(SUM(total_value), 0) AS total_value,
                   COUNT(*) FILTER (WHERE available_quantity <= reorder_point) AS low_stock_items,
                   COUNT(*) FILTER (WHERE available_quantity = 0) AS critical_items
            FROM stock_positions
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_one(self.pool)
        .await?;
        Ok(totals)
    }

    async fn recent_movements(&self, project_id: Uuid) -> Result<Vec<StockMovement>, DbError> {
        let rows = sqlx::query_as::<_, StockMovement>(&format!(
            "{} WHERE m.project_id = $1 GROUP BY m.id ORDER BY m.created_at DESC LIMIT 10",
            MOVEMENT_WITH_ITEMS
        ))
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn top_categories(&self, project_id: Uuid) -> Result<Vec<CategoryValue>, DbError> {
        let rows = sqlx::query_as::<_, CategoryValue>(
            r#"
            SELECT COALESCE(category, 'uncategorized') AS category,
                   COUNT(*) AS item_count,
                   COALESCE(SUM(total_value), 0) AS total_value
            FROM stock_positions
            WHERE project_id = $1
            GROUP BY COALESCE(category, 'uncategorized')
            ORDER BY total_value DESC
            LIMIT 5
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn stock_levels(&self, project_id: Uuid) -> Result<Vec<StockLevel>, DbError> {
        let rows = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT item_code, item_name, available_quantity, maximum_stock_level, reorder_point,
                   CASE WHEN maximum_stock_level > 0
                        THEN ROUND(available_quantity / maximum_stock_level * 100, 2)::float8
                   END AS level_percentage
            FROM stock_positions
            WHERE project_id = $1
            ORDER BY item_code
            "#,
        )
        .bind(project_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

async fn insert_movement(
    conn: &mut PgConnection,
    project_id: Uuid,
    m: &NewMovement,
) -> Result<Uuid, DbError> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO stock_movements (
            project_id, movement_type, reference_number, reference_type, from_location,
            to_location, status, reason, notes, created_by
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id
        "#,
    )
    .bind(project_id)
    .bind(m.movement_type.as_str())
    .bind(&m.reference_number)
    .bind(&m.reference_type)
    .bind(&m.from_location)
    .bind(&m.to_location)
    .bind(&m.status)
    .bind(&m.reason)
    .bind(&m.notes)
    .bind(&m.created_by)
    .fetch_one(conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::Conflict(_) => DbError::not_found("project", project_id),
        other => other,
    })?;
    Ok(row.0)
}

async fn write_levels(
    conn: &mut PgConnection,
    locked: &LockedLevels,
    next: StockLevels,
) -> Result<(), DbError> {
    let status = StockStatus::classify(next.available, locked.reorder_point, locked.maximum_stock_level);
    sqlx::query(
        r#"
        UPDATE stock_positions SET
            available_quantity = $2,
            reserved_quantity = $3,
            total_quantity = $4,
            total_value = $2 * unit_cost,
            stock_status = $5,
            last_movement_date = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(locked.id)
    .bind(next.available)
    .bind(next.reserved)
    .bind(next.total)
    .bind(status.as_str())
    .execute(conn)
    .await?;
    Ok(())
}
