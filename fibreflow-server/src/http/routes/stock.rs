//! Stock endpoints, scoped to a project

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use fibreflow_core::stock::{MovementType, StockStatus};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::stock::{
    BulkItem, BulkOutcome, MovementFilter, NewMovement, NewMovementItem, NewStockPosition,
    StockChanges, StockDashboard, StockFilter, StockMovement, StockPosition,
};
use crate::db::repos::StockRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid, ValidUuidPair};
use crate::http::response::{ApiResponse, ApiResult, CreatedResult};
use crate::http::server::AppState;
use crate::models::fields::{
    like_pattern, non_blank, non_negative, one_of, optional_one_of, optional_text, required_text,
};
use crate::models::status::MOVEMENT_STATUSES;
use crate::models::{Code, Paginated, Pagination, ValidationError};

#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    pub category: Option<String>,
    pub stock_status: Option<String>,
    pub warehouse_location: Option<String>,
    pub bin_location: Option<String>,
    pub item_code: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StockRequest {
    pub item_code: Option<String>,
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

impl StockRequest {
    pub fn into_new(self) -> Result<NewStockPosition, ValidationError> {
        let item_code = self
            .item_code
            .as_deref()
            .ok_or(ValidationError::Missing { field: "item_code" })?;
        Ok(NewStockPosition {
            item_code: Code::new("item_code", item_code)?.into_string(),
            item_name: required_text("item_name", self.item_name.as_deref())?,
            item_description: self.item_description,
            category: optional_text("category", self.category.as_deref())?,
            unit_of_measure: optional_text("unit_of_measure", self.unit_of_measure.as_deref())?,
            available_quantity: non_negative("available_quantity", self.available_quantity)?
                .unwrap_or_default(),
            reserved_quantity: non_negative("reserved_quantity", self.reserved_quantity)?
                .unwrap_or_default(),
            reorder_point: non_negative("reorder_point", self.reorder_point)?,
            reorder_quantity: non_negative("reorder_quantity", self.reorder_quantity)?,
            maximum_stock_level: non_negative("maximum_stock_level", self.maximum_stock_level)?,
            unit_cost: non_negative("unit_cost", self.unit_cost)?.unwrap_or_default(),
            warehouse_location: optional_text("warehouse_location", self.warehouse_location.as_deref())?,
            bin_location: optional_text("bin_location", self.bin_location.as_deref())?,
            supplier_id: self.supplier_id,
            notes: self.notes,
        })
    }

    pub fn into_changes(self) -> Result<StockChanges, ValidationError> {
        Ok(StockChanges {
            item_name: self
                .item_name
                .as_deref()
                .map(|n| required_text("item_name", Some(n)))
                .transpose()?,
            item_description: self.item_description,
            category: optional_text("category", self.category.as_deref())?,
            unit_of_measure: optional_text("unit_of_measure", self.unit_of_measure.as_deref())?,
            available_quantity: non_negative("available_quantity", self.available_quantity)?,
            reserved_quantity: non_negative("reserved_quantity", self.reserved_quantity)?,
            reorder_point: non_negative("reorder_point", self.reorder_point)?,
            reorder_quantity: non_negative("reorder_quantity", self.reorder_quantity)?,
            maximum_stock_level: non_negative("maximum_stock_level", self.maximum_stock_level)?,
            unit_cost: non_negative("unit_cost", self.unit_cost)?,
            warehouse_location: optional_text("warehouse_location", self.warehouse_location.as_deref())?,
            bin_location: optional_text("bin_location", self.bin_location.as_deref())?,
            supplier_id: self.supplier_id,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub movement_type: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct MovementItemRequest {
    pub item_code: String,
    pub item_name: Option<String>,
    pub planned_quantity: Decimal,
    pub actual_quantity: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub lot_number: Option<String>,
    #[serde(default)]
    pub serial_numbers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub movement_type: String,
    pub reference_number: Option<String>,
    pub reference_type: Option<String>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub items: Vec<MovementItemRequest>,
}

fn movement_type(value: &str) -> Result<MovementType, ValidationError> {
    let name = one_of("movement_type", value, &MovementType::ALL)?;
    MovementType::parse(name).ok_or_else(|| ValidationError::InvalidVariant {
        field: "movement_type",
        value: value.to_owned(),
    })
}

fn positive_quantity(field: &'static str, q: Decimal) -> Result<Decimal, ValidationError> {
    if q <= Decimal::ZERO {
        return Err(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: f64::MAX,
        });
    }
    Ok(q)
}

impl MovementRequest {
    pub fn validate(self) -> Result<NewMovement, ApiError> {
        if self.items.is_empty() {
            return Err(ApiError::bad_request("At least one item is required"));
        }
        let items = self
            .items
            .into_iter()
            .map(|item| {
                Ok(NewMovementItem {
                    item_code: required_text("item_code", Some(&item.item_code))?,
                    item_name: optional_text("item_name", item.item_name.as_deref())?,
                    planned_quantity: positive_quantity("planned_quantity", item.planned_quantity)?,
                    actual_quantity: non_negative("actual_quantity", item.actual_quantity)?,
                    unit_cost: non_negative("unit_cost", item.unit_cost)?,
                    lot_number: optional_text("lot_number", item.lot_number.as_deref())?,
                    serial_numbers: item.serial_numbers,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(NewMovement {
            movement_type: movement_type(&self.movement_type)?,
            reference_number: optional_text("reference_number", self.reference_number.as_deref())?,
            reference_type: optional_text("reference_type", self.reference_type.as_deref())?,
            from_location: optional_text("from_location", self.from_location.as_deref())?,
            to_location: optional_text("to_location", self.to_location.as_deref())?,
            status: optional_one_of("status", self.status.as_deref(), MOVEMENT_STATUSES)?
                .unwrap_or("pending")
                .to_owned(),
            reason: self.reason,
            notes: self.notes,
            created_by: optional_text("created_by", self.created_by.as_deref())?,
            items,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkItemRequest {
    pub item_code: String,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub movement_type: String,
    pub reference_number: Option<String>,
    #[serde(default)]
    pub items: Vec<BulkItemRequest>,
}

impl BulkRequest {
    pub fn validate(self) -> Result<(MovementType, Option<String>, Vec<BulkItem>), ApiError> {
        if self.items.is_empty() {
            return Err(ApiError::bad_request("At least one item is required"));
        }
        let kind = movement_type(&self.movement_type)?;
        if !matches!(kind, MovementType::Inbound | MovementType::Outbound) {
            return Err(ApiError::bad_request(
                "Bulk transactions support inbound and outbound movements only",
            ));
        }
        let items = self
            .items
            .into_iter()
            .map(|i| {
                Ok(BulkItem {
                    item_code: required_text("item_code", Some(&i.item_code))?,
                    quantity: positive_quantity("quantity", i.quantity)?,
                    unit_cost: non_negative("unit_cost", i.unit_cost)?,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        Ok((kind, self.reference_number, items))
    }
}

/// GET /api/procurement/{project_id}/stock
async fn list_stock(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiQuery(q): ApiQuery<StockQuery>,
) -> ApiResult<Paginated<StockPosition>> {
    let filter = StockFilter {
        category: non_blank(q.category.as_deref()).map(str::to_owned),
        stock_status: optional_one_of("stock_status", q.stock_status.as_deref(), &StockStatus::ALL)?
            .map(str::to_owned),
        warehouse_location: non_blank(q.warehouse_location.as_deref()).map(str::to_owned),
        bin_location: non_blank(q.bin_location.as_deref()).map(str::to_owned),
        item_code: non_blank(q.item_code.as_deref()).map(like_pattern),
        low_stock: q.low_stock,
    };
    let page = Pagination::from_parts(q.page, q.per_page);
    let stock = StockRepo::new(&state.pool).list(project_id, &filter, page).await?;
    Ok(ApiResponse::ok(stock))
}

/// POST /api/procurement/{project_id}/stock
async fn create_stock(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<StockRequest>,
) -> CreatedResult<StockPosition> {
    let new = req.into_new()?;
    let position = StockRepo::new(&state.pool).create(project_id, &new).await?;
    tracing::info!(%project_id, item_code = %position.item_code, "stock position created");
    Ok(ApiResponse::created(position))
}

/// GET /api/procurement/{project_id}/stock/{id}
async fn get_stock(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<StockPosition> {
    Ok(ApiResponse::ok(StockRepo::new(&state.pool).get(project_id, id).await?))
}

/// PUT /api/procurement/{project_id}/stock/{id}
async fn update_stock(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
    ApiJson(req): ApiJson<StockRequest>,
) -> ApiResult<StockPosition> {
    if req.item_code.is_some() {
        return Err(ApiError::bad_request("item_code cannot be changed"));
    }
    let changes = req.into_changes()?;
    let position = StockRepo::new(&state.pool).update(project_id, id, &changes).await?;
    Ok(ApiResponse::with_message(position, "Stock position updated successfully"))
}

/// DELETE /api/procurement/{project_id}/stock/{id}
async fn delete_stock(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(project_id, id): ValidUuidPair,
) -> ApiResult<serde_json::Value> {
    StockRepo::new(&state.pool).delete(project_id, id).await?;
    Ok(ApiResponse::with_message(
        serde_json::json!({ "id": id }),
        "Stock position deleted successfully",
    ))
}

/// GET /api/procurement/{project_id}/stock/movements
async fn list_movements(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiQuery(q): ApiQuery<MovementQuery>,
) -> ApiResult<Paginated<StockMovement>> {
    let filter = MovementFilter {
        movement_type: non_blank(q.movement_type.as_deref())
            .map(movement_type)
            .transpose()?
            .map(|t| t.as_str().to_owned()),
        status: optional_one_of("status", q.status.as_deref(), MOVEMENT_STATUSES)?
            .map(str::to_owned),
    };
    let page = Pagination::from_parts(q.page, q.per_page);
    let movements = StockRepo::new(&state.pool)
        .movements(project_id, &filter, page)
        .await?;
    Ok(ApiResponse::ok(movements))
}

/// POST /api/procurement/{project_id}/stock/movements
async fn create_movement(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<MovementRequest>,
) -> CreatedResult<StockMovement> {
    let movement = req.validate()?;
    let created = StockRepo::new(&state.pool)
        .create_movement(project_id, &movement)
        .await?;
    Ok(ApiResponse::created(created))
}

/// POST /api/procurement/{project_id}/stock/movements/bulk
async fn bulk_transaction(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
    ApiJson(req): ApiJson<BulkRequest>,
) -> ApiResult<BulkOutcome> {
    let (kind, reference, items) = req.validate()?;
    let outcome = StockRepo::new(&state.pool)
        .bulk_transaction(project_id, kind, reference.as_deref(), &items)
        .await?;
    Ok(ApiResponse::with_message(
        outcome,
        "Bulk transaction completed successfully",
    ))
}

/// GET /api/procurement/{project_id}/stock/dashboard
async fn dashboard(
    State(state): State<Arc<AppState>>,
    ValidUuid(project_id): ValidUuid,
) -> ApiResult<StockDashboard> {
    Ok(ApiResponse::ok(StockRepo::new(&state.pool).dashboard(project_id).await?))
}

/// Stock routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/procurement/{project_id}/stock",
            get(list_stock).post(create_stock),
        )
        .route(
            "/api/procurement/{project_id}/stock/movements",
            get(list_movements).post(create_movement),
        )
        .route(
            "/api/procurement/{project_id}/stock/movements/bulk",
            post(bulk_transaction),
        )
        .route("/api/procurement/{project_id}/stock/dashboard", get(dashboard))
        .route(
            "/api/procurement/{project_id}/stock/{id}",
            get(get_stock).put(update_stock).delete(delete_stock),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, get, json, offline_app, unique};

    const PROJECT: &str = "6f1c1c1e-8c2a-4a57-9d6b-1f0f4b9d2a10";

    #[test]
    fn create_requires_code_and_name() {
        let req = StockRequest {
            item_name: Some("Drop cable".into()),
            ..Default::default()
        };
        assert_eq!(
            req.into_new().unwrap_err(),
            ValidationError::Missing { field: "item_code" }
        );

        let req = StockRequest {
            item_code: Some("FC-12".into()),
            available_quantity: Some(Decimal::new(-5, 0)),
            item_name: Some("Fibre 12 core".into()),
            ..Default::default()
        };
        assert!(req.into_new().is_err());
    }

    #[test]
    fn movement_type_is_case_insensitive() {
        assert_eq!(movement_type("Outbound").unwrap(), MovementType::Outbound);
        assert!(movement_type("teleport").is_err());
    }

    #[test]
    fn bulk_rejects_transfers_and_zero_quantities() {
        let req = BulkRequest {
            movement_type: "transfer".into(),
            reference_number: None,
            items: vec![BulkItemRequest {
                item_code: "FC-12".into(),
                quantity: Decimal::ONE,
                unit_cost: None,
            }],
        };
        assert!(req.validate().is_err());

        let req = BulkRequest {
            movement_type: "inbound".into(),
            reference_number: None,
            items: vec![BulkItemRequest {
                item_code: "FC-12".into(),
                quantity: Decimal::ZERO,
                unit_cost: None,
            }],
        };
        assert!(req.validate().is_err());
    }

    #[tokio::test]
    async fn malformed_project_id_is_400() {
        let response = offline_app()
            .oneshot(get("/api/procurement/not-a-uuid/stock"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_movement_is_400() {
        let response = offline_app()
            .oneshot(json(
                "POST",
                &format!("/api/procurement/{PROJECT}/stock/movements"),
                json!({ "movement_type": "inbound", "items": [] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "At least one item is required");
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn bulk_outbound_moves_levels() {
        let app = database_app().await;
        let code = unique("PRJ");
        let project = app
            .clone()
            .oneshot(json("POST", "/api/projects", json!({ "name": "Stock test", "project_code": code })))
            .await
            .unwrap();
        let project_id = body_json(project).await["data"]["id"].as_str().unwrap().to_owned();
        let base = format!("/api/procurement/{project_id}/stock");

        let created = app
            .clone()
            .oneshot(json(
                "POST",
                &base,
                json!({
                    "item_code": "FC-12",
                    "item_name": "Fibre 12 core",
                    "available_quantity": 100,
                    "unit_cost": 2.5,
                    "reorder_point": 20
                }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);

        let bulk = |qty: i64| {
            json(
                "POST",
                &format!("{base}/movements/bulk"),
                json!({ "movement_type": "outbound", "items": [{ "item_code": "FC-12", "quantity": qty }] }),
            )
        };
        let too_many = app.clone().oneshot(bulk(500)).await.unwrap();
        assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);

        let ok = app.clone().oneshot(bulk(90)).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let unknown = app
            .clone()
            .oneshot(json(
                "POST",
                &format!("{base}/movements/bulk"),
                json!({ "movement_type": "inbound", "items": [{ "item_code": "NOPE", "quantity": 1 }] }),
            ))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

        let low = app.oneshot(get(&format!("{base}?low_stock=true"))).await.unwrap();
        let body = body_json(low).await;
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["items"][0]["stock_status"], "low_stock");
    }
}
