//! Staff endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::staff::{
    NewPerformance, NewStaff, Staff, StaffChanges, StaffFilter, StaffPerformance,
};
use crate::db::repos::StaffRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid};
use crate::http::response::{ApiResponse, ApiResult, CreatedResult};
use crate::http::server::AppState;
use crate::models::fields::{
    in_range, like_pattern, non_blank, non_negative, optional_one_of, optional_text, percentage,
    required_text,
};
use crate::models::status::{STAFF_STATUSES, STAFF_TYPES};
use crate::models::{Code, Email, Paginated, Pagination, ValidationError};

#[derive(Debug, Default, Deserialize)]
pub struct StaffQuery {
    pub search: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub staff_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StaffRequest {
    pub employee_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    #[serde(rename = "type")]
    pub staff_type: Option<String>,
    pub status: Option<String>,
    pub salary: Option<Decimal>,
    pub join_date: Option<NaiveDate>,
    pub skills: Option<Vec<String>>,
    pub certifications: Option<Vec<String>>,
    pub reports_to: Option<Uuid>,
    pub notes: Option<String>,
}

fn clean_list(items: Option<Vec<String>>) -> Option<Vec<String>> {
    items.map(|v| {
        v.into_iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl StaffRequest {
    pub fn into_new(self) -> Result<NewStaff, ValidationError> {
        let employee_id = self
            .employee_id
            .as_deref()
            .ok_or(ValidationError::Missing { field: "employee_id" })?;
        let email = self
            .email
            .as_deref()
            .ok_or(ValidationError::Missing { field: "email" })?;

        Ok(NewStaff {
            employee_id: Code::new("employee_id", employee_id)?.into_string(),
            name: required_text("name", self.name.as_deref())?,
            email: Email::new("email", email)?.into_string(),
            phone: optional_text("phone", self.phone.as_deref())?,
            department: optional_text("department", self.department.as_deref())?,
            position: optional_text("position", self.position.as_deref())?,
            staff_type: optional_one_of("type", self.staff_type.as_deref(), STAFF_TYPES)?
                .unwrap_or("FULL_TIME")
                .to_owned(),
            status: optional_one_of("status", self.status.as_deref(), STAFF_STATUSES)?
                .unwrap_or("ACTIVE")
                .to_owned(),
            salary: non_negative("salary", self.salary)?,
            join_date: self.join_date,
            skills: clean_list(self.skills).unwrap_or_default(),
            certifications: clean_list(self.certifications).unwrap_or_default(),
            reports_to: self.reports_to,
            notes: self.notes,
        })
    }

    pub fn into_changes(self) -> Result<StaffChanges, ValidationError> {
        Ok(StaffChanges {
            employee_id: non_blank(self.employee_id.as_deref())
                .map(|c| Code::new("employee_id", c).map(Code::into_string))
                .transpose()?,
            name: self
                .name
                .as_deref()
                .map(|n| required_text("name", Some(n)))
                .transpose()?,
            email: non_blank(self.email.as_deref())
                .map(|e| Email::new("email", e).map(Email::into_string))
                .transpose()?,
            phone: optional_text("phone", self.phone.as_deref())?,
            department: optional_text("department", self.department.as_deref())?,
            position: optional_text("position", self.position.as_deref())?,
            staff_type: optional_one_of("type", self.staff_type.as_deref(), STAFF_TYPES)?
                .map(str::to_owned),
            status: optional_one_of("status", self.status.as_deref(), STAFF_STATUSES)?
                .map(str::to_owned),
            salary: non_negative("salary", self.salary)?,
            join_date: self.join_date,
            skills: clean_list(self.skills),
            certifications: clean_list(self.certifications),
            reports_to: self.reports_to,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PerformanceRequest {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub productivity: Option<f64>,
    pub quality_score: Option<f64>,
    pub safety_score: Option<f64>,
    #[serde(default)]
    pub hours_worked: f64,
    #[serde(default)]
    pub tasks_completed: i32,
    pub notes: Option<String>,
}

impl PerformanceRequest {
    pub fn validate(self) -> Result<NewPerformance, ApiError> {
        if self.period_end < self.period_start {
            return Err(ApiError::bad_request("period_end must not be before period_start"));
        }
        let score = |field, v: Option<f64>| v.map(|v| percentage(field, v)).transpose();
        Ok(NewPerformance {
            period_start: self.period_start,
            period_end: self.period_end,
            productivity: score("productivity", self.productivity)?,
            quality_score: score("quality_score", self.quality_score)?,
            safety_score: score("safety_score", self.safety_score)?,
            hours_worked: in_range("hours_worked", self.hours_worked, 0.0, 744.0)?,
            tasks_completed: self.tasks_completed.max(0),
            notes: self.notes,
        })
    }
}

/// GET /api/staff
async fn list_staff(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<StaffQuery>,
) -> ApiResult<Paginated<Staff>> {
    let filter = StaffFilter {
        search: non_blank(q.search.as_deref()).map(like_pattern),
        department: non_blank(q.department.as_deref()).map(str::to_owned),
        status: optional_one_of("status", q.status.as_deref(), STAFF_STATUSES)?.map(str::to_owned),
        staff_type: optional_one_of("type", q.staff_type.as_deref(), STAFF_TYPES)?
            .map(str::to_owned),
    };
    let page = Pagination::from_parts(q.page, q.per_page);
    let staff = StaffRepo::new(&state.pool).list(&filter, page).await?;
    Ok(ApiResponse::ok(staff))
}

/// POST /api/staff
async fn create_staff(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<StaffRequest>,
) -> CreatedResult<Staff> {
    let new = req.into_new()?;
    let staff = StaffRepo::new(&state.pool).create(&new).await?;
    tracing::info!(staff_id = %staff.id, employee_id = %staff.employee_id, "staff created");
    Ok(ApiResponse::created(staff))
}

/// GET /api/staff/{id}
async fn get_staff(State(state): State<Arc<AppState>>, ValidUuid(id): ValidUuid) -> ApiResult<Staff> {
    Ok(ApiResponse::ok(StaffRepo::new(&state.pool).get(id).await?))
}

/// PUT /api/staff/{id}
async fn update_staff(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<StaffRequest>,
) -> ApiResult<Staff> {
    let changes = req.into_changes()?;
    if changes.reports_to == Some(id) {
        return Err(ApiError::bad_request("a staff member cannot report to themselves"));
    }
    let staff = StaffRepo::new(&state.pool).update(id, &changes).await?;
    Ok(ApiResponse::with_message(staff, "Staff member updated successfully"))
}

/// DELETE /api/staff/{id}
async fn delete_staff(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<serde_json::Value> {
    StaffRepo::new(&state.pool).delete(id).await?;
    Ok(ApiResponse::with_message(
        serde_json::json!({ "id": id }),
        "Staff member deleted successfully",
    ))
}

/// GET /api/staff/{id}/performance
async fn list_performance(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<Vec<StaffPerformance>> {
    Ok(ApiResponse::ok(StaffRepo::new(&state.pool).performance(id).await?))
}

/// POST /api/staff/{id}/performance
async fn add_performance(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<PerformanceRequest>,
) -> CreatedResult<StaffPerformance> {
    let record = req.validate()?;
    let created = StaffRepo::new(&state.pool).add_performance(id, &record).await?;
    Ok(ApiResponse::created(created))
}

/// Staff routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/staff", get(list_staff).post(create_staff))
        .route(
            "/api/staff/{id}",
            get(get_staff).put(update_staff).delete(delete_staff),
        )
        .route(
            "/api/staff/{id}/performance",
            get(list_performance).post(add_performance),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, get, json, offline_app, unique};

    fn valid() -> StaffRequest {
        StaffRequest {
            employee_id: Some("EMP-001".into()),
            name: Some("Thandi Nkosi".into()),
            email: Some("thandi@fibreflow.co.za".into()),
            skills: Some(vec![" splicing ".into(), "".into()]),
            ..Default::default()
        }
    }

    #[test]
    fn create_defaults_type_and_status() {
        let new = valid().into_new().unwrap();
        assert_eq!(new.staff_type, "FULL_TIME");
        assert_eq!(new.status, "ACTIVE");
        assert_eq!(new.skills, vec!["splicing"]);
    }

    #[test]
    fn create_requires_identity_fields() {
        let mut req = valid();
        req.employee_id = None;
        assert_eq!(
            req.into_new().unwrap_err(),
            ValidationError::Missing { field: "employee_id" }
        );

        let mut req = valid();
        req.email = Some("not-an-email".into());
        assert!(req.into_new().is_err());
    }

    #[test]
    fn type_is_case_insensitive() {
        let mut req = valid();
        req.staff_type = Some("contract".into());
        assert_eq!(req.into_new().unwrap().staff_type, "CONTRACT");
    }

    #[test]
    fn performance_period_must_be_ordered() {
        let req = PerformanceRequest {
            period_start: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            productivity: None,
            quality_score: None,
            safety_score: None,
            hours_worked: 0.0,
            tasks_completed: 0,
            notes: None,
        };
        assert!(req.validate().is_err());
    }

    #[tokio::test]
    async fn missing_email_is_400() {
        let response = offline_app()
            .oneshot(json(
                "POST",
                "/api/staff",
                json!({ "employee_id": "E1", "name": "A" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "email is required");
    }

    #[tokio::test]
    async fn unknown_type_filter_is_400() {
        let response = offline_app()
            .oneshot(get("/api/staff?type=VOLUNTEER"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_employee_is_409() {
        let app = database_app().await;
        let employee_id = unique("EMP");
        let body = json!({
            "employee_id": employee_id,
            "name": "Sipho",
            "email": format!("{}@fibreflow.test", employee_id.to_lowercase()),
        });

        let first = app.clone().oneshot(json("POST", "/api/staff", body.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app.oneshot(json("POST", "/api/staff", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }
}
