//! Project endpoints and project staff assignments

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{delete, get},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::projects::{
    NewProject, Project, ProjectChanges, ProjectFilter, ProjectStaff,
};
use crate::db::repos::ProjectRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid, ValidUuidPair};
use crate::http::response::{ApiResponse, ApiResult, CreatedResult};
use crate::http::server::AppState;
use crate::models::fields::{
    like_pattern, non_blank, non_negative, one_of_list, optional_one_of, optional_text, percentage,
    required_text,
};
use crate::models::status::{PRIORITIES, PROJECT_STATUSES};
use crate::models::{Code, Paginated, Pagination, ValidationError};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    /// Comma separated, e.g. `ACTIVE,ON_HOLD`
    pub status: Option<String>,
    pub search: Option<String>,
    pub client_id: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectRequest {
    pub project_code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<Uuid>,
    pub project_manager_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub project_type: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: Option<f64>,
    pub budget: Option<Decimal>,
    pub actual_cost: Option<Decimal>,
}

impl ProjectRequest {
    fn check_dates(&self) -> Result<(), ApiError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ApiError::bad_request("end_date must not be before start_date"));
            }
        }
        Ok(())
    }

    pub fn into_new(self) -> Result<NewProject, ApiError> {
        self.check_dates()?;
        let code = self
            .project_code
            .as_deref()
            .ok_or(ValidationError::Missing { field: "project_code" })?;

        Ok(NewProject {
            project_code: Code::new("project_code", code)?.into_string(),
            name: required_text("name", self.name.as_deref())?,
            status: optional_one_of("status", self.status.as_deref(), PROJECT_STATUSES)?
                .unwrap_or("ACTIVE")
                .to_owned(),
            priority: optional_one_of("priority", self.priority.as_deref(), PRIORITIES)?
                .unwrap_or("MEDIUM")
                .to_owned(),
            progress: self
                .progress
                .map(|p| percentage("progress", p))
                .transpose()?
                .unwrap_or(0.0),
            project_type: optional_text("project_type", self.project_type.as_deref())?,
            location: optional_text("location", self.location.as_deref())?,
            budget: non_negative("budget", self.budget)?,
            actual_cost: non_negative("actual_cost", self.actual_cost)?,
            description: self.description,
            client_id: self.client_id,
            project_manager_id: self.project_manager_id,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }

    pub fn into_changes(self) -> Result<ProjectChanges, ApiError> {
        self.check_dates()?;
        Ok(ProjectChanges {
            project_code: non_blank(self.project_code.as_deref())
                .map(|c| Code::new("project_code", c).map(Code::into_string))
                .transpose()?,
            name: self
                .name
                .as_deref()
                .map(|n| required_text("name", Some(n)))
                .transpose()?,
            status: optional_one_of("status", self.status.as_deref(), PROJECT_STATUSES)?
                .map(str::to_owned),
            priority: optional_one_of("priority", self.priority.as_deref(), PRIORITIES)?
                .map(str::to_owned),
            progress: self.progress.map(|p| percentage("progress", p)).transpose()?,
            project_type: optional_text("project_type", self.project_type.as_deref())?,
            location: optional_text("location", self.location.as_deref())?,
            budget: non_negative("budget", self.budget)?,
            actual_cost: non_negative("actual_cost", self.actual_cost)?,
            description: self.description,
            client_id: self.client_id,
            project_manager_id: self.project_manager_id,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignStaffRequest {
    pub staff_id: Uuid,
    pub role: Option<String>,
}

/// GET /api/projects
async fn list_projects(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<ProjectQuery>,
) -> ApiResult<Paginated<Project>> {
    let statuses = non_blank(q.status.as_deref())
        .map(|s| one_of_list("status", s, PROJECT_STATUSES))
        .transpose()?
        .filter(|s| !s.is_empty());
    let filter = ProjectFilter {
        statuses,
        search: non_blank(q.search.as_deref()).map(like_pattern),
        client_id: q.client_id,
    };
    let page = Pagination::from_parts(q.page, q.per_page);
    let projects = ProjectRepo::new(&state.pool).list(&filter, page).await?;
    Ok(ApiResponse::ok(projects))
}

/// POST /api/projects
async fn create_project(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ProjectRequest>,
) -> CreatedResult<Project> {
    let new = req.into_new()?;
    let project = ProjectRepo::new(&state.pool).create(&new).await?;
    tracing::info!(project_id = %project.id, code = %project.project_code, "project created");
    Ok(ApiResponse::created(project))
}

/// GET /api/projects/{id}
async fn get_project(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<Project> {
    Ok(ApiResponse::ok(ProjectRepo::new(&state.pool).get(id).await?))
}

/// PUT /api/projects/{id}
async fn update_project(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<ProjectRequest>,
) -> ApiResult<Project> {
    let changes = req.into_changes()?;
    let project = ProjectRepo::new(&state.pool).update(id, &changes).await?;
    Ok(ApiResponse::with_message(project, "Project updated successfully"))
}

/// DELETE /api/projects/{id}
async fn delete_project(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<serde_json::Value> {
    ProjectRepo::new(&state.pool).delete(id).await?;
    Ok(ApiResponse::with_message(
        serde_json::json!({ "id": id }),
        "Project deleted successfully",
    ))
}

/// GET /api/projects/{id}/staff
async fn list_project_staff(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<Vec<ProjectStaff>> {
    Ok(ApiResponse::ok(ProjectRepo::new(&state.pool).staff(id).await?))
}

/// POST /api/projects/{id}/staff
async fn assign_project_staff(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<AssignStaffRequest>,
) -> CreatedResult<ProjectStaff> {
    let role = optional_text("role", req.role.as_deref())?;
    let assigned = ProjectRepo::new(&state.pool)
        .assign_staff(id, req.staff_id, role.as_deref())
        .await?;
    Ok(ApiResponse::created(assigned))
}

/// DELETE /api/projects/{id}/staff/{staff_id}
async fn remove_project_staff(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(id, staff_id): ValidUuidPair,
) -> ApiResult<serde_json::Value> {
    ProjectRepo::new(&state.pool).unassign_staff(id, staff_id).await?;
    Ok(ApiResponse::with_message(
        serde_json::json!({ "project_id": id, "staff_id": staff_id }),
        "Staff member removed from project",
    ))
}

/// Project routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route(
            "/api/projects/{id}/staff",
            get(list_project_staff).post(assign_project_staff),
        )
        .route(
            "/api/projects/{id}/staff/{staff_id}",
            delete(remove_project_staff),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{
        body_json, database_app, delete as delete_req, get, json, offline_app, unique,
    };

    fn valid() -> ProjectRequest {
        ProjectRequest {
            project_code: Some("LAW-001".into()),
            name: Some("Lawley Phase 1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_defaults_status_and_priority() {
        let new = valid().into_new().unwrap();
        assert_eq!(new.status, "ACTIVE");
        assert_eq!(new.priority, "MEDIUM");
        assert_eq!(new.progress, 0.0);
    }

    #[test]
    fn progress_must_be_a_percentage() {
        let mut req = valid();
        req.progress = Some(120.0);
        assert!(req.into_new().is_err());
    }

    #[test]
    fn dates_must_be_ordered() {
        let mut req = valid();
        req.start_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        req.end_date = NaiveDate::from_ymd_opt(2025, 1, 1);
        assert!(matches!(req.into_new(), Err(ApiError::BadRequest { .. })));
    }

    #[test]
    fn negative_budget_rejected() {
        let mut req = valid();
        req.budget = Some(Decimal::new(-1, 0));
        assert!(req.into_changes().is_err());
    }

    #[tokio::test]
    async fn unknown_status_in_list_is_400() {
        let response = offline_app()
            .oneshot(get("/api/projects?status=ACTIVE,SLEEPING"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "validation_error");
    }

    #[tokio::test]
    async fn missing_code_is_400() {
        let response = offline_app()
            .oneshot(json("POST", "/api/projects", json!({ "name": "No code" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "project_code is required");
    }

    #[tokio::test]
    async fn bad_staff_id_is_400() {
        let id = Uuid::new_v4();
        let response = offline_app()
            .oneshot(delete_req(&format!("/api/projects/{}/staff/nope", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn create_then_filter_by_status() {
        let app = database_app().await;
        let code = unique("PRJ");

        let response = app
            .clone()
            .oneshot(json(
                "POST",
                "/api/projects",
                json!({ "name": "Filter test", "project_code": code, "status": "on_hold" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "ON_HOLD");

        let response = app
            .oneshot(get(&format!("/api/projects?status=ON_HOLD&search={}", code)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["total"], 1);
    }
}
