//! Contractor endpoints: contractors, teams, documents, incidents,
//! assignments and per-contractor analytics

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::repos::contractors::{
    Contractor, ContractorAnalytics, ContractorChanges, ContractorDetail, ContractorDocument,
    ContractorFilter, ContractorTeam, DocumentReview, NewAssignment, NewContractor, NewDocument,
    NewIncident, NewTeam, ProjectAssignment, SafetyIncident,
};
use crate::db::repos::ContractorRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{ApiJson, ApiQuery, ValidUuid, ValidUuidPair};
use crate::http::response::{ApiResponse, ApiResult, CreatedResult};
use crate::http::server::AppState;
use crate::models::fields::{
    in_range, like_pattern, non_blank, non_negative, one_of, optional_one_of, optional_text,
    required_text,
};
use crate::models::status::{
    ASSIGNMENT_STATUSES, COMPLIANCE_STATUSES, CONTRACTOR_STATUSES, DOCUMENT_STATUSES,
    PAYMENT_STATUSES, SEVERITIES, TEAM_AVAILABILITY,
};
use crate::models::{Email, Paginated, Pagination, ValidationError};

const RAG_VALUES: &[&str] = &["green", "amber", "red"];

#[derive(Debug, Default, Deserialize)]
pub struct ContractorQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub rag: Option<String>,
    pub active: Option<bool>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContractorRequest {
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub physical_address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub business_type: Option<String>,
    pub industry_category: Option<String>,
    pub years_in_business: Option<i32>,
    pub employee_count: Option<i32>,
    pub annual_turnover: Option<Decimal>,
    pub insurance_coverage: Option<Decimal>,
    pub bonding_capacity: Option<Decimal>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
    pub compliance_status: Option<String>,
    pub notes: Option<String>,
}

fn count(field: &'static str, v: Option<i32>) -> Result<Option<i32>, ValidationError> {
    v.map(|n| in_range(field, f64::from(n), 0.0, 1_000_000.0).map(|_| n))
        .transpose()
}

impl ContractorRequest {
    pub fn into_new(self) -> Result<NewContractor, ValidationError> {
        let email = self
            .email
            .as_deref()
            .ok_or(ValidationError::Missing { field: "email" })?;

        Ok(NewContractor {
            company_name: required_text("company_name", self.company_name.as_deref())?,
            registration_number: required_text(
                "registration_number",
                self.registration_number.as_deref(),
            )?,
            contact_person: required_text("contact_person", self.contact_person.as_deref())?,
            email: Email::new("email", email)?.into_string(),
            phone: optional_text("phone", self.phone.as_deref())?,
            physical_address: self.physical_address,
            city: optional_text("city", self.city.as_deref())?,
            province: optional_text("province", self.province.as_deref())?,
            business_type: optional_text("business_type", self.business_type.as_deref())?,
            industry_category: optional_text(
                "industry_category",
                self.industry_category.as_deref(),
            )?,
            years_in_business: count("years_in_business", self.years_in_business)?,
            employee_count: count("employee_count", self.employee_count)?,
            annual_turnover: non_negative("annual_turnover", self.annual_turnover)?,
            insurance_coverage: non_negative("insurance_coverage", self.insurance_coverage)?,
            bonding_capacity: non_negative("bonding_capacity", self.bonding_capacity)?,
            status: optional_one_of("status", self.status.as_deref(), CONTRACTOR_STATUSES)?
                .unwrap_or("pending")
                .to_owned(),
            compliance_status: optional_one_of(
                "compliance_status",
                self.compliance_status.as_deref(),
                COMPLIANCE_STATUSES,
            )?
            .unwrap_or("pending")
            .to_owned(),
            notes: self.notes,
        })
    }

    pub fn into_changes(self) -> Result<ContractorChanges, ValidationError> {
        let present = |field: &'static str, v: Option<String>| {
            v.map(|s| required_text(field, Some(&s))).transpose()
        };
        Ok(ContractorChanges {
            company_name: present("company_name", self.company_name)?,
            registration_number: present("registration_number", self.registration_number)?,
            contact_person: present("contact_person", self.contact_person)?,
            email: self
                .email
                .as_deref()
                .map(|e| Email::new("email", e).map(Email::into_string))
                .transpose()?,
            phone: self.phone,
            physical_address: self.physical_address,
            city: self.city,
            province: self.province,
            business_type: self.business_type,
            industry_category: self.industry_category,
            years_in_business: count("years_in_business", self.years_in_business)?,
            employee_count: count("employee_count", self.employee_count)?,
            annual_turnover: non_negative("annual_turnover", self.annual_turnover)?,
            insurance_coverage: non_negative("insurance_coverage", self.insurance_coverage)?,
            bonding_capacity: non_negative("bonding_capacity", self.bonding_capacity)?,
            status: optional_one_of("status", self.status.as_deref(), CONTRACTOR_STATUSES)?
                .map(str::to_owned),
            is_active: self.is_active,
            compliance_status: optional_one_of(
                "compliance_status",
                self.compliance_status.as_deref(),
                COMPLIANCE_STATUSES,
            )?
            .map(str::to_owned),
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TeamRequest {
    pub team_name: Option<String>,
    pub team_type: Option<String>,
    pub specialization: Option<String>,
    pub max_capacity: Option<i32>,
    pub availability: Option<String>,
    pub base_location: Option<String>,
}

impl TeamRequest {
    pub fn validate(self) -> Result<NewTeam, ValidationError> {
        Ok(NewTeam {
            team_name: required_text("team_name", self.team_name.as_deref())?,
            team_type: optional_text("team_type", self.team_type.as_deref())?,
            specialization: optional_text("specialization", self.specialization.as_deref())?,
            max_capacity: count("max_capacity", self.max_capacity)?.unwrap_or(0),
            availability: optional_one_of(
                "availability",
                self.availability.as_deref(),
                TEAM_AVAILABILITY,
            )?
            .unwrap_or("available")
            .to_owned(),
            base_location: optional_text("base_location", self.base_location.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentRequest {
    pub document_type: Option<String>,
    pub document_name: Option<String>,
    pub document_number: Option<String>,
    pub file_url: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl DocumentRequest {
    pub fn validate(self) -> Result<NewDocument, ApiError> {
        if let (Some(issue), Some(expiry)) = (self.issue_date, self.expiry_date) {
            if expiry < issue {
                return Err(ApiError::bad_request("expiry_date must not be before issue_date"));
            }
        }
        Ok(NewDocument {
            document_type: required_text("document_type", self.document_type.as_deref())?
                .to_lowercase(),
            document_name: required_text("document_name", self.document_name.as_deref())?,
            document_number: optional_text("document_number", self.document_number.as_deref())?,
            file_url: self.file_url,
            issue_date: self.issue_date,
            expiry_date: self.expiry_date,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentStatusRequest {
    pub status: Option<String>,
    pub verified_by: Option<String>,
    pub rejection_reason: Option<String>,
}

impl DocumentStatusRequest {
    pub fn validate(self) -> Result<DocumentReview, ApiError> {
        let status = self
            .status
            .as_deref()
            .ok_or(ValidationError::Missing { field: "status" })?;
        let status = one_of("status", status, DOCUMENT_STATUSES)?;
        let rejection_reason = optional_text("rejection_reason", self.rejection_reason.as_deref())?;
        if status == "rejected" && rejection_reason.is_none() {
            return Err(ApiError::bad_request("rejection_reason is required when rejecting"));
        }
        Ok(DocumentReview {
            status: status.to_owned(),
            verified_by: optional_text("verified_by", self.verified_by.as_deref())?,
            rejection_reason,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IncidentRequest {
    pub project_id: Option<Uuid>,
    pub incident_date: Option<NaiveDate>,
    pub severity: Option<String>,
    pub description: Option<String>,
    pub reported_by: Option<String>,
}

impl IncidentRequest {
    pub fn validate(self) -> Result<NewIncident, ValidationError> {
        let severity = self
            .severity
            .as_deref()
            .ok_or(ValidationError::Missing { field: "severity" })?;
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(ValidationError::Missing { field: "description" })?;
        Ok(NewIncident {
            project_id: self.project_id,
            incident_date: self.incident_date,
            severity: one_of("severity", severity, SEVERITIES)?.to_owned(),
            description: description.to_owned(),
            reported_by: optional_text("reported_by", self.reported_by.as_deref())?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub project_id: Uuid,
    pub team_id: Option<Uuid>,
    pub scope: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contract_value: Option<Decimal>,
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

impl AssignmentRequest {
    pub fn validate(self) -> Result<NewAssignment, ApiError> {
        if self.end_date < self.start_date {
            return Err(ApiError::bad_request("end_date must not be before start_date"));
        }
        Ok(NewAssignment {
            project_id: self.project_id,
            team_id: self.team_id,
            scope: self.scope,
            start_date: self.start_date,
            end_date: self.end_date,
            contract_value: non_negative("contract_value", self.contract_value)?
                .unwrap_or_default(),
            status: optional_one_of("status", self.status.as_deref(), ASSIGNMENT_STATUSES)?
                .unwrap_or("assigned")
                .to_owned(),
            payment_status: optional_one_of(
                "payment_status",
                self.payment_status.as_deref(),
                PAYMENT_STATUSES,
            )?
            .unwrap_or("pending")
            .to_owned(),
        })
    }
}

/// GET /api/contractors
async fn list_contractors(
    State(state): State<Arc<AppState>>,
    ApiQuery(q): ApiQuery<ContractorQuery>,
) -> ApiResult<Paginated<Contractor>> {
    let filter = ContractorFilter {
        search: non_blank(q.search.as_deref()).map(like_pattern),
        status: optional_one_of("status", q.status.as_deref(), CONTRACTOR_STATUSES)?
            .map(str::to_owned),
        rag: optional_one_of("rag", q.rag.as_deref(), RAG_VALUES)?.map(str::to_owned),
        active: q.active,
    };
    let page = Pagination::from_parts(q.page, q.per_page);
    let contractors = ContractorRepo::new(&state.pool).list(&filter, page).await?;
    Ok(ApiResponse::ok(contractors))
}

/// POST /api/contractors
async fn create_contractor(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ContractorRequest>,
) -> CreatedResult<Contractor> {
    let new = req.into_new()?;
    let contractor = ContractorRepo::new(&state.pool).create(&new).await?;
    tracing::info!(contractor_id = %contractor.id, company = %contractor.company_name, "contractor created");
    Ok(ApiResponse::created(contractor))
}

/// GET /api/contractors/{id}
async fn get_contractor(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<ContractorDetail> {
    Ok(ApiResponse::ok(ContractorRepo::new(&state.pool).get_detail(id).await?))
}

/// PUT /api/contractors/{id}
async fn update_contractor(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<ContractorRequest>,
) -> ApiResult<Contractor> {
    let changes = req.into_changes()?;
    let contractor = ContractorRepo::new(&state.pool).update(id, &changes).await?;
    Ok(ApiResponse::with_message(contractor, "Contractor updated successfully"))
}

/// DELETE /api/contractors/{id}?hard=true
async fn delete_contractor(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiQuery(q): ApiQuery<DeleteQuery>,
) -> ApiResult<serde_json::Value> {
    let repo = ContractorRepo::new(&state.pool);
    let message = if q.hard {
        repo.delete(id).await?;
        tracing::info!(contractor_id = %id, "contractor permanently deleted");
        "Contractor permanently deleted"
    } else {
        repo.deactivate(id).await?;
        "Contractor deactivated"
    };
    Ok(ApiResponse::with_message(serde_json::json!({ "id": id }), message))
}

/// GET /api/contractors/{id}/teams
async fn list_teams(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<Vec<ContractorTeam>> {
    Ok(ApiResponse::ok(ContractorRepo::new(&state.pool).teams(id).await?))
}

/// POST /api/contractors/{id}/teams
async fn create_team(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<TeamRequest>,
) -> CreatedResult<ContractorTeam> {
    let team = req.validate()?;
    Ok(ApiResponse::created(
        ContractorRepo::new(&state.pool).add_team(id, &team).await?,
    ))
}

/// GET /api/contractors/{id}/documents
async fn list_documents(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<Vec<ContractorDocument>> {
    Ok(ApiResponse::ok(ContractorRepo::new(&state.pool).documents(id).await?))
}

/// POST /api/contractors/{id}/documents
async fn create_document(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<DocumentRequest>,
) -> CreatedResult<ContractorDocument> {
    let document = req.validate()?;
    Ok(ApiResponse::created(
        ContractorRepo::new(&state.pool).add_document(id, &document).await?,
    ))
}

/// PUT /api/contractors/{id}/documents/{doc_id}/status
async fn update_document_status(
    State(state): State<Arc<AppState>>,
    ValidUuidPair(id, doc_id): ValidUuidPair,
    ApiJson(req): ApiJson<DocumentStatusRequest>,
) -> ApiResult<ContractorDocument> {
    let review = req.validate()?;
    let document = ContractorRepo::new(&state.pool)
        .review_document(id, doc_id, &review)
        .await?;
    Ok(ApiResponse::with_message(document, "Document status updated"))
}

/// POST /api/contractors/{id}/incidents
async fn create_incident(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<IncidentRequest>,
) -> CreatedResult<SafetyIncident> {
    let incident = req.validate()?;
    let created = ContractorRepo::new(&state.pool).add_incident(id, &incident).await?;
    tracing::warn!(contractor_id = %id, severity = %created.severity, "safety incident recorded");
    Ok(ApiResponse::created(created))
}

/// GET /api/contractors/{id}/assignments
async fn list_assignments(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<Vec<ProjectAssignment>> {
    Ok(ApiResponse::ok(ContractorRepo::new(&state.pool).assignments(id).await?))
}

/// POST /api/contractors/{id}/assignments
async fn create_assignment(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
    ApiJson(req): ApiJson<AssignmentRequest>,
) -> CreatedResult<ProjectAssignment> {
    let assignment = req.validate()?;
    Ok(ApiResponse::created(
        ContractorRepo::new(&state.pool).add_assignment(id, &assignment).await?,
    ))
}

/// GET /api/contractors/{id}/analytics
async fn contractor_analytics(
    State(state): State<Arc<AppState>>,
    ValidUuid(id): ValidUuid,
) -> ApiResult<ContractorAnalytics> {
    Ok(ApiResponse::ok(ContractorRepo::new(&state.pool).analytics(id).await?))
}

/// Contractor routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/contractors", get(list_contractors).post(create_contractor))
        .route(
            "/api/contractors/{id}",
            get(get_contractor)
                .put(update_contractor)
                .delete(delete_contractor),
        )
        .route("/api/contractors/{id}/teams", get(list_teams).post(create_team))
        .route(
            "/api/contractors/{id}/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/api/contractors/{id}/documents/{doc_id}/status",
            put(update_document_status),
        )
        .route("/api/contractors/{id}/incidents", post(create_incident))
        .route(
            "/api/contractors/{id}/assignments",
            get(list_assignments).post(create_assignment),
        )
        .route("/api/contractors/{id}/analytics", get(contractor_analytics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::http::test_support::{body_json, database_app, delete, get, json, offline_app, unique};

    fn valid() -> ContractorRequest {
        ContractorRequest {
            company_name: Some("Velocity Fibre".into()),
            registration_number: Some("2019/123456/07".into()),
            contact_person: Some("Naledi Dlamini".into()),
            email: Some("ops@velocity.co.za".into()),
            ..Default::default()
        }
    }

    #[test]
    fn create_defaults() {
        let new = valid().into_new().unwrap();
        assert_eq!(new.status, "pending");
        assert_eq!(new.compliance_status, "pending");
    }

    #[test]
    fn create_requires_contact_person() {
        let mut req = valid();
        req.contact_person = None;
        assert_eq!(
            req.into_new().unwrap_err(),
            ValidationError::Missing { field: "contact_person" }
        );
    }

    #[test]
    fn empty_update_has_no_changes() {
        let changes = ContractorRequest::default().into_changes().unwrap();
        assert!(changes.company_name.is_none() && changes.email.is_none());
    }

    #[test]
    fn rejection_needs_a_reason() {
        let req = DocumentStatusRequest {
            status: Some("rejected".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());

        let req = DocumentStatusRequest {
            status: Some("Approved".into()),
            verified_by: Some("compliance@fibreflow".into()),
            ..Default::default()
        };
        assert_eq!(req.validate().unwrap().status, "approved");
    }

    #[test]
    fn incident_severity_is_checked() {
        let req = IncidentRequest {
            severity: Some("catastrophic".into()),
            description: Some("Fell from pole".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }

    #[tokio::test]
    async fn unknown_rag_filter_is_400() {
        let response = offline_app()
            .oneshot(get("/api/contractors?rag=purple"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_email_is_400() {
        let id = Uuid::new_v4();
        let response = offline_app()
            .oneshot(json(
                "PUT",
                &format!("/api/contractors/{}", id),
                json!({ "email": "nope" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn lifecycle_with_soft_and_hard_delete() {
        let app = database_app().await;
        let reg = unique("REG");
        let body = json!({
            "company_name": "Lifecycle Civils",
            "registration_number": reg,
            "contact_person": "Pieter",
            "email": format!("{}@civils.test", reg.to_lowercase()),
        });

        let response = app.clone().oneshot(json("POST", "/api/contractors", body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["data"]["id"].as_str().unwrap().to_owned();
        let uri = format!("/api/contractors/{}", id);

        let duplicate = app.clone().oneshot(json("POST", "/api/contractors", body)).await.unwrap();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let empty = app.clone().oneshot(json("PUT", &uri, json!({}))).await.unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(empty).await["error"], "No fields to update");

        let response = app.clone().oneshot(delete(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(body_json(response).await["data"]["is_active"], false);

        let response = app.clone().oneshot(delete(&format!("{}?hard=true", uri))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
