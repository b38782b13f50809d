//! Allowed values for status-like columns.
//!
//! Status strings are plain text in the database; these sets are checked at
//! the API boundary with [`super::fields::one_of`].

pub const CLIENT_STATUSES: &[&str] = &["active", "inactive", "prospect", "archived"];

pub const STAFF_STATUSES: &[&str] = &["ACTIVE", "INACTIVE", "ON_LEAVE", "TERMINATED"];
pub const STAFF_TYPES: &[&str] = &["FULL_TIME", "PART_TIME", "CONTRACT", "INTERN"];

pub const PROJECT_STATUSES: &[&str] = &["PLANNING", "ACTIVE", "ON_HOLD", "COMPLETED", "CANCELLED"];
pub const PRIORITIES: &[&str] = &["LOW", "MEDIUM", "HIGH", "CRITICAL"];

pub const CONTRACTOR_STATUSES: &[&str] = &[
    "pending",
    "approved",
    "active",
    "suspended",
    "blacklisted",
    "inactive",
];
pub const COMPLIANCE_STATUSES: &[&str] = &["pending", "compliant", "non_compliant", "under_review"];
pub const DOCUMENT_STATUSES: &[&str] = &["pending", "approved", "rejected", "expired"];
pub const TEAM_AVAILABILITY: &[&str] = &["available", "busy", "unavailable"];
pub const ASSIGNMENT_STATUSES: &[&str] = &["assigned", "active", "completed", "cancelled", "on_hold"];
pub const PAYMENT_STATUSES: &[&str] = &["pending", "paid", "partial", "overdue"];
pub const SEVERITIES: &[&str] = &["low", "medium", "high"];

pub const SUPPLIER_STATUSES: &[&str] = &["active", "inactive", "blacklisted"];
pub const DRUM_STATUSES: &[&str] = &["available", "in_use", "completed", "returned"];
pub const MOVEMENT_STATUSES: &[&str] = &["pending", "in_transit", "completed", "cancelled"];
pub const RFQ_STATUSES: &[&str] = &["draft", "issued", "closed", "awarded", "cancelled"];
pub const BOQ_STATUSES: &[&str] = &["draft", "mapping", "approved", "rejected", "archived"];
pub const RESOLUTION_STATUSES: &[&str] = &["pending", "resolved", "ignored"];
