use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Report-type key of the native vulnerability report in a scan overview
pub const MIME_TYPE_NATIVE_REPORT: &str =
    "application/vnd.security.vulnerability.report; version=1.1";

pub const SCAN_STATUS_SUCCESS: &str = "Success";
pub const SCAN_STATUS_ERROR: &str = "Error";
pub const SCAN_STATUS_STOPPED: &str = "Stopped";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub id: i64,
    pub digest: String,
    #[serde(default)]
    pub repository_id: i64,
    #[serde(default)]
    pub push_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    #[serde(default)]
    pub scan_overview: Option<HashMap<String, NativeReportSummary>>,
}

impl Artifact {
    /// Scan summary of the native vulnerability report, if the artifact has one
    pub fn native_report(&self) -> Option<&NativeReportSummary> {
        self.scan_overview
            .as_ref()
            .and_then(|overview| overview.get(MIME_TYPE_NATIVE_REPORT))
    }

    pub fn is_scanned(&self) -> bool {
        self.native_report()
            .is_some_and(|summary| summary.scan_status == SCAN_STATUS_SUCCESS)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub push_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NativeReportSummary {
    #[serde(default)]
    pub report_id: String,
    #[serde(default)]
    pub scan_status: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub project_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectReq {
    pub project_name: String,
    pub metadata: ProjectMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectMetadata {
    /// Harbor expects "true"/"false" strings here
    pub public: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    #[serde(default)]
    pub artifact_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserReq {
    pub username: String,
    pub email: String,
    pub realname: String,
    pub password: String,
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMember {
    pub id: i64,
    pub entity_name: String,
    #[serde(default)]
    pub role_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberReq {
    pub role_id: i64,
    pub member_user: MemberUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberUser {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub harbor_version: String,
    #[serde(default)]
    pub auth_mode: Option<String>,
    #[serde(default)]
    pub registry_url: Option<String>,
}
