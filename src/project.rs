use crate::client::{RegistryApi, decode};
use crate::error::{Error, Result};
use crate::models::{MemberReq, MemberUser, Project, ProjectMember, ProjectMetadata, ProjectReq};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Project roles as numbered by the Harbor API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    ProjectAdmin = 1,
    Developer = 2,
    Guest = 3,
    Maintainer = 4,
}

pub struct ProjectService<A> {
    root_url: String,
    api: Arc<A>,
}

impl<A: RegistryApi> ProjectService<A> {
    pub fn new(root_url: &str, api: Arc<A>) -> Result<Self> {
        Error::require(root_url, "Empty root URL for project operations")?;
        Ok(Self {
            root_url: root_url.to_string(),
            api,
        })
    }

    pub async fn create_project(&self, name: &str, public: bool) -> Result<()> {
        Error::require(name, "Empty project name for creating")?;

        let req = ProjectReq {
            project_name: name.to_string(),
            metadata: ProjectMetadata {
                public: public.to_string(),
            },
        };
        let body = to_json(&req)?;
        self.api
            .post(&format!("{}/api/v2.0/projects", self.root_url), Some(&body))
            .await?;
        info!("Created project {}", name);
        Ok(())
    }

    pub async fn get_project_id(&self, name: &str) -> Result<i64> {
        Error::require(name, "Empty project name for getting ID")?;

        let url = format!("{}/api/v2.0/projects?name={}", self.root_url, name);
        let projects: Vec<Project> = decode("Decode projects", &self.api.get(&url).await?)?;
        projects
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.project_id)
            .ok_or_else(|| {
                Error::transport(
                    format!("Lookup of project {}", name),
                    "no such project",
                )
            })
    }

    pub async fn delete_project(&self, name: &str) -> Result<()> {
        Error::require(name, "Empty project name for deleting")?;

        self.api
            .delete(&format!("{}/api/v2.0/projects/{}", self.root_url, name))
            .await?;
        info!("Deleted project {}", name);
        Ok(())
    }

    pub async fn assign_role(&self, project: &str, username: &str, role: Role) -> Result<()> {
        Error::require(project, "Empty project name for assigning role")?;
        Error::require(username, "Empty user name for assigning role")?;

        let req = MemberReq {
            role_id: role as i64,
            member_user: MemberUser {
                username: username.to_string(),
            },
        };
        let body = to_json(&req)?;
        self.api
            .post(&self.members_url(project), Some(&body))
            .await?;
        info!("Assigned {:?} role in project {} to {}", role, project, username);
        Ok(())
    }

    pub async fn revoke_role(&self, project: &str, username: &str) -> Result<()> {
        Error::require(project, "Empty project name for revoking role")?;
        Error::require(username, "Empty user name for revoking role")?;

        let url = format!("{}?entityname={}", self.members_url(project), username);
        let members: Vec<ProjectMember> = decode("Decode members", &self.api.get(&url).await?)?;
        let member = members
            .into_iter()
            .find(|m| m.entity_name == username)
            .ok_or_else(|| {
                Error::transport(
                    format!("Lookup of member {} in project {}", username, project),
                    "user is not a member",
                )
            })?;

        self.api
            .delete(&format!("{}/{}", self.members_url(project), member.id))
            .await?;
        info!("Revoked role of {} in project {}", username, project);
        Ok(())
    }

    fn members_url(&self, project: &str) -> String {
        format!("{}/api/v2.0/projects/{}/members", self.root_url, project)
    }
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::transport("Encode request body", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubApi;
    use bytes::Bytes;
    use serde_json::json;

    const ROOT: &str = "https://harbor.local";

    #[tokio::test]
    async fn test_create_and_delete_project() {
        let api = Arc::new(StubApi::ok());
        let projects = ProjectService::new(ROOT, api.clone()).unwrap();

        projects.create_project("smoketest", false).await.unwrap();
        projects.delete_project("smoketest").await.unwrap();

        assert_eq!(
            api.calls(),
            vec![
                format!("POST {}/api/v2.0/projects", ROOT),
                format!("DELETE {}/api/v2.0/projects/smoketest", ROOT),
            ]
        );
    }

    #[tokio::test]
    async fn test_get_project_id_matches_exact_name() {
        let api = Arc::new(StubApi::new(|_, _, _| {
            Ok(Bytes::from(
                json!([
                    {"project_id": 4, "name": "smoketest-old"},
                    {"project_id": 7, "name": "smoketest"}
                ])
                .to_string(),
            ))
        }));
        let projects = ProjectService::new(ROOT, api).unwrap();
        assert_eq!(projects.get_project_id("smoketest").await.unwrap(), 7);
        assert!(projects.get_project_id("other").await.is_err());
    }

    #[tokio::test]
    async fn test_revoke_role_deletes_membership() {
        let api = Arc::new(StubApi::new(|method, _, _| match method {
            "GET" => Ok(Bytes::from(
                json!([{"id": 12, "entity_name": "user001", "role_id": 2}]).to_string(),
            )),
            _ => Ok(Bytes::new()),
        }));
        let projects = ProjectService::new(ROOT, api.clone()).unwrap();

        projects.revoke_role("smoketest", "user001").await.unwrap();
        assert_eq!(
            api.calls(),
            vec![
                format!("GET {}/api/v2.0/projects/smoketest/members?entityname=user001", ROOT),
                format!("DELETE {}/api/v2.0/projects/smoketest/members/12", ROOT),
            ]
        );
    }

    #[tokio::test]
    async fn test_revoke_role_of_non_member_fails() {
        let api = Arc::new(StubApi::new(|_, _, _| Ok(Bytes::from_static(b"[]"))));
        let projects = ProjectService::new(ROOT, api.clone()).unwrap();

        assert!(projects.revoke_role("smoketest", "user001").await.is_err());
        assert_eq!(api.count("DELETE"), 0);
    }

    #[tokio::test]
    async fn test_blank_names_are_rejected() {
        let api = Arc::new(StubApi::ok());
        let projects = ProjectService::new(ROOT, api.clone()).unwrap();

        assert!(projects.create_project(" ", false).await.unwrap_err().is_validation());
        assert!(
            projects
                .assign_role("smoketest", "", Role::Developer)
                .await
                .unwrap_err()
                .is_validation()
        );
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_member_request_body() {
        let req = MemberReq {
            role_id: Role::Developer as i64,
            member_user: MemberUser {
                username: "user001".to_string(),
            },
        };
        assert_eq!(
            to_json(&req).unwrap(),
            json!({"role_id": 2, "member_user": {"username": "user001"}})
        );
    }
}
