use crate::client::{RegistryApi, decode};
use crate::error::{Error, Result};
use crate::models::{Artifact, Repository, SCAN_STATUS_ERROR, SCAN_STATUS_STOPPED};
use crate::poll::{PollError, poll_until};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const SCAN_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Repository and artifact operations of one Harbor instance.
pub struct ImageService<A> {
    root_url: String,
    api: Arc<A>,
    scan_interval: Duration,
    scan_timeout: Duration,
}

impl<A: RegistryApi + 'static> ImageService<A> {
    pub fn new(root_url: &str, api: Arc<A>) -> Result<Self> {
        Error::require(root_url, "Empty root URL for image operations")?;
        Ok(Self {
            root_url: root_url.to_string(),
            api,
            scan_interval: SCAN_POLL_INTERVAL,
            scan_timeout: SCAN_TIMEOUT,
        })
    }

    pub fn with_scan_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.scan_interval = interval;
        self.scan_timeout = timeout;
        self
    }

    fn artifact_url(&self, project: &str, repository: &str, digest: &str) -> String {
        format!(
            "{}/api/v2.0/projects/{}/repositories/{}/artifacts/{}",
            self.root_url, project, repository, digest
        )
    }

    pub async fn delete_repository(&self, project: &str, repository: &str) -> Result<()> {
        Error::require(repository, "Empty repo name for deleting")?;

        let url = format!(
            "{}/api/v2.0/projects/{}/repositories/{}",
            self.root_url, project, repository
        );
        self.api.delete(&url).await?;
        info!("Deleted repository {}/{}", project, repository);
        Ok(())
    }

    /// Starts a scan of the artifact and waits until its native
    /// vulnerability report is in the `Success` state.
    pub async fn scan_artifact(&self, project: &str, repository: &str, digest: &str) -> Result<()> {
        Error::require(repository, "Empty repo name for scanning")?;
        Error::require(digest, "Empty image digest for scanning")?;

        let artifact_url = self.artifact_url(project, repository, digest);
        self.api
            .post(&format!("{}/scan", artifact_url), None)
            .await?;
        info!("Scan of {}/{}@{} started", project, repository, digest);

        let api = self.api.clone();
        let url = format!(
            "{}?with_scan_overview=true&with_accessory=true",
            artifact_url
        );
        let fetch = move || {
            let api = api.clone();
            let url = url.clone();
            async move {
                let body = api.get(&url).await?;
                let artifact: Artifact = decode("Decode artifact", &body)?;
                check_scan_failure(&artifact)?;
                Ok::<_, Error>(artifact)
            }
        };

        match poll_until(fetch, Artifact::is_scanned, self.scan_interval, self.scan_timeout).await {
            Ok(artifact) => {
                if let Some(summary) = artifact.native_report() {
                    info!(
                        "Scan of {} finished with severity {:?} in {} seconds",
                        artifact.digest, summary.severity, summary.duration
                    );
                }
                Ok(())
            }
            Err(PollError::Fetch(e)) => Err(e),
            Err(PollError::Timeout(after)) => Err(Error::Timeout {
                operation: "Scan".to_string(),
                after,
            }),
        }
    }

    pub async fn get_artifact(&self, project: &str, repository: &str, digest: &str) -> Result<Artifact> {
        Error::require(repository, "Empty repo name for getting artifact")?;
        Error::require(digest, "Empty image digest for getting artifact")?;

        let url = format!(
            "{}?with_scan_overview=true",
            self.artifact_url(project, repository, digest)
        );
        let body = self.api.get(&url).await?;
        decode("Decode artifact", &body)
    }

    pub async fn list_artifacts(&self, project: &str, repository: &str) -> Result<Vec<Artifact>> {
        Error::require(repository, "Empty repository name for getting artifacts")?;

        let url = format!(
            "{}/api/v2.0/projects/{}/repositories/{}/artifacts?with_tag=true",
            self.root_url, project, repository
        );
        let body = self.api.get(&url).await?;
        decode("Decode artifacts", &body)
    }

    pub async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>> {
        Error::require(project, "Empty project name for getting repos")?;

        let url = format!(
            "{}/api/v2.0/projects/{}/repositories",
            self.root_url, project
        );
        let body = self.api.get(&url).await?;
        let repositories: Vec<Repository> = decode("Decode repositories", &body)?;
        debug!("Project {} has {} repositories", project, repositories.len());
        Ok(repositories)
    }
}

/// A scan that ended in `Error` or `Stopped` will never reach `Success`.
fn check_scan_failure(artifact: &Artifact) -> Result<()> {
    match artifact.native_report() {
        Some(summary)
            if summary.scan_status == SCAN_STATUS_ERROR
                || summary.scan_status == SCAN_STATUS_STOPPED =>
        {
            Err(Error::transport(
                format!("Scan of {}", artifact.digest),
                format!("scanner reported status {}", summary.scan_status),
            ))
        }
        _ => Ok(()),
    }
}
