use crate::client::RegistryApi;
use crate::config::HarborConfig;
use crate::docker::TransferTool;
use crate::image::ImageService;
use crate::project::{ProjectService, Role};
use crate::system::SystemService;
use crate::transfer::{pull_image, push_image};
use crate::user::UserService;
use anyhow::{Context, bail};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Collaborators of one scenario run, all bound to the same registry.
pub struct Scenario<'a, A, T> {
    config: &'a HarborConfig,
    tool: &'a T,
    system: SystemService<A>,
    projects: ProjectService<A>,
    users: UserService<A>,
    images: ImageService<A>,
}

impl<'a, A, T> Scenario<'a, A, T>
where
    A: RegistryApi + 'static,
    T: TransferTool,
{
    pub fn new(config: &'a HarborConfig, api: Arc<A>, tool: &'a T) -> anyhow::Result<Self> {
        let root_url = config.root_url();
        Ok(Self {
            config,
            tool,
            system: SystemService::new(&root_url, api.clone())?,
            projects: ProjectService::new(&root_url, api.clone())?,
            users: UserService::new(&root_url, api.clone())?,
            images: ImageService::new(&root_url, api)?,
        })
    }

    pub fn with_scan_timing(mut self, interval: Duration, timeout: Duration) -> Self {
        self.images = self.images.with_scan_timing(interval, timeout);
        self
    }

    /// Checks that revoking a project role denies further pulls.
    ///
    /// The registry is cleaned up whether or not the checks pass. The first
    /// failure is returned; failures during cleanup are only logged after it.
    pub async fn run_access_control(&self) -> anyhow::Result<()> {
        let outcome = self.exercise_access_control().await;
        if let Err(e) = &outcome {
            warn!("Access control scenario failed, cleaning up: {:#}", e);
        }

        let config = self.config;
        let mut first_error = outcome.err();
        keep_first(
            &mut first_error,
            by(
                "deleting the repository",
                self.images
                    .delete_repository(&config.project, &config.image_name),
            )
            .await,
        );
        keep_first(
            &mut first_error,
            by("deleting the user", self.users.delete_user(&config.account)).await,
        );
        keep_first(
            &mut first_error,
            by("deleting the project", self.projects.delete_project(&config.project)).await,
        );

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Access control scenario passed");
                Ok(())
            }
        }
    }

    async fn exercise_access_control(&self) -> anyhow::Result<()> {
        let config = self.config;

        let info = self.system.system_info().await?;
        info!("Running access control scenario against Harbor {}", info.harbor_version);

        by(
            "creating the project",
            self.projects.create_project(&config.project, false),
        )
        .await?;
        by(
            "creating the user",
            self.users.create_user(&config.account, &config.password),
        )
        .await?;
        by(
            "assigning the developer role",
            self.projects
                .assign_role(&config.project, &config.account, Role::Developer),
        )
        .await?;
        by("pushing the image", push_image(config, self.tool)).await?;
        by(
            "scanning the image",
            self.images
                .scan_artifact(&config.project, &config.image_name, &config.image_digest),
        )
        .await?;
        by("pulling the image", pull_image(config, self.tool)).await?;
        by(
            "revoking the role",
            self.projects.revoke_role(&config.project, &config.account),
        )
        .await?;

        info!("By pulling the image without a role");
        if pull_image(config, self.tool).await.is_ok() {
            bail!(
                "{} could still pull from project {} after its role was revoked",
                config.account,
                config.project
            );
        }
        info!("Pull was denied as expected");
        Ok(())
    }
}

async fn by<F>(step: &str, action: F) -> anyhow::Result<()>
where
    F: Future<Output = crate::Result<()>>,
{
    info!("By {}", step);
    action.await.with_context(|| format!("Failed {}", step))
}

fn keep_first(first: &mut Option<anyhow::Error>, result: anyhow::Result<()>) {
    if let Err(e) = result {
        if first.is_some() {
            warn!("Cleanup failed as well: {:#}", e);
        } else {
            *first = Some(e);
        }
    }
}
