use crate::client::{RegistryApi, decode};
use crate::error::{Error, Result};
use crate::models::SystemInfo;
use std::sync::Arc;
use tracing::info;

pub struct SystemService<A> {
    root_url: String,
    api: Arc<A>,
}

impl<A: RegistryApi> SystemService<A> {
    pub fn new(root_url: &str, api: Arc<A>) -> Result<Self> {
        Error::require(root_url, "Empty root URL for system info")?;
        Ok(Self {
            root_url: root_url.to_string(),
            api,
        })
    }

    pub async fn system_info(&self) -> Result<SystemInfo> {
        let url = format!("{}/api/v2.0/systeminfo", self.root_url);
        let info: SystemInfo = decode("Decode system info", &self.api.get(&url).await?)?;
        info!(
            "Connected to Harbor {} at {}",
            info.harbor_version, self.root_url
        );
        Ok(info)
    }
}
