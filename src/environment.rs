use crate::client::{ApiClient, ClientProvider};
use crate::config::{ConfigOverrides, HarborConfig};
use crate::docker::DockerCli;
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration snapshot of one Harbor instance together with the clients
/// built from it. Created once per scenario and passed to every workflow.
pub struct HarborEnvironment {
    config: HarborConfig,
    api_client: Arc<ApiClient>,
    transfer_tool: Arc<DockerCli>,
    pinned: ConfigOverrides,
    initialized: bool,
}

impl HarborEnvironment {
    /// Builds the environment from defaults overlaid with the given values.
    /// Callers treat an error here as fatal; no scenario can run without clients.
    pub fn new(hostname: &str, admin_password: &str, proxy: &str) -> Result<Self> {
        Self::with_config(HarborConfig::new(hostname, admin_password, proxy))
    }

    pub fn with_config(config: HarborConfig) -> Result<Self> {
        let (api_client, transfer_tool) = build_clients(&config)?;
        Ok(Self {
            config,
            api_client,
            transfer_tool,
            pinned: ConfigOverrides::default(),
            initialized: false,
        })
    }

    /// Rebuilds both clients from the current snapshot, whatever the state
    /// of the `initialized` flag.
    pub fn initialize(&mut self) -> Result<()> {
        let (api_client, transfer_tool) = build_clients(&self.config)?;
        self.api_client = api_client;
        self.transfer_tool = transfer_tool;
        Ok(())
    }

    /// Overrides that take precedence over the environment on every refresh,
    /// such as values given on the command line. They are merged into the
    /// snapshot right away and reach the clients on the next build.
    pub fn pin_overrides(&mut self, overrides: ConfigOverrides) {
        self.config.merge(&overrides);
        self.pinned = overrides;
    }

    /// Re-reads the process environment. See [`HarborEnvironment::refresh_with`].
    pub fn refresh(&mut self) -> Result<()> {
        let overrides = ConfigOverrides::from_env(&self.config.protocol);
        self.apply_refresh(&overrides)
    }

    /// Overlays the non-blank variables returned by `lookup` on the snapshot.
    /// Clients are built on the first refresh only; later refreshes change
    /// the snapshot but keep the clients, use [`HarborEnvironment::reconnect`]
    /// to rebuild them.
    pub fn refresh_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let overrides = ConfigOverrides::from_lookup(&self.config.protocol, lookup);
        self.apply_refresh(&overrides)
    }

    fn apply_refresh(&mut self, overrides: &ConfigOverrides) -> Result<()> {
        self.config.merge(overrides);
        self.config.merge(&self.pinned);
        debug!("Refreshed configuration for {}", self.root_url());

        if !self.initialized {
            self.initialize()?;
            self.initialized = true;
        }
        Ok(())
    }

    /// Refreshes the snapshot and rebuilds the clients from it.
    pub fn reconnect(&mut self) -> Result<()> {
        self.refresh()?;
        self.initialize()
    }

    pub fn root_url(&self) -> String {
        self.config.root_url()
    }

    pub fn config(&self) -> &HarborConfig {
        &self.config
    }

    pub fn api_client(&self) -> Arc<ApiClient> {
        self.api_client.clone()
    }

    pub fn transfer_tool(&self) -> Arc<DockerCli> {
        self.transfer_tool.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

fn build_clients(config: &HarborConfig) -> Result<(Arc<ApiClient>, Arc<DockerCli>)> {
    info!("Building clients for {}", config.root_url());
    let api_client = ClientProvider::api_client(config)?;
    Ok((Arc::new(api_client), Arc::new(ClientProvider::transfer_tool())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DEFAULT_PASSWORD, ENV_ADMIN_PASSWORD, ENV_CA_FILE, ENV_HOSTNAME, ENV_PROJECT, ENV_PROTOCOL,
    };

    fn no_vars(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_new_builds_clients_but_is_not_initialized() {
        let env = HarborEnvironment::new("harbor.local", "secret", "").unwrap();
        assert!(!env.is_initialized());
        assert_eq!(env.root_url(), "https://harbor.local");
    }

    #[test]
    fn test_refresh_is_idempotent_after_first_call() {
        let mut env = HarborEnvironment::new("harbor.local", "secret", "").unwrap();
        let before = env.api_client();

        let vars = |name: &str| match name {
            ENV_PROJECT => Some("e2e".to_string()),
            "HTTPS_PROXY" => Some("http://proxy.local:3128".to_string()),
            _ => None,
        };

        env.refresh_with(vars).unwrap();
        assert!(env.is_initialized());
        let snapshot = env.config().clone();
        let first = env.api_client();
        let first_tool = env.transfer_tool();
        assert!(!Arc::ptr_eq(&before, &first));
        assert_eq!(snapshot.project, "e2e");
        assert_eq!(snapshot.proxy, "http://proxy.local:3128");

        env.refresh_with(vars).unwrap();
        assert_eq!(env.config(), &snapshot);
        assert!(Arc::ptr_eq(&first, &env.api_client()));
        assert!(Arc::ptr_eq(&first_tool, &env.transfer_tool()));
    }

    #[test]
    fn test_pinned_overrides_win_over_file_and_environment() {
        let mut config = HarborConfig::new("", DEFAULT_PASSWORD, "");
        let file = ConfigOverrides::from_yaml("hostname: yaml.example\nproject: from-file\n", no_vars)
            .unwrap();
        config.merge(&file);

        let mut env = HarborEnvironment::with_config(config).unwrap();
        env.pin_overrides(ConfigOverrides {
            hostname: Some("cli.example".to_string()),
            proxy: Some("http://cli-proxy:3128".to_string()),
            ..ConfigOverrides::default()
        });

        let vars = |name: &str| match name {
            ENV_HOSTNAME => Some("env.example".to_string()),
            ENV_ADMIN_PASSWORD => Some("from-env".to_string()),
            "HTTPS_PROXY" => Some("http://env-proxy:3128".to_string()),
            _ => None,
        };
        env.refresh_with(vars).unwrap();

        let config = env.config();
        assert_eq!(config.hostname, "cli.example");
        assert_eq!(config.proxy, "http://cli-proxy:3128");
        // layers without a pinned value keep their usual order
        assert_eq!(config.project, "from-file");
        assert_eq!(config.admin_password.expose_secret(), "from-env");

        env.refresh_with(vars).unwrap();
        assert_eq!(env.config().hostname, "cli.example");
    }

    #[test]
    fn test_refresh_after_init_updates_snapshot_only() {
        let mut env = HarborEnvironment::new("harbor.local", "secret", "").unwrap();
        env.refresh_with(no_vars).unwrap();
        let client = env.api_client();

        env.refresh_with(|name| (name == ENV_HOSTNAME).then(|| "harbor.example".to_string()))
            .unwrap();
        assert_eq!(env.config().hostname, "harbor.example");
        assert!(Arc::ptr_eq(&client, &env.api_client()));
    }

    #[test]
    fn test_blank_variables_keep_values() {
        let mut env = HarborEnvironment::new("harbor.local", "secret", "").unwrap();
        env.refresh_with(|name| match name {
            ENV_HOSTNAME => Some("   ".to_string()),
            ENV_PROTOCOL => Some("http".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(env.root_url(), "http://harbor.local");
    }

    #[test]
    fn test_initialize_always_rebuilds() {
        let mut env = HarborEnvironment::new("harbor.local", "secret", "").unwrap();
        env.refresh_with(no_vars).unwrap();
        let client = env.api_client();

        env.initialize().unwrap();
        assert!(!Arc::ptr_eq(&client, &env.api_client()));
        assert!(env.is_initialized());
    }

    #[test]
    fn test_bad_explicit_ca_fails_construction() {
        let mut config = HarborConfig::new("harbor.local", "secret", "");
        config.ca_file = "/nonexistent/harbor-ca.pem".to_string();

        let err = HarborEnvironment::with_config(config).err().unwrap();
        assert!(matches!(err, crate::Error::Construction { .. }));
    }

    #[test]
    fn test_failed_first_refresh_can_be_retried() {
        let mut env = HarborEnvironment::new("harbor.local", "secret", "").unwrap();

        let result = env.refresh_with(|name| {
            (name == ENV_CA_FILE).then(|| "/nonexistent/harbor-ca.pem".to_string())
        });
        assert!(result.is_err());
        assert!(!env.is_initialized());

        env.initialize().unwrap_err();
        env.config.ca_file = String::new();
        env.refresh_with(no_vars).unwrap();
        assert!(env.is_initialized());
    }
}
