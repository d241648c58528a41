use crate::image_reference::ImageReference;
use crate::secret_string::SecretString;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::{env, fs, path::Path};
use tracing::{debug, info};

pub const ENV_HOSTNAME: &str = "TESTING_ENV_HOSTNAME";
pub const ENV_ACCOUNT: &str = "TESTING_ENV_ACCOUNT";
pub const ENV_PASSWORD: &str = "TESTING_ENV_PASSWORD";
pub const ENV_ADMIN: &str = "TESTING_ENV_ADMIN";
pub const ENV_ADMIN_PASSWORD: &str = "TESTING_ENV_ADMIN_PASS";
pub const ENV_PROJECT: &str = "TESTING_PROJECT_NAME";
pub const ENV_IMAGE_NAME: &str = "TESTING_IMAGE_NAME";
pub const ENV_IMAGE_TAG: &str = "TESTING_IMAGE_TAG";
pub const ENV_PROTOCOL: &str = "HTTP_PROTOCOL";
pub const ENV_CA_FILE: &str = "CA_FILE_PATH";
pub const ENV_CERT_FILE: &str = "CERT_FILE_PATH";
pub const ENV_KEY_FILE: &str = "KEY_FILE_PATH";

pub const DEFAULT_PROTOCOL: &str = "https";
pub const DEFAULT_ADMIN: &str = "admin";
pub const DEFAULT_ACCOUNT: &str = "user001";
pub const DEFAULT_PASSWORD: &str = "Harbor12345";
pub const DEFAULT_PROJECT: &str = "smoketest";
pub const DEFAULT_IMAGE_NAME: &str = "nginx";
pub const DEFAULT_IMAGE_TAG: &str = "latest";
pub const DEFAULT_IMAGE_DIGEST: &str =
    "sha256:2f1cd90e00fe2c991e18272bb35d6a8258eeb27785d121aa4cc1ae4235167cfd";
pub const DEFAULT_SOURCE_REGISTRY_PATH: &str = "registry.goharbor.io/harbor-ci/";
pub const DEFAULT_CA_FILE: &str = "ca.crt";

/// Everything a scenario needs to know about the registry under test.
/// Empty strings stand for "not configured".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarborConfig {
    pub protocol: String,
    pub hostname: String,
    pub account: String,
    pub password: SecretString,
    pub admin: String,
    pub admin_password: SecretString,
    pub project: String,
    pub source_registry_path: String,
    pub image_name: String,
    pub image_tag: String,
    pub image_digest: String,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
    pub proxy: String,
}

/// Optional replacement values for a [`HarborConfig`]. Blank values are
/// ignored by [`HarborConfig::merge`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOverrides {
    pub protocol: Option<String>,
    pub hostname: Option<String>,
    pub account: Option<String>,
    pub password: Option<String>,
    pub admin: Option<String>,
    pub admin_password: Option<String>,
    pub project: Option<String>,
    pub image_name: Option<String>,
    pub image_tag: Option<String>,
    pub ca_file: Option<String>,
    pub cert_file: Option<String>,
    pub key_file: Option<String>,
    pub proxy: Option<String>,
}

impl HarborConfig {
    pub fn new(hostname: &str, admin_password: &str, proxy: &str) -> Self {
        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            hostname: hostname.to_string(),
            account: DEFAULT_ACCOUNT.to_string(),
            password: SecretString::new(DEFAULT_PASSWORD),
            admin: DEFAULT_ADMIN.to_string(),
            admin_password: SecretString::new(admin_password),
            project: DEFAULT_PROJECT.to_string(),
            source_registry_path: DEFAULT_SOURCE_REGISTRY_PATH.to_string(),
            image_name: DEFAULT_IMAGE_NAME.to_string(),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            image_digest: DEFAULT_IMAGE_DIGEST.to_string(),
            ca_file: DEFAULT_CA_FILE.to_string(),
            cert_file: String::new(),
            key_file: String::new(),
            proxy: proxy.to_string(),
        }
    }

    /// Overwrites every field whose override is present and not blank.
    pub fn merge(&mut self, overrides: &ConfigOverrides) {
        apply(&mut self.protocol, &overrides.protocol);
        apply(&mut self.hostname, &overrides.hostname);
        apply(&mut self.account, &overrides.account);
        apply_secret(&mut self.password, &overrides.password);
        apply(&mut self.admin, &overrides.admin);
        apply_secret(&mut self.admin_password, &overrides.admin_password);
        apply(&mut self.project, &overrides.project);
        apply(&mut self.image_name, &overrides.image_name);
        apply(&mut self.image_tag, &overrides.image_tag);
        apply(&mut self.ca_file, &overrides.ca_file);
        apply(&mut self.cert_file, &overrides.cert_file);
        apply(&mut self.key_file, &overrides.key_file);
        apply(&mut self.proxy, &overrides.proxy);
    }

    /// The root URL like `https://<hostname>`
    pub fn root_url(&self) -> String {
        format!("{}://{}", self.protocol, self.hostname)
    }

    /// Image pulled from the upstream registry before being pushed to Harbor
    pub fn source_image(&self) -> ImageReference {
        ImageReference::from_registry_path(
            &self.source_registry_path,
            &self.image_name,
            &self.image_tag,
        )
    }

    /// Image as it is stored in the testing project
    pub fn target_image(&self) -> ImageReference {
        ImageReference::in_project(
            &self.hostname,
            &self.project,
            &self.image_name,
            &self.image_tag,
        )
    }
}

impl ConfigOverrides {
    pub fn from_env(current_protocol: &str) -> Self {
        Self::from_lookup(current_protocol, |name| env::var(name).ok())
    }

    /// Reads overrides through `lookup`. The proxy variable depends on the
    /// protocol that is in effect once this set of overrides is applied:
    /// `http_proxy` for plain `http`, `https_proxy` otherwise, each falling
    /// back to its upper-case spelling.
    pub fn from_lookup<F>(current_protocol: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let protocol = lookup(ENV_PROTOCOL);
        let effective_protocol = protocol
            .as_deref()
            .filter(|p| is_not_blank(p))
            .unwrap_or(current_protocol);

        let proxy_var = if effective_protocol == "http" {
            "http_proxy"
        } else {
            "https_proxy"
        };
        let proxy = lookup(proxy_var)
            .filter(|p| is_not_blank(p))
            .or_else(|| lookup(&proxy_var.to_uppercase()));
        debug!("Resolved proxy variable {} for protocol {}", proxy_var, effective_protocol);

        Self {
            protocol,
            hostname: lookup(ENV_HOSTNAME),
            account: lookup(ENV_ACCOUNT),
            password: lookup(ENV_PASSWORD),
            admin: lookup(ENV_ADMIN),
            admin_password: lookup(ENV_ADMIN_PASSWORD),
            project: lookup(ENV_PROJECT),
            image_name: lookup(ENV_IMAGE_NAME),
            image_tag: lookup(ENV_IMAGE_TAG),
            ca_file: lookup(ENV_CA_FILE),
            cert_file: lookup(ENV_CERT_FILE),
            key_file: lookup(ENV_KEY_FILE),
            proxy,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Loading config from file {}", path.as_ref().display());
        let yaml_str = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_yaml(&yaml_str, |name| env::var(name).ok())
    }

    pub fn from_yaml<F>(yaml_str: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(yaml_str, lookup)?;

        serde_yaml_ng::from_str(&expanded)
            .context("Failed to parse YAML config after environment variable expansion")
    }
}

pub fn is_not_blank(s: &str) -> bool {
    !s.trim().is_empty()
}

fn apply(target: &mut String, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| is_not_blank(v)) {
        *target = value.to_string();
    }
}

fn apply_secret(target: &mut SecretString, value: &Option<String>) {
    if let Some(value) = value.as_deref().filter(|v| is_not_blank(v)) {
        *target = SecretString::new(value);
    }
}

/// Replaces `${VAR}` placeholders with the values returned by `lookup`.
/// Returns an error naming the first variable that is not set.
fn expand_env_vars<F>(input: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let re =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        lookup(var_name).unwrap_or_else(|| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    if let Some(var_name) = missing {
        anyhow::bail!("Missing environment variable: {}", var_name);
    }

    Ok(result.into_owned())
}
