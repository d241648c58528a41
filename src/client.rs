use crate::config::{DEFAULT_CA_FILE, HarborConfig, is_not_blank};
use crate::docker::DockerCli;
use crate::error::{Error, HttpStatusError, Result};
use crate::secret_string::SecretString;
use bytes::Bytes;
use reqwest::header::ACCEPT;
use reqwest::{Certificate, Client, Identity, Method, Proxy};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, warn};

/// The narrow request interface the workflows depend on. Every call takes an
/// absolute URL and yields the raw response body.
pub trait RegistryApi: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes>> + Send;
    fn post(&self, url: &str, body: Option<&Value>) -> impl Future<Output = Result<Bytes>> + Send;
    fn put(&self, url: &str, body: Option<&Value>) -> impl Future<Output = Result<Bytes>> + Send;
    fn delete(&self, url: &str) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Subset of the configuration the API client is bound to.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub username: String,
    pub password: SecretString,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
    pub proxy: String,
}

impl From<&HarborConfig> for ApiClientConfig {
    fn from(config: &HarborConfig) -> Self {
        Self {
            username: config.admin.clone(),
            password: config.admin_password.clone(),
            ca_file: config.ca_file.clone(),
            cert_file: config.cert_file.clone(),
            key_file: config.key_file.clone(),
            proxy: config.proxy.clone(),
        }
    }
}

/// Harbor API client authenticated with basic auth.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    username: String,
    password: SecretString,
}

impl ApiClient {
    pub fn new(config: &ApiClientConfig) -> Result<Self> {
        info!("Initializing Harbor API HTTP client for user {}", config.username);
        // System certificates are loaded automatically with rustls-tls-native-roots
        let mut client_builder = Client::builder();

        if let Some(cert) = load_ca_certificate(&config.ca_file)? {
            client_builder = client_builder.add_root_certificate(cert);
        }

        if is_not_blank(&config.cert_file) || is_not_blank(&config.key_file) {
            let identity = load_identity(&config.cert_file, &config.key_file)?;
            client_builder = client_builder.identity(identity);
        }

        if is_not_blank(&config.proxy) {
            debug!("Routing API requests through proxy {}", config.proxy);
            let proxy = Proxy::all(&config.proxy)
                .map_err(|e| Error::construction(format!("Invalid proxy {}", config.proxy), e))?;
            client_builder = client_builder.proxy(proxy);
        } else {
            // proxy settings come from the configuration only
            client_builder = client_builder.no_proxy();
        }

        let http = client_builder
            .build()
            .map_err(|e| Error::construction("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Bytes> {
        let step = format!("{} {}", method, url);
        debug!("Sending request {}", step);

        let mut request = self
            .http
            .request(method.clone(), url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(step.clone(), e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::transport(step.clone(), e))?;

        if !status.is_success() {
            return Err(Error::transport(
                step,
                HttpStatusError {
                    method: method.to_string(),
                    url: url.to_string(),
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                },
            ));
        }
        Ok(bytes)
    }
}

impl RegistryApi for ApiClient {
    async fn get(&self, url: &str) -> Result<Bytes> {
        self.send(Method::GET, url, None).await
    }

    async fn post(&self, url: &str, body: Option<&Value>) -> Result<Bytes> {
        self.send(Method::POST, url, body).await
    }

    async fn put(&self, url: &str, body: Option<&Value>) -> Result<Bytes> {
        self.send(Method::PUT, url, body).await
    }

    async fn delete(&self, url: &str) -> Result<Bytes> {
        self.send(Method::DELETE, url, None).await
    }
}

/// Parses a JSON response body, reporting failures as a transport error of `step`.
pub(crate) fn decode<T: DeserializeOwned>(step: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::transport(step, e))
}

/// Builds the clients an environment hands out to the workflows. Nothing in
/// here touches the network; connection problems surface on first use.
pub struct ClientProvider;

impl ClientProvider {
    pub fn api_client(config: &HarborConfig) -> Result<ApiClient> {
        ApiClient::new(&ApiClientConfig::from(config))
    }

    pub fn transfer_tool() -> DockerCli {
        DockerCli::default()
    }
}

/// The default CA path is only a guess, so its absence is not an error.
/// Any explicitly configured path has to be readable.
fn load_ca_certificate(ca_file: &str) -> Result<Option<Certificate>> {
    if !is_not_blank(ca_file) {
        return Ok(None);
    }
    if ca_file == DEFAULT_CA_FILE && !Path::new(ca_file).exists() {
        warn!(
            "CA file {} not found, relying on system certificates",
            ca_file
        );
        return Ok(None);
    }

    let file_content = fs::read(ca_file)
        .map_err(|e| Error::construction(format!("Failed to read CA file {}", ca_file), e))?;
    let cert = Certificate::from_pem(&file_content)
        .map_err(|e| Error::construction(format!("Failed to parse CA certificate {}", ca_file), e))?;
    Ok(Some(cert))
}

fn load_identity(cert_file: &str, key_file: &str) -> Result<Identity> {
    if !is_not_blank(cert_file) || !is_not_blank(key_file) {
        return Err(Error::construction(
            "Client TLS identity",
            "both a certificate and a key file are required",
        ));
    }

    let mut pem = fs::read(cert_file).map_err(|e| {
        Error::construction(format!("Failed to read certificate file {}", cert_file), e)
    })?;
    let key = fs::read(key_file)
        .map_err(|e| Error::construction(format!("Failed to read key file {}", key_file), e))?;
    pem.push(b'\n');
    pem.extend_from_slice(&key);

    Identity::from_pem(&pem)
        .map_err(|e| Error::construction("Failed to parse client certificate and key", e))
}
