use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use harbor_smoketest::config::{ConfigOverrides, DEFAULT_PASSWORD, HarborConfig, is_not_blank};
use harbor_smoketest::environment::HarborEnvironment;
use harbor_smoketest::image::ImageService;
use harbor_smoketest::scenario::Scenario;
use harbor_smoketest::system::SystemService;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// YAML file with configuration overrides
    #[arg(long, env = "HARBOR_SMOKETEST_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides every other configuration source
    #[arg(long)]
    hostname: Option<String>,

    #[arg(long)]
    admin_password: Option<String>,

    #[arg(long)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the access control scenario end to end
    Run,
    /// Print the version of the target registry
    SystemInfo,
    /// Scan one artifact and wait for the report
    Scan {
        #[arg(long)]
        repository: Option<String>,
        #[arg(long)]
        digest: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    info!("Starting harbor-smoketest {}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    // defaults, then the file, then the environment, then the flags
    let mut config = HarborConfig::new("", DEFAULT_PASSWORD, "");
    if let Some(path) = &cli.config {
        config.merge(&ConfigOverrides::from_file(path)?);
    }

    let mut env = HarborEnvironment::with_config(config)
        .context("Failed to initialize the Harbor environment")?;
    env.pin_overrides(ConfigOverrides {
        hostname: cli.hostname.clone(),
        admin_password: cli.admin_password.clone(),
        proxy: cli.proxy.clone(),
        ..ConfigOverrides::default()
    });
    env.refresh().context("Failed to refresh the Harbor environment")?;

    let config = env.config();
    if !is_not_blank(&config.hostname) {
        bail!("No Harbor hostname configured, pass --hostname or set TESTING_ENV_HOSTNAME");
    }
    let root_url = env.root_url();
    info!("Using Harbor at {}", root_url);

    match cli.command {
        Command::Run => {
            let tool = env.transfer_tool();
            Scenario::new(config, env.api_client(), tool.as_ref())?
                .run_access_control()
                .await?;
        }
        Command::SystemInfo => {
            let info = SystemService::new(&root_url, env.api_client())?
                .system_info()
                .await?;
            println!("{}", info.harbor_version);
        }
        Command::Scan { repository, digest } => {
            let repository = repository.unwrap_or_else(|| config.image_name.clone());
            let digest = digest.unwrap_or_else(|| config.image_digest.clone());
            ImageService::new(&root_url, env.api_client())?
                .scan_artifact(&config.project, &repository, &digest)
                .await?;
            info!("Scan of {}@{} succeeded", repository, digest);
        }
    }

    Ok(())
}
