use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use jobwire::config::loader::load_config;
use jobwire::observability::logging::init_logging;
use jobwire::security::ssrf;
use jobwire::{Client, ClientConfig, FetchOptions, RequestOptions};

#[derive(Parser)]
#[command(name = "jobwire-cli")]
#[command(about = "Debugging CLI for the jobwire outbound request layer", long_about = None)]
struct Cli {
    /// Path to a TOML config manifest.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a URL through the full pipeline and print the decoded text
    Fetch {
        url: String,

        /// Provider key for throttling and breaker state
        #[arg(short, long, default_value = "cli")]
        provider: String,

        /// Per-attempt deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Response body cap in bytes
        #[arg(long)]
        max_bytes: Option<usize>,
    },
    /// Print the raw status and headers for a URL
    Head {
        url: String,

        #[arg(short, long, default_value = "cli")]
        provider: String,
    },
    /// Run the SSRF guard against a hostname and print the verdict
    CheckHost {
        host: String,

        /// Port used for DNS resolution
        #[arg(long, default_value_t = 443)]
        port: u16,
    },
    /// Validate a config manifest
    Validate {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    init_logging(&format!("jobwire={}", config.observability.log_level));

    match cli.command {
        Commands::Fetch {
            url,
            provider,
            timeout_ms,
            max_bytes,
        } => {
            let client = Client::from_config(provider, &config).build();
            let mut options = FetchOptions {
                timeout: Some(Duration::from_millis(
                    timeout_ms.unwrap_or(config.fetch.timeout_ms),
                )),
                ..FetchOptions::default()
            };
            if let Some(cap) = max_bytes {
                options.max_bytes = cap;
            } else {
                options.max_bytes = config.fetch.max_bytes;
            }
            let text = client.fetch_text(&url, options).await?;
            println!("{}", text);
        }
        Commands::Head { url, provider } => {
            let client = Client::from_config(provider, &config).build();
            let response = client.request(&url, RequestOptions::default()).await?;
            println!("status: {}", response.status);
            for (name, value) in &response.headers {
                println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
        }
        Commands::CheckHost { host, port } => {
            if ssrf::is_forbidden_host(&host) {
                println!("{host}: FORBIDDEN (hostname screen)");
                return Ok(());
            }
            match ssrf::ensure_resolved_public(&host, port).await {
                Ok(()) => println!("{host}: ok"),
                Err(err) => println!("{host}: FORBIDDEN ({err})"),
            }
        }
        Commands::Validate { path } => {
            let config = load_config(&path)?;
            println!(
                "ok: {} provider(s), retry x{}, breaker threshold {}",
                config.providers.len(),
                config.retry.retries,
                config.circuit_breaker.threshold
            );
        }
    }

    Ok(())
}
