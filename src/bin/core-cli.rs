use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "core-cli")]
#[command(about = "Management CLI for the resilience core", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "CORE_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overall health: breakers, caches, dedup, persistence
    Status,
    /// List circuit breaker states
    Breakers,
    /// Force a circuit breaker CLOSED
    Reset {
        /// Dependency name
        name: String,
    },
    /// Show cache statistics
    Caches,
    /// Drop every entry in a cache namespace
    Clear {
        /// Cache namespace
        namespace: String,
    },
    /// Show background write counters
    Persistence,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match &cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Breakers => client.get(format!("{base}/admin/breakers")),
        Commands::Reset { name } => client.post(format!("{base}/admin/breakers/{name}/reset")),
        Commands::Caches => client.get(format!("{base}/admin/caches")),
        Commands::Clear { namespace } => {
            client.post(format!("{base}/admin/caches/{namespace}/clear"))
        }
        Commands::Persistence => client.get(format!("{base}/admin/persistence")),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            if !text.is_empty() {
                eprintln!("Response: {}", text);
            }
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
