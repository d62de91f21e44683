use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "tutor")]
#[command(about = "Tutor Messenger relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook gateway (GET/POST /webhook plus a health probe on /).
    Serve {
        /// Config file path (default: TUTOR_CONFIG_PATH or ~/.tutor/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Solve one problem locally and print the reply as it would be chunked for delivery.
    Solve {
        /// Config file path (default: TUTOR_CONFIG_PATH or ~/.tutor/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Image of the problem (png, jpeg, gif, webp)
        #[arg(long, value_name = "PATH", conflicts_with = "text")]
        image: Option<PathBuf>,

        /// Problem text
        #[arg(required_unless_present = "image")]
        text: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("tutor {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Solve {
            config,
            image,
            text,
        }) => {
            if let Err(e) = run_solve(config, text, image).await {
                log::error!("solve failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config, path).await
}

async fn run_solve(
    config_path: Option<PathBuf>,
    text: Option<String>,
    image: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let request = match (image, text) {
        (Some(path), _) => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| anyhow::anyhow!("reading {}: {}", path.display(), e))?;
            lib::solve::SolveRequest::Image {
                bytes,
                mime: mime_for_path(&path).to_string(),
            }
        }
        (None, Some(text)) if !text.trim().is_empty() => {
            lib::solve::SolveRequest::Text(text.trim().to_string())
        }
        _ => anyhow::bail!("nothing to solve: pass problem text or --image PATH"),
    };

    let solver = lib::solve::Solver::from_config(&config);
    let answer = solver.solve(&request).await;
    let chunks = lib::delivery::chunk_text(&answer, config.messenger.chunk_limit);
    println!("{}", chunks.join("\n\n"));
    Ok(())
}

fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
