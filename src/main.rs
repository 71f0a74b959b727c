// src/main.rs

use std::{io::Read, net::SocketAddr, sync::Arc};

use clap::{Parser, Subcommand};
use htmlguard::{config::Config, routes, sanitizer::Preset, state::AppState};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "htmlguard")]
#[command(about = "Allow-list HTML sanitizer")]
#[command(version)]
struct Cli {
    /// Markup to sanitize. Read from stdin when omitted.
    input: Option<String>,

    /// Built-in policy: ugc, strict or strip-all. HTMLGUARD_POLICY_FILE takes precedence.
    #[arg(short, long, default_value = "ugc")]
    policy: Preset,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP sanitize service
    Serve {
        /// Bind address (overrides HTMLGUARD_BIND)
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Built-in policy: ugc, strict or strip-all
        #[arg(short, long)]
        policy: Option<Preset>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from environment (and .env, if present)
    let mut config = Config::from_env()?;

    match cli.command {
        Some(Command::Serve { bind, policy }) => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            let _guard = init_tracing(&config, false);
            serve(config, policy.unwrap_or(cli.policy)).await
        }
        None => {
            // Logs go to stderr so stdout carries only the sanitized markup.
            let _guard = init_tracing(&config, true);
            let input = match cli.input {
                Some(input) => input,
                None => {
                    let mut raw = Vec::new();
                    std::io::stdin().read_to_end(&mut raw)?;
                    String::from_utf8_lossy(&raw).into_owned()
                }
            };

            let policy = config.load_policy(cli.policy)?;
            println!("{}", policy.clean(&input));
            Ok(())
        }
    }
}

/// Initialize Tracing (Logging): console layer plus an optional daily-rolling
/// file layer. The returned guard must live until exit to flush the file.
fn init_tracing(config: &Config, to_stderr: bool) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::new(&config.rust_log);

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "htmlguard.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if to_stderr {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stdout).with_target(false))
            .init();
    }

    guard
}

async fn serve(config: Config, preset: Preset) -> Result<(), Box<dyn std::error::Error>> {
    let policy = config.load_policy(preset)?;
    tracing::info!("Policy loaded (max nesting depth {})", policy.max_depth());

    // Create AppState
    let state = AppState {
        policy: Arc::new(policy),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}
