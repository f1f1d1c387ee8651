use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use tourguide::api::AppState;
use tourguide::config::{LocationProviderKind, TourGuideConfig};
use tourguide::location::{
    AlwaysAllow, FixedLocation, IpLocation, LocationAcquirer, NoLocation, PermissionGate,
    TerminalPrompt,
};
use tourguide::{
    ChatCompletionClient, CommandSpeaker, Coordinate, Session, SessionLimits, SessionState,
    Speaker, TourGuideError, telemetry, web,
};

/// TourGuide - historical tours of wherever you are
#[derive(Debug, Parser)]
#[command(name = "tourguide", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "TOURGUIDE_CONFIG")]
    config: Option<PathBuf>,

    /// Show debug output from tourguide itself
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Locate this device and narrate a historical tour of the area
    Tour {
        /// Use these coordinates instead of looking up the device location
        #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
        at: Option<Coordinate>,

        /// Read the tour aloud
        #[arg(long)]
        speak: bool,

        /// Do not ask before looking up the device location
        #[arg(short, long)]
        yes: bool,
    },
    /// Serve the tour API for browser clients
    Serve {
        /// Port to listen on, overriding server.port
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start the async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(async {
        match run(cli).await {
            Ok(code) => code,
            Err(e) => {
                match e.downcast_ref::<TourGuideError>() {
                    Some(err) => eprintln!("{}", err.user_message()),
                    None => eprintln!("Error: {e:#}"),
                }
                debug!("{e:?}");
                ExitCode::FAILURE
            }
        }
    });

    // A permission prompt abandoned by the location timeout is still
    // blocked on stdin; waiting for it would keep the process alive.
    runtime.shutdown_background();
    code
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = TourGuideConfig::load_from_path(cli.config.clone())?;
    telemetry::init(&config.logging, cli.verbose)?;

    if cli.verbose {
        match &cli.config {
            Some(path) => info!("Using config from: {}", path.display()),
            None => info!(
                "Using config from: {}",
                TourGuideConfig::get_config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "defaults".to_string())
            ),
        }
    }

    match cli.command {
        Command::Tour { at, speak, yes } => tour(&config, at, speak, yes).await,
        Command::Serve { port } => serve(config, port).await,
    }
}

async fn tour(
    config: &TourGuideConfig,
    at: Option<Coordinate>,
    speak: bool,
    yes: bool,
) -> Result<ExitCode> {
    let client = ChatCompletionClient::from_config(&config.llm)?;
    let acquirer = build_acquirer(config, at, yes)?;
    let limits = SessionLimits::from(config);

    let mut session = Session::new();
    let state = session.run(acquirer.as_ref(), &client, &limits).await;

    let SessionState::TourReady { coordinate, tour } = state else {
        eprintln!("{}", state.user_message());
        return Ok(ExitCode::FAILURE);
    };

    println!("Historical tour of {}\n", coordinate.format_coordinates());
    println!("{}", tour.text);

    if speak || config.speech.enabled {
        let speaker = CommandSpeaker::from_config(&config.speech);
        speaker.speak(&tour.text)?;
        speaker.wait().await;
    }

    Ok(ExitCode::SUCCESS)
}

fn build_acquirer(
    config: &TourGuideConfig,
    at: Option<Coordinate>,
    yes: bool,
) -> Result<Box<dyn LocationAcquirer>> {
    if let Some(coordinate) = at {
        return Ok(Box::new(FixedLocation::new(coordinate)));
    }

    let acquirer: Box<dyn LocationAcquirer> = match config.location.provider {
        LocationProviderKind::Fixed => {
            let coordinate = config.location.fixed.ok_or_else(|| {
                TourGuideError::config("Location provider 'fixed' requires location.fixed")
            })?;
            Box::new(FixedLocation::new(coordinate))
        }
        LocationProviderKind::None => Box::new(NoLocation),
        LocationProviderKind::Ip => {
            let ip = IpLocation::new(&config.location.ip_lookup_url, config.location.timeout())?;
            if yes {
                Box::new(PermissionGate::new(ip, AlwaysAllow))
            } else {
                Box::new(PermissionGate::new(ip, TerminalPrompt))
            }
        }
    };
    Ok(acquirer)
}

async fn serve(config: TourGuideConfig, port: Option<u16>) -> Result<ExitCode> {
    let client = ChatCompletionClient::from_config(&config.llm)?;
    let state = AppState::new(Arc::new(client), SessionLimits::from(&config));

    let mut server = config.server;
    if let Some(port) = port {
        server.port = port;
    }

    web::run(&server, state).await?;
    Ok(ExitCode::SUCCESS)
}
