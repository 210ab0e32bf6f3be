//! Scribe Launch - process entry point for the Scribe editor.
//!
//! The first launch becomes the primary instance and keeps running. Later
//! launches pass their files to it and exit immediately.

mod handler;
mod splash;

use anyhow::Result;
use clap::Parser;
use handler::{LoggingEvents, LoggingHandler};
use scribe_core::{
    AppContext, LaunchFlags, SplashScreen, StartupConfig, StartupOrchestrator, StartupOutcome,
};
use splash::ConsoleSplash;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "scribe-launch")]
#[command(about = "Start Scribe, or hand files to the running instance")]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Open a new window even if Scribe is already running
    #[arg(long)]
    new_window: bool,

    /// Configuration file (defaults to the per-user scribe.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Files to open and editor options such as -nosplash
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

impl Args {
    /// Editor arguments as text. Undecodable bytes are replaced, never rejected.
    fn editor_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(scribe_core::platform::config_file);
    let config = StartupConfig::load(&config_path);
    let context = AppContext::from_env(config)?.with_force_new_window(args.new_window);
    let shutdown = context.shutdown.clone();

    let editor_args = args.editor_args();
    let flags = LaunchFlags::from_request(&context.normalize(&editor_args));
    let mut splash = (!context.config.disable_splash_screen && !flags.no_splash)
        .then(ConsoleSplash::show);

    let orchestrator = StartupOrchestrator::new(context, Arc::new(LoggingHandler))
        .with_module_events(Arc::new(LoggingEvents));

    let outcome = orchestrator
        .run(
            &editor_args,
            splash.as_mut().map(|s| s as &mut dyn SplashScreen),
        )
        .await;

    let session = match outcome {
        StartupOutcome::Handoff { delivered } => {
            debug!("Exiting as secondary instance (delivered: {})", delivered);
            return Ok(());
        }
        StartupOutcome::Primary(session) => session,
    };

    if let Some(mut splash) = splash {
        splash.close();
    }

    for file in session.initial_request().files() {
        info!("Open {}", file);
    }

    let modules = session.modules().clone();
    tokio::spawn(async move {
        let registry = modules.wait().await;
        info!("{} add-in(s) ready", registry.modules().len());
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    shutdown.cancel();
    session.shutdown().await;

    Ok(())
}
