mod api;
mod app;
mod auth;
mod config;
mod error;
mod export;
mod form;
mod session;
mod staging;
mod upload;
mod utils;

use anyhow::{anyhow, Result};
use api::SeguimientoClient;
use app::SeguimientoApp;
use clap::Parser;
use config::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "seguimiento")]
#[command(version)]
#[command(about = "Desktop client for recording family follow-up visits")]
struct Args {
    /// Path to the config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server to talk to, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Where exported PDFs are written
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(dir) = args.export_dir {
        config.export_dir = Some(dir);
    }

    let client = SeguimientoClient::new(&config)?;

    // eframe owns the main thread; network work runs here
    let runtime = tokio::runtime::Runtime::new()?;
    let handle = runtime.handle().clone();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([900.0, 760.0])
            .with_min_inner_size([640.0, 520.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Seguimiento a familias",
        options,
        Box::new(move |cc| Box::new(SeguimientoApp::new(cc, config, client, handle))),
    )
    .map_err(|e| anyhow!("UI error: {}", e))?;

    drop(runtime);
    Ok(())
}
