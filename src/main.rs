// Hide console window in release builds (Windows GUI app)
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod config;
mod icon;
mod resolver;
mod scheduler;
mod state;
mod tray;
mod ui;

use anyhow::Result;
use eframe::egui;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::resolver::SystemResolver;
use crate::scheduler::RefreshScheduler;
use crate::state::SharedIpState;

const APP_TITLE: &str = "UCIPS: You See IPs";

/// How long a quit may wait for the window to close before the process exits
const QUIT_GRACE: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ucips=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting UCIPS");

    let config = Config::load().unwrap_or_else(|e| {
        tracing::error!("Failed to load configuration, using defaults: {}", e);
        Config::default()
    });

    // Lookups run here; the UI keeps the main thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("ucips-worker")
        .build()?;

    let state = SharedIpState::new();
    let resolver = SystemResolver::new(&config.lookup)?;
    let scheduler = RefreshScheduler::new(resolver, state.clone(), runtime.handle().clone());
    scheduler.start_periodic(config.refresh.interval());

    let quit_requested = Arc::new(Notify::new());
    runtime.spawn(app::exit_after_quit(quit_requested.clone(), QUIT_GRACE, || {
        std::process::exit(0);
    }));

    // Configure native options
    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([260.0, 170.0])
        .with_resizable(false)
        .with_visible(!config.window.start_hidden)
        .with_title(APP_TITLE)
        .with_icon(Arc::new(icon::for_window()));

    let viewport = if config.window.always_on_top {
        viewport.with_window_level(egui::WindowLevel::AlwaysOnTop)
    } else {
        viewport
    };

    let native_options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    // Run the application
    let result = {
        let scheduler = scheduler.clone();
        let window_config = config.window.clone();
        eframe::run_native(
            "UCIPS",
            native_options,
            Box::new(move |cc| {
                Ok(Box::new(app::UcipsApp::new(
                    cc,
                    state,
                    scheduler,
                    &window_config,
                    quit_requested,
                )))
            }),
        )
    };

    // Don't wait for an in-flight lookup; its publish has nobody left to see it
    scheduler.shutdown();
    runtime.shutdown_background();
    tracing::info!("UCIPS stopped");

    result.map_err(|e| anyhow::anyhow!("Failed to run application: {}", e))
}
