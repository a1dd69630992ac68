#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod console;
mod interaction;
mod render;
mod stream;
mod telemetry;
mod types;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::unbounded;
use gpui::Application;

use config::ConsoleConfig;
use console::ConsoleSession;
use telemetry::{Dispatcher, FrameBuffers, TelemetryStore, start_telemetry};

fn main() -> Result<()> {
    env_logger::init();
    let config = ConsoleConfig::parse();
    log::info!(
        "vision console: api {} telemetry {} camera {}",
        config.api_url,
        config.ws_url,
        config.camera
    );

    let store = Arc::new(TelemetryStore::new());
    let buffers = FrameBuffers::shared();
    let (notify_tx, notify_rx) = unbounded();

    let dispatcher = Dispatcher::new(store.clone(), buffers.clone(), notify_tx);
    let telemetry = start_telemetry(config.ws_url.clone(), dispatcher, store.clone())?;

    let session = ConsoleSession::new(
        &config,
        store,
        buffers,
        notify_rx,
        Box::new(telemetry.sender()),
    )?;

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, session) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    drop(telemetry);
    Ok(())
}
