#[macro_use]
extern crate rocket;

mod api;
mod config;
mod error;
mod models;
mod services;
mod utils;

use crate::api::{declared_tables, sync_status, trigger_sync};
use crate::services::pipeline::SyncRunner;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::JobScheduler;

pub struct AppState {
    pub scheduler: Mutex<JobScheduler>,
    pub runner: Arc<SyncRunner>,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    config::load_environment();
    config::init_logger();

    let app_state = config::create_app_state().await?;
    let cors = config::create_cors()?;

    let _rocket = rocket::build()
        .manage(app_state)
        .mount("/api/sync", routes![trigger_sync, sync_status, declared_tables])
        .attach(cors)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed to launch: {e}"))?;

    Ok(())
}
