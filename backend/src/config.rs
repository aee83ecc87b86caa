use crate::error::ConfigError;
use crate::models::AdminToken;
use crate::services::pipeline::SyncRunner;
use crate::services::scorer::Baselines;
use crate::AppState;
use anyhow::Result;
use chrono::NaiveDate;
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{error, info, LevelFilter};
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

lazy_static! {
    pub static ref ADMIN_TOKEN: Option<String> = env::var("ADMIN_TOKEN").ok();
    pub static ref SYNC_SCHEDULE: String =
        env::var("SYNC_SCHEDULE").unwrap_or_else(|_| "0 0 6 * * *".to_string());
    pub static ref YOUTUBE_DATA_API_URL: String = env::var("YOUTUBE_DATA_API_URL")
        .unwrap_or_else(|_| "https://www.googleapis.com/youtube/v3".to_string());
    pub static ref YOUTUBE_ANALYTICS_API_URL: String = env::var("YOUTUBE_ANALYTICS_API_URL")
        .unwrap_or_else(|_| "https://youtubeanalytics.googleapis.com/v2".to_string());
    pub static ref SHEETS_API_URL: String = env::var("SHEETS_API_URL")
        .unwrap_or_else(|_| "https://sheets.googleapis.com/v4".to_string());
    pub static ref CORS_ORIGIN: String =
        env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:8080".to_string());
}

pub const MAX_WINDOW_DAYS: i64 = 3650;

pub fn init_logger() {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
    info!("Starting channel sync backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

/// Everything one sync run needs. Read again at the start of every run.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub channel_id: String,
    pub youtube_token: String,
    pub spreadsheet_id: String,
    pub sheets_token: String,
    pub window_days: i64,
    pub daily_lookback_days: i64,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub since: Option<NaiveDate>,
    pub fixed_baselines: Option<Baselines>,
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let youtube_token = required("YOUTUBE_ACCESS_TOKEN")?;
        let sheets_token = get("SHEETS_ACCESS_TOKEN").unwrap_or_else(|| youtube_token.clone());

        let fixed_baselines = match (
            parsed::<f64>(&get, "SYNC_BASELINE_VIEWS")?,
            parsed::<f64>(&get, "SYNC_BASELINE_WATCH_TIME")?,
            parsed::<f64>(&get, "SYNC_BASELINE_RETENTION")?,
        ) {
            (Some(avg_views), Some(avg_watch_time), Some(avg_retention)) => Some(Baselines {
                avg_views,
                avg_watch_time,
                avg_retention,
            }),
            (None, None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: "SYNC_BASELINE_*",
                    value: "set all three baselines or none".to_string(),
                })
            }
        };

        let since = match get("SYNC_SINCE") {
            Some(value) => Some(NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(
                |_| ConfigError::Invalid {
                    name: "SYNC_SINCE",
                    value,
                },
            )?),
            None => None,
        };

        Ok(SyncSettings {
            channel_id: required("YOUTUBE_CHANNEL_ID")?,
            youtube_token,
            spreadsheet_id: required("SHEETS_SPREADSHEET_ID")?,
            sheets_token,
            window_days: day_count(&get, "SYNC_WINDOW_DAYS", 7)?,
            daily_lookback_days: day_count(&get, "SYNC_DAILY_LOOKBACK_DAYS", 3)?,
            batch_size: parsed(&get, "SYNC_BATCH_SIZE")?.unwrap_or(50),
            batch_pause: Duration::from_millis(parsed(&get, "SYNC_BATCH_PAUSE_MS")?.unwrap_or(500)),
            since,
            fixed_baselines,
        })
    }
}

fn parsed<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}

/// A positive number of days, at most `MAX_WINDOW_DAYS`.
fn day_count(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: i64,
) -> Result<i64, ConfigError> {
    match parsed::<i64>(get, name)? {
        Some(days) if (1..=MAX_WINDOW_DAYS).contains(&days) => Ok(days),
        Some(days) => Err(ConfigError::Invalid {
            name,
            value: days.to_string(),
        }),
        None => Ok(default),
    }
}

pub async fn setup_sync_scheduler(runner: Arc<SyncRunner>) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let runner_clone = runner.clone();

    let sync_job = Job::new_async(SYNC_SCHEDULE.as_str(), move |_uuid, _l| {
        let runner = runner_clone.clone();
        Box::pin(async move {
            match runner.trigger().await {
                Some(report) => info!(
                    "Scheduled sync {} finished: {:?}",
                    report.run_id, report.status
                ),
                None => info!("Scheduled sync skipped, previous run still active"),
            }
        })
    })?;

    scheduler.add(sync_job).await?;
    scheduler.start().await?;
    info!("Sync scheduler started with schedule '{}'", &*SYNC_SCHEDULE);

    Ok(scheduler)
}

pub async fn create_app_state() -> Result<AppState> {
    if let Err(e) = SyncSettings::from_env() {
        error!("Sync settings incomplete, runs will fail until fixed: {e}");
    }
    if ADMIN_TOKEN.is_none() {
        error!("ADMIN_TOKEN is not set, manual sync triggers are disabled");
    }

    let runner = Arc::new(SyncRunner::default());
    let scheduler = setup_sync_scheduler(runner.clone()).await?;

    Ok(AppState {
        scheduler: Mutex::new(scheduler),
        runner,
    })
}

pub fn create_cors() -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&[CORS_ORIGIN.as_str()]))
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&[
            "Authorization",
            "Accept",
            "Content-Type",
        ]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow::anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = request
            .headers()
            .get_one("Authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "));

        match (token, ADMIN_TOKEN.as_deref()) {
            (_, None) => Outcome::Error((Status::Unauthorized, "Admin token not configured")),
            (Some(t), Some(expected)) if t == expected => {
                Outcome::Success(AdminToken(t.to_string()))
            }
            (Some(_), Some(_)) => Outcome::Error((Status::Unauthorized, "Invalid token")),
            (None, Some(_)) => Outcome::Error((Status::Unauthorized, "Missing token")),
        }
    }
}
