use crate::config::SyncSettings;
use crate::models::{
    DailyChannelMetrics, PerformanceWindow, Row, RunReport, RunStatus, StageReport, VideoMetadata,
};
use crate::services::classifier::{ClassifierConfig, ContentClassifier};
use crate::services::reconcile::{summarize_channel, summarize_pillars, Reconciler};
use crate::services::schema::{
    SchemaManager, SheetCatalog, CONTENT_PILLARS, DAILY_METRICS, SUMMARY, VIDEO_MASTER,
    VIDEO_TAXONOMY,
};
use crate::services::scorer::BaselinePolicy;
use crate::services::sheets::SheetsStore;
use crate::services::store::DestinationStore;
use crate::services::writer::UpsertWriter;
use crate::services::youtube::{MetadataSource, MetricsQuery, MetricsSource, YouTubeClient};
use chrono::{DateTime, Days, NaiveDate, Utc};
use log::{error, info, warn};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

const PERFORMANCE_METRICS: [&str; 4] = [
    "views",
    "estimatedMinutesWatched",
    "averageViewDuration",
    "averageViewPercentage",
];

/// One extraction run over already-built collaborators.
pub struct Pipeline<'a> {
    pub settings: &'a SyncSettings,
    pub metrics: &'a dyn MetricsSource,
    pub metadata: &'a dyn MetadataSource,
    pub store: &'a dyn DestinationStore,
    pub catalog: &'a SheetCatalog,
    pub classifier: ContentClassifier,
}

impl<'a> Pipeline<'a> {
    /// Runs every stage in order. Never fails: problems end up in the report.
    pub async fn run(self, now: DateTime<Utc>) -> RunReport {
        let mut report = new_report(now);
        let today = now.date_naive();
        let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
        info!("Starting sync run {}", report.run_id);

        let (Some(daily_start), Some(window_start)) = (
            days_before(today, self.settings.daily_lookback_days),
            days_before(today, self.settings.window_days),
        ) else {
            fail(
                &mut report,
                format!(
                    "invalid date window: lookback {} days, performance window {} days",
                    self.settings.daily_lookback_days, self.settings.window_days
                ),
            );
            report.finished_at = Some(Utc::now().to_rfc3339());
            error!("Sync run {} not started: invalid date window", report.run_id);
            return report;
        };

        let daily = self.fetch_daily(daily_start, today, &mut report).await;
        let (videos, metadata_ok) = self.fetch_videos(&mut report).await;
        let windows = self
            .fetch_performance(&videos, window_start, today, &mut report)
            .await;

        let policy = match self.settings.fixed_baselines {
            Some(baselines) => BaselinePolicy::Fixed(baselines),
            None => BaselinePolicy::Dynamic,
        };
        let reconciler = Reconciler::new(self.classifier.clone(), policy);
        let reconciled = reconciler.reconcile(&videos, &windows, &stamp);
        let pillars = summarize_pillars(&reconciled.videos);
        let summary = summarize_channel(&reconciled.videos, self.settings.since, today);
        push_stage(&mut report, "reconcile", reconciled.videos.len());
        info!(
            "Reconciled {} videos into {} pillars",
            reconciled.videos.len(),
            pillars.len()
        );

        let mut writes: Vec<(&str, Vec<Row>)> = vec![(
            DAILY_METRICS,
            daily.iter().map(|d| d.to_row(&stamp)).collect(),
        )];
        if metadata_ok {
            writes.push((
                VIDEO_MASTER,
                reconciled.videos.iter().map(|v| v.to_row()).collect(),
            ));
            writes.push((
                VIDEO_TAXONOMY,
                reconciled.taxonomy.iter().map(|t| t.to_row()).collect(),
            ));
            writes.push((
                CONTENT_PILLARS,
                pillars.iter().map(|p| p.to_row(&stamp)).collect(),
            ));
            writes.push((SUMMARY, summary.iter().map(|m| m.to_row()).collect()));
        } else {
            report
                .warnings
                .push("video metadata unavailable, snapshot tables left untouched".to_string());
        }

        self.persist(writes, &mut report).await;

        report.finished_at = Some(Utc::now().to_rfc3339());
        match report.status {
            RunStatus::Succeeded => info!(
                "Sync run {} succeeded with {} warnings",
                report.run_id,
                report.warnings.len()
            ),
            RunStatus::Failed => error!(
                "Sync run {} failed: {}",
                report.run_id,
                report.error.as_deref().unwrap_or("unknown error")
            ),
        }
        report
    }

    async fn fetch_daily(
        &self,
        start_date: NaiveDate,
        today: NaiveDate,
        report: &mut RunReport,
    ) -> Vec<DailyChannelMetrics> {
        let query = MetricsQuery {
            dimension: "day".to_string(),
            metrics: DailyChannelMetrics::METRICS.iter().map(|m| m.to_string()).collect(),
            start_date,
            end_date: today,
            sort: Some("day".to_string()),
            filter: None,
        };

        let daily = match self.metrics.query(&query).await {
            Ok(result) => DailyChannelMetrics::from_report(&result),
            Err(e) => {
                error!("Failed to fetch daily channel metrics: {e}");
                report.warnings.push(format!("daily metrics: {e}"));
                Vec::new()
            }
        };
        push_stage(report, "daily_metrics", daily.len());
        daily
    }

    /// Returns the videos and whether the metadata source answered at all.
    async fn fetch_videos(&self, report: &mut RunReport) -> (Vec<VideoMetadata>, bool) {
        let ids = match self.metadata.upload_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list channel uploads: {e}");
                report.warnings.push(format!("uploads: {e}"));
                push_stage(report, "metadata", 0);
                return (Vec::new(), false);
            }
        };

        let mut videos = match self.metadata.fetch(&ids).await {
            Ok(videos) => videos,
            Err(e) => {
                error!("Failed to fetch video metadata: {e}");
                report.warnings.push(format!("metadata: {e}"));
                push_stage(report, "metadata", 0);
                return (Vec::new(), false);
            }
        };

        if let Some(since) = self.settings.since {
            let before = videos.len();
            videos.retain(|v| published_on_or_after(v, since));
            info!(
                "Kept {} of {} videos published since {since}",
                videos.len(),
                before
            );
        }

        push_stage(report, "metadata", videos.len());
        (videos, true)
    }

    async fn fetch_performance(
        &self,
        videos: &[VideoMetadata],
        start_date: NaiveDate,
        today: NaiveDate,
        report: &mut RunReport,
    ) -> Vec<PerformanceWindow> {
        let ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        let batch_size = self.settings.batch_size.max(1);
        let mut windows = Vec::with_capacity(ids.len());

        for (idx, batch) in ids.chunks(batch_size).enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.settings.batch_pause).await;
            }
            let query = MetricsQuery {
                dimension: "video".to_string(),
                metrics: PERFORMANCE_METRICS.iter().map(|m| m.to_string()).collect(),
                start_date,
                end_date: today,
                sort: Some("-views".to_string()),
                filter: Some(format!("video=={}", batch.join(","))),
            };
            match self.metrics.query(&query).await {
                Ok(result) => windows.extend(PerformanceWindow::from_report(&result)),
                Err(e) => {
                    error!("Failed to fetch performance batch {}: {e}", idx + 1);
                    report.warnings.push(format!("performance batch {}: {e}", idx + 1));
                }
            }
        }

        push_stage(report, "performance", windows.len());
        windows
    }

    async fn persist(&self, writes: Vec<(&str, Vec<Row>)>, report: &mut RunReport) {
        let schemas = SchemaManager::new(self.store);
        let writer = UpsertWriter::new(self.store, self.catalog);

        for (table, rows) in writes {
            let Some(schema) = self.catalog.get(table) else {
                fail(report, format!("table '{table}' is not declared"));
                return;
            };

            if let Err(e) = schemas.ensure_table(schema).await {
                report.stages.push(StageReport {
                    stage: table.to_string(),
                    processed: rows.len(),
                    intended: rows.len(),
                    committed: 0,
                });
                fail(report, format!("schema check on '{table}' failed: {e}"));
                return;
            }

            let processed = rows.len();
            let outcome = writer.write(table, rows).await;
            report.stages.push(StageReport {
                stage: table.to_string(),
                processed,
                intended: outcome.intended,
                committed: outcome.committed,
            });

            if let Some(e) = outcome.error {
                fail(
                    report,
                    format!(
                        "write to '{table}' failed ({} of {} rows committed): {e}",
                        outcome.committed, outcome.intended
                    ),
                );
                return;
            }
        }
    }
}

fn new_report(now: DateTime<Utc>) -> RunReport {
    RunReport {
        run_id: Uuid::new_v4().to_string(),
        started_at: now.to_rfc3339(),
        finished_at: None,
        status: RunStatus::Succeeded,
        error: None,
        stages: Vec::new(),
        warnings: Vec::new(),
    }
}

fn push_stage(report: &mut RunReport, stage: &str, processed: usize) {
    report.stages.push(StageReport {
        stage: stage.to_string(),
        processed,
        intended: 0,
        committed: 0,
    });
}

fn fail(report: &mut RunReport, message: String) {
    report.status = RunStatus::Failed;
    report.error = Some(message);
}

/// `today` minus a positive day count, `None` when out of range.
fn days_before(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    let days = u64::try_from(days).ok().filter(|d| *d > 0)?;
    today.checked_sub_days(Days::new(days))
}

fn published_on_or_after(video: &VideoMetadata, since: NaiveDate) -> bool {
    NaiveDate::parse_from_str(&video.publish_date, "%Y-%m-%d")
        .map(|date| date >= since)
        .unwrap_or(false)
}

/// Owns the run lock and the last report. Every trigger re-reads the settings
/// and builds its own API clients.
pub struct SyncRunner {
    run_lock: Mutex<()>,
    last_report: RwLock<Option<RunReport>>,
    catalog: SheetCatalog,
    classifier_config: ClassifierConfig,
}

impl Default for SyncRunner {
    fn default() -> Self {
        Self::new(SheetCatalog::default(), ClassifierConfig::default())
    }
}

impl SyncRunner {
    pub fn new(catalog: SheetCatalog, classifier_config: ClassifierConfig) -> Self {
        SyncRunner {
            run_lock: Mutex::new(()),
            last_report: RwLock::new(None),
            catalog,
            classifier_config,
        }
    }

    pub fn catalog(&self) -> &SheetCatalog {
        &self.catalog
    }

    pub async fn last_report(&self) -> Option<RunReport> {
        self.last_report.read().await.clone()
    }

    /// Runs the pipeline now, or returns `None` when a run is already going.
    pub async fn trigger(&self) -> Option<RunReport> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("Sync run already in progress, skipping trigger");
            return None;
        };

        let now = Utc::now();
        let report = match SyncSettings::from_env() {
            Ok(settings) => {
                let youtube = YouTubeClient::new(&settings);
                let sheets = SheetsStore::new(&settings);
                Pipeline {
                    settings: &settings,
                    metrics: &youtube,
                    metadata: &youtube,
                    store: &sheets,
                    catalog: &self.catalog,
                    classifier: ContentClassifier::new(self.classifier_config.clone()),
                }
                .run(now)
                .await
            }
            Err(e) => {
                error!("Sync run not started: {e}");
                let mut report = new_report(now);
                fail(&mut report, e.to_string());
                report.finished_at = Some(Utc::now().to_rfc3339());
                report
            }
        };

        *self.last_report.write().await = Some(report.clone());
        Some(report)
    }
}
