use rocket::serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminToken(pub String);

/// A single scalar written into a destination table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Converts a raw JSON value read back from a store.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Cell::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => Cell::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) if s.is_empty() => Cell::Empty,
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            _ => Cell::Empty,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Bool(b) => serde_json::Value::Bool(*b),
            Cell::Int(i) => serde_json::Value::from(*i),
            Cell::Float(f) if f.is_finite() => serde_json::Value::from(*f),
            Cell::Float(_) => serde_json::Value::String(String::new()),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
            Cell::Empty => serde_json::Value::String(String::new()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Empty => Ok(()),
        }
    }
}

pub type Row = Vec<Cell>;

/// One row of a reporting API response: dimension values then metric values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawMetricRow {
    pub dimensions: Vec<String>,
    pub values: Vec<f64>,
}

/// Rows of a report together with the column names the API returned for them.
#[derive(Debug, Clone, Default)]
pub struct MetricReport {
    pub dimension_names: Vec<String>,
    pub metric_names: Vec<String>,
    pub rows: Vec<RawMetricRow>,
}

impl MetricReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Reads a metric by name. Unknown names and missing trailing values are 0.
    pub fn metric(&self, row: &RawMetricRow, name: &str) -> f64 {
        self.metric_names
            .iter()
            .position(|m| m == name)
            .and_then(|idx| row.values.get(idx))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn dimension<'a>(&self, row: &'a RawMetricRow, name: &str) -> Option<&'a str> {
        self.dimension_names
            .iter()
            .position(|d| d == name)
            .and_then(|idx| row.dimensions.get(idx))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub publish_date: String, // YYYY-MM-DD
    pub duration_seconds: i64,
    pub category: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub description_snippet: String,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceWindow {
    pub video_id: String,
    pub views: f64,
    pub watch_time: f64, // minutes
    pub avg_view_duration: f64,
    pub avg_view_percentage: f64,
}

impl PerformanceWindow {
    pub fn empty(video_id: &str) -> Self {
        PerformanceWindow {
            video_id: video_id.to_string(),
            ..Default::default()
        }
    }

    pub fn from_report(report: &MetricReport) -> Vec<PerformanceWindow> {
        report
            .rows
            .iter()
            .filter_map(|row| {
                let video_id = report.dimension(row, "video")?;
                Some(PerformanceWindow {
                    video_id: video_id.to_string(),
                    views: report.metric(row, "views"),
                    watch_time: report.metric(row, "estimatedMinutesWatched"),
                    avg_view_duration: report.metric(row, "averageViewDuration"),
                    avg_view_percentage: report.metric(row, "averageViewPercentage"),
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerformanceTier {
    A,
    B,
    C,
    D,
}

impl PerformanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceTier::A => "A",
            PerformanceTier::B => "B",
            PerformanceTier::C => "C",
            PerformanceTier::D => "D",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedVideoRecord {
    pub metadata: VideoMetadata,
    pub views_7d: f64,
    pub watch_time_7d: f64,
    pub avg_view_duration: f64,
    pub avg_view_percentage: f64,
    pub retention_rate: f64,
    pub engagement_rate: f64,
    pub performance_score: f64,
    pub performance_tier: PerformanceTier,
    pub content_pillar: String,
    pub last_updated: String,
}

impl EnrichedVideoRecord {
    pub fn video_id(&self) -> &str {
        &self.metadata.video_id
    }

    /// Row in `Video_Master` column order.
    pub fn to_row(&self) -> Row {
        let m = &self.metadata;
        vec![
            Cell::text(&m.video_id),
            Cell::text(&m.title),
            Cell::text(&m.publish_date),
            Cell::Int(m.duration_seconds),
            Cell::text(&m.category),
            Cell::text(&m.thumbnail_url),
            Cell::Text(m.tags.join(", ")),
            Cell::text(&m.description_snippet),
            Cell::Int(m.view_count),
            Cell::Int(m.like_count),
            Cell::Int(m.comment_count),
            Cell::Int(self.views_7d as i64),
            Cell::Float(self.watch_time_7d),
            Cell::Float(self.avg_view_duration),
            Cell::Float(self.avg_view_percentage),
            Cell::Float(self.retention_rate),
            Cell::Float(self.engagement_rate),
            Cell::Float(self.performance_score),
            Cell::text(self.performance_tier.as_str()),
            Cell::text(&self.content_pillar),
            Cell::text(&self.last_updated),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRecord {
    pub video_id: String,
    pub title: String,
    pub primary_topic: String,
    pub secondary_topics: Vec<String>,
    pub hook_type: String,
    pub content_format: String,
    pub cta_presence: String,
    pub publication_day: String,
}

impl TaxonomyRecord {
    /// Row in `Video_Taxonomy` column order.
    pub fn to_row(&self) -> Row {
        vec![
            Cell::text(&self.video_id),
            Cell::text(&self.title),
            Cell::text(&self.primary_topic),
            Cell::Text(self.secondary_topics.join(", ")),
            Cell::text(&self.hook_type),
            Cell::text(&self.content_format),
            Cell::text(&self.cta_presence),
            Cell::text(&self.publication_day),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DailyChannelMetrics {
    pub date: String,
    pub views: f64,
    pub watch_time_minutes: f64,
    pub avg_view_duration: f64,
    pub subscribers_gained: f64,
    pub subscribers_lost: f64,
    pub likes: f64,
    pub comments: f64,
    pub shares: f64,
}

impl DailyChannelMetrics {
    pub const METRICS: [&'static str; 8] = [
        "views",
        "estimatedMinutesWatched",
        "averageViewDuration",
        "subscribersGained",
        "subscribersLost",
        "likes",
        "comments",
        "shares",
    ];

    pub fn from_report(report: &MetricReport) -> Vec<DailyChannelMetrics> {
        report
            .rows
            .iter()
            .filter_map(|row| {
                let date = report.dimension(row, "day")?;
                Some(DailyChannelMetrics {
                    date: date.to_string(),
                    views: report.metric(row, "views"),
                    watch_time_minutes: report.metric(row, "estimatedMinutesWatched"),
                    avg_view_duration: report.metric(row, "averageViewDuration"),
                    subscribers_gained: report.metric(row, "subscribersGained"),
                    subscribers_lost: report.metric(row, "subscribersLost"),
                    likes: report.metric(row, "likes"),
                    comments: report.metric(row, "comments"),
                    shares: report.metric(row, "shares"),
                })
            })
            .collect()
    }

    /// Row in `Daily_Metrics` column order.
    pub fn to_row(&self, extracted_at: &str) -> Row {
        vec![
            Cell::text(&self.date),
            Cell::Int(self.views as i64),
            Cell::Float(self.watch_time_minutes),
            Cell::Float(self.avg_view_duration),
            Cell::Int(self.subscribers_gained as i64),
            Cell::Int(self.subscribers_lost as i64),
            Cell::Int(self.likes as i64),
            Cell::Int(self.comments as i64),
            Cell::Int(self.shares as i64),
            Cell::text(extracted_at),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarSummary {
    pub content_pillar: String,
    pub video_count: usize,
    pub total_views: i64,
    pub avg_views: f64,
    pub avg_engagement_rate: f64,
    pub avg_view_duration: f64,
}

impl PillarSummary {
    /// Row in `Content_Pillars` column order.
    pub fn to_row(&self, updated_at: &str) -> Row {
        vec![
            Cell::text(&self.content_pillar),
            Cell::Int(self.video_count as i64),
            Cell::Int(self.total_views),
            Cell::Float(self.avg_views),
            Cell::Float(self.avg_engagement_rate),
            Cell::Float(self.avg_view_duration),
            Cell::text(updated_at),
        ]
    }
}

/// One `metric, value` line of the channel summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetric {
    pub metric: String,
    pub value: Cell,
}

impl SummaryMetric {
    pub fn new(metric: &str, value: Cell) -> Self {
        SummaryMetric {
            metric: metric.to_string(),
            value,
        }
    }

    pub fn to_row(&self) -> Row {
        vec![Cell::text(&self.metric), self.value.clone()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub processed: usize,
    pub intended: usize,
    pub committed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub stages: Vec<StageReport>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
