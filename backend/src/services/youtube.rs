use crate::config::{SyncSettings, YOUTUBE_ANALYTICS_API_URL, YOUTUBE_DATA_API_URL};
use crate::error::SourceError;
use crate::models::{MetricReport, RawMetricRow, VideoMetadata};
use crate::utils::{parse_iso8601_duration_to_seconds, truncate_chars};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const METADATA_BATCH_SIZE: usize = 50;
const DESCRIPTION_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsQuery {
    pub dimension: String,
    pub metrics: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sort: Option<String>,
    pub filter: Option<String>,
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn query(&self, query: &MetricsQuery) -> Result<MetricReport, SourceError>;
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Every video id in the channel's uploads playlist.
    async fn upload_ids(&self) -> Result<Vec<String>, SourceError>;

    async fn fetch(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>, SourceError>;
}

/// Client for the YouTube Data and Analytics APIs. Built fresh for every run.
pub struct YouTubeClient {
    http: Client,
    access_token: String,
    channel_id: String,
    batch_size: usize,
    batch_pause: Duration,
}

impl YouTubeClient {
    pub fn new(settings: &SyncSettings) -> Self {
        YouTubeClient {
            http: Client::new(),
            access_token: settings.youtube_token.clone(),
            channel_id: settings.channel_id.clone(),
            batch_size: settings.batch_size.clamp(1, METADATA_BATCH_SIZE),
            batch_pause: settings.batch_pause,
        }
    }

    async fn get_json(&self, url: Url) -> Result<Value, SourceError> {
        debug!("GET {}", url.path());
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.json::<Value>().await?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn uploads_playlist_id(&self) -> Result<String, SourceError> {
        let url = Url::parse_with_params(
            &format!("{}/channels", &*YOUTUBE_DATA_API_URL),
            &[("part", "contentDetails"), ("id", self.channel_id.as_str())],
        )
        .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let response = self.get_json(url).await?;

        response["items"][0]["contentDetails"]["relatedPlaylists"]["uploads"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| SourceError::Malformed("No uploads playlist found".to_string()))
    }

    async fn fetch_batch(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>, SourceError> {
        let ids = video_ids.join(",");
        // Documentation: https://developers.google.com/youtube/v3/docs/videos
        let url = Url::parse_with_params(
            &format!("{}/videos", &*YOUTUBE_DATA_API_URL),
            &[
                ("part", "snippet,statistics,contentDetails"),
                ("id", ids.as_str()),
                ("maxResults", "50"),
            ],
        )
        .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let response = self.get_json(url).await?;
        Ok(parse_videos(&response))
    }
}

#[async_trait]
impl MetricsSource for YouTubeClient {
    async fn query(&self, query: &MetricsQuery) -> Result<MetricReport, SourceError> {
        let ids = format!("channel=={}", self.channel_id);
        let metrics = query.metrics.join(",");
        let start = query.start_date.format("%Y-%m-%d").to_string();
        let end = query.end_date.format("%Y-%m-%d").to_string();

        let mut params = vec![
            ("ids", ids.as_str()),
            ("dimensions", query.dimension.as_str()),
            ("metrics", metrics.as_str()),
            ("startDate", start.as_str()),
            ("endDate", end.as_str()),
        ];
        if let Some(sort) = &query.sort {
            params.push(("sort", sort.as_str()));
        }
        if let Some(filter) = &query.filter {
            params.push(("filters", filter.as_str()));
        }

        let url = Url::parse_with_params(&format!("{}/reports", &*YOUTUBE_ANALYTICS_API_URL), &params)
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let response = self.get_json(url).await?;
        let report = parse_report(&response)?;
        info!(
            "Analytics report by '{}' ({} to {}): {} rows",
            query.dimension,
            start,
            end,
            report.rows.len()
        );
        Ok(report)
    }
}

#[async_trait]
impl MetadataSource for YouTubeClient {
    async fn upload_ids(&self) -> Result<Vec<String>, SourceError> {
        let playlist_id = self.uploads_playlist_id().await?;
        let mut all_video_ids = Vec::new();
        let mut next_page_token: Option<String> = None;

        loop {
            // https://developers.google.com/youtube/v3/docs/playlistItems
            let mut params = vec![
                ("playlistId", playlist_id.as_str()),
                ("part", "snippet"),
                ("maxResults", "50"),
            ];
            if let Some(token) = &next_page_token {
                params.push(("pageToken", token.as_str()));
            }
            let url = Url::parse_with_params(
                &format!("{}/playlistItems", &*YOUTUBE_DATA_API_URL),
                &params,
            )
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

            let response = self.get_json(url).await?;
            let (ids, token) = parse_playlist_page(&response);
            all_video_ids.extend(ids);

            match token {
                Some(token) => {
                    next_page_token = Some(token);
                    tokio::time::sleep(self.batch_pause).await;
                }
                None => break,
            }
        }

        info!("Found {} videos in uploads playlist", all_video_ids.len());
        Ok(all_video_ids)
    }

    async fn fetch(&self, video_ids: &[String]) -> Result<Vec<VideoMetadata>, SourceError> {
        let mut videos = Vec::with_capacity(video_ids.len());
        let batches = video_ids.chunks(self.batch_size).count();

        for (idx, batch) in video_ids.chunks(self.batch_size).enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }
            let fetched = self.fetch_batch(batch).await?;
            info!(
                "Metadata batch {}/{}: {} of {} videos",
                idx + 1,
                batches,
                fetched.len(),
                batch.len()
            );
            videos.extend(fetched);
        }

        Ok(videos)
    }
}

fn api_error(status: u16, body: &Value) -> SourceError {
    SourceError::Api {
        status,
        message: body["error"]["message"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string(),
    }
}

/// Splits an Analytics `reports` response into named dimension and metric
/// columns. A response without rows is an empty report, not an error.
pub fn parse_report(response: &Value) -> Result<MetricReport, SourceError> {
    let headers = response["columnHeaders"]
        .as_array()
        .ok_or_else(|| SourceError::Malformed("missing columnHeaders".to_string()))?;

    let mut report = MetricReport::default();
    let mut is_dimension = Vec::with_capacity(headers.len());
    for header in headers {
        let name = header["name"]
            .as_str()
            .ok_or_else(|| SourceError::Malformed("column without name".to_string()))?;
        let dimension = header["columnType"].as_str() == Some("DIMENSION");
        if dimension {
            report.dimension_names.push(name.to_string());
        } else {
            report.metric_names.push(name.to_string());
        }
        is_dimension.push(dimension);
    }

    for row in response["rows"].as_array().map(Vec::as_slice).unwrap_or_default() {
        let Some(cells) = row.as_array() else {
            return Err(SourceError::Malformed("row is not an array".to_string()));
        };
        let mut raw = RawMetricRow::default();
        for (cell, dimension) in cells.iter().zip(&is_dimension) {
            if *dimension {
                raw.dimensions.push(match cell {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            } else {
                raw.values.push(number(cell));
            }
        }
        report.rows.push(raw);
    }

    Ok(report)
}

fn number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn count(value: &Value) -> i64 {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_i64())
        .unwrap_or(0)
}

pub fn parse_videos(response: &Value) -> Vec<VideoMetadata> {
    response["items"]
        .as_array()
        .map(|items| items.iter().filter_map(parse_video_item).collect())
        .unwrap_or_default()
}

fn parse_video_item(item: &Value) -> Option<VideoMetadata> {
    let video_id = item["id"].as_str()?.to_string();
    let snippet = &item["snippet"];
    let thumbnails = &snippet["thumbnails"];

    Some(VideoMetadata {
        video_id,
        title: snippet["title"].as_str().unwrap_or("").to_string(),
        publish_date: snippet["publishedAt"]
            .as_str()
            .map(|d| truncate_chars(d, 10))
            .unwrap_or_default(),
        duration_seconds: parse_iso8601_duration_to_seconds(
            item["contentDetails"]["duration"].as_str().unwrap_or(""),
        ),
        category: snippet["categoryId"].as_str().unwrap_or("").to_string(),
        thumbnail_url: thumbnails["high"]["url"]
            .as_str()
            .or_else(|| thumbnails["default"]["url"].as_str())
            .unwrap_or("")
            .to_string(),
        tags: snippet["tags"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        description_snippet: truncate_chars(
            snippet["description"].as_str().unwrap_or(""),
            DESCRIPTION_SNIPPET_CHARS,
        ),
        view_count: count(&item["statistics"]["viewCount"]),
        like_count: count(&item["statistics"]["likeCount"]),
        comment_count: count(&item["statistics"]["commentCount"]),
    })
}

pub fn parse_playlist_page(response: &Value) -> (Vec<String>, Option<String>) {
    let ids = response["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["snippet"]["resourceId"]["videoId"].as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    let token = response["nextPageToken"].as_str().map(String::from);
    (ids, token)
}
