use crate::models::{
    Cell, EnrichedVideoRecord, PerformanceWindow, PillarSummary, SummaryMetric, TaxonomyRecord,
    VideoMetadata,
};
use crate::services::classifier::{ContentClassifier, VideoClassifier};
use crate::services::scorer::{BaselinePolicy, Baselines, PerformanceScorer};
use crate::utils::round2;
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub videos: Vec<EnrichedVideoRecord>,
    pub taxonomy: Vec<TaxonomyRecord>,
}

pub struct Reconciler<C = ContentClassifier> {
    classifier: C,
    baseline_policy: BaselinePolicy,
}

impl<C: VideoClassifier> Reconciler<C> {
    pub fn new(classifier: C, baseline_policy: BaselinePolicy) -> Self {
        Reconciler {
            classifier,
            baseline_policy,
        }
    }

    /// Joins metadata with performance windows on `video_id`.
    ///
    /// Metadata decides identity: one record per metadata entry, in order.
    /// Performance rows without metadata are dropped, and the first window wins
    /// when an id shows up more than once.
    pub fn reconcile(
        &self,
        metadata: &[VideoMetadata],
        performance: &[PerformanceWindow],
        updated_at: &str,
    ) -> Reconciliation {
        let mut by_id: HashMap<&str, &PerformanceWindow> = HashMap::new();
        for window in performance {
            by_id.entry(window.video_id.as_str()).or_insert(window);
        }

        let joined: Vec<PerformanceWindow> = metadata
            .iter()
            .map(|video| match by_id.get(video.video_id.as_str()) {
                Some(window) => (*window).clone(),
                None => PerformanceWindow::empty(&video.video_id),
            })
            .collect();

        let matched = metadata
            .iter()
            .filter(|v| by_id.contains_key(v.video_id.as_str()))
            .count();
        debug!(
            "Joined {} metadata entries with {} performance rows ({} matched)",
            metadata.len(),
            performance.len(),
            matched
        );

        let baselines = match self.baseline_policy {
            BaselinePolicy::Dynamic => Baselines::from_windows(&joined),
            BaselinePolicy::Fixed(baselines) => baselines,
        };
        let scorer = PerformanceScorer::new(baselines);
        info!(
            "Scoring against baselines: views {:.1}, watch time {:.1}, retention {:.1}",
            baselines.avg_views, baselines.avg_watch_time, baselines.avg_retention
        );

        let mut result = Reconciliation {
            videos: Vec::with_capacity(metadata.len()),
            taxonomy: Vec::with_capacity(metadata.len()),
        };

        for (video, window) in metadata.iter().zip(joined) {
            let classification = self.classifier.classify_video(video);
            let score = scorer.score(&window);

            result.taxonomy.push(TaxonomyRecord {
                video_id: video.video_id.clone(),
                title: video.title.clone(),
                primary_topic: classification.pillar.clone(),
                secondary_topics: classification.secondary_topics,
                hook_type: classification.hook_type,
                content_format: classification.content_format,
                cta_presence: classification.cta_presence,
                publication_day: classification.publication_day,
            });

            result.videos.push(EnrichedVideoRecord {
                metadata: video.clone(),
                views_7d: window.views,
                watch_time_7d: window.watch_time,
                avg_view_duration: window.avg_view_duration,
                avg_view_percentage: window.avg_view_percentage,
                retention_rate: window.avg_view_percentage / 100.0,
                engagement_rate: engagement_rate(video),
                performance_score: round2(score.value),
                performance_tier: score.tier,
                content_pillar: classification.pillar,
                last_updated: updated_at.to_string(),
            });
        }

        result
    }
}

/// (likes + comments) / views, as a percentage with 2 decimals.
pub fn engagement_rate(video: &VideoMetadata) -> f64 {
    if video.view_count <= 0 {
        return 0.0;
    }
    let interactions = (video.like_count + video.comment_count) as f64;
    round2(interactions / video.view_count as f64 * 100.0)
}

/// Per-pillar aggregates, largest total views first.
pub fn summarize_pillars(videos: &[EnrichedVideoRecord]) -> Vec<PillarSummary> {
    let mut groups: BTreeMap<&str, Vec<&EnrichedVideoRecord>> = BTreeMap::new();
    for video in videos {
        groups.entry(video.content_pillar.as_str()).or_default().push(video);
    }

    let mut summaries: Vec<PillarSummary> = groups
        .into_iter()
        .map(|(pillar, members)| {
            let n = members.len() as f64;
            let total_views: i64 = members.iter().map(|v| v.metadata.view_count).sum();
            let engagement: f64 = members.iter().map(|v| v.engagement_rate).sum();
            let duration: f64 = members.iter().map(|v| v.avg_view_duration).sum();
            PillarSummary {
                content_pillar: pillar.to_string(),
                video_count: members.len(),
                total_views,
                avg_views: round2(total_views as f64 / n),
                avg_engagement_rate: round2(engagement / n),
                avg_view_duration: round2(duration / n),
            }
        })
        .collect();

    // BTreeMap order already sorts by name, the stable sort keeps it for ties.
    summaries.sort_by(|a, b| b.total_views.cmp(&a.total_views));
    summaries
}

/// Channel-wide totals over the lifetime view counts of the run's videos.
///
/// Best video fields are left empty when there are no videos.
pub fn summarize_channel(
    videos: &[EnrichedVideoRecord],
    since: Option<NaiveDate>,
    analysis_date: NaiveDate,
) -> Vec<SummaryMetric> {
    let total_views: i64 = videos.iter().map(|v| v.metadata.view_count).sum();
    let avg_views = if videos.is_empty() {
        0
    } else {
        (total_views as f64 / videos.len() as f64).round() as i64
    };

    let mut best: Option<&VideoMetadata> = None;
    for video in videos {
        if best.map_or(true, |b| video.metadata.view_count > b.view_count) {
            best = Some(&video.metadata);
        }
    }

    vec![
        SummaryMetric::new("Total Videos", Cell::Int(videos.len() as i64)),
        SummaryMetric::new("Total Views", Cell::Int(total_views)),
        SummaryMetric::new("Average Views per Video", Cell::Int(avg_views)),
        SummaryMetric::new(
            "Best Performing Video",
            best.map_or(Cell::Empty, |b| Cell::text(&b.title)),
        ),
        SummaryMetric::new(
            "Best Video Views",
            best.map_or(Cell::Empty, |b| Cell::Int(b.view_count)),
        ),
        SummaryMetric::new(
            "Genesis Date",
            since.map_or(Cell::Empty, |d| Cell::Text(d.format("%Y-%m-%d").to_string())),
        ),
        SummaryMetric::new(
            "Analysis Date",
            Cell::Text(analysis_date.format("%Y-%m-%d").to_string()),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PerformanceTier;
    use crate::services::classifier::Classification;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn video(id: &str, title: &str) -> VideoMetadata {
        VideoMetadata {
            video_id: id.to_string(),
            title: title.to_string(),
            publish_date: "2024-01-15".to_string(),
            ..Default::default()
        }
    }

    fn window(id: &str, views: f64) -> PerformanceWindow {
        PerformanceWindow {
            video_id: id.to_string(),
            views,
            watch_time: views / 2.0,
            avg_view_duration: 60.0,
            avg_view_percentage: 40.0,
        }
    }

    fn reconciler() -> Reconciler {
        Reconciler::new(ContentClassifier::default(), BaselinePolicy::Dynamic)
    }

    fn ids(result: &Reconciliation) -> Vec<&str> {
        result.videos.iter().map(|v| v.video_id()).collect()
    }

    #[test]
    fn video_without_performance_gets_zeroed_fields() {
        let result = reconciler().reconcile(&[video("v1", "Scrum Tips")], &[], "2024-02-01");

        assert_eq!(result.videos.len(), 1);
        let record = &result.videos[0];
        assert_eq!(record.video_id(), "v1");
        assert_eq!(record.views_7d, 0.0);
        assert_eq!(record.watch_time_7d, 0.0);
        assert_eq!(record.content_pillar, "Agilité");
        assert_eq!(record.performance_tier, PerformanceTier::D);
        assert_eq!(record.last_updated, "2024-02-01");
    }

    #[test]
    fn one_record_per_metadata_entry_whatever_the_coverage() {
        let metadata = vec![video("a", "x"), video("b", "y"), video("c", "z")];

        let empty = reconciler().reconcile(&metadata, &[], "t");
        let partial = reconciler().reconcile(&metadata, &[window("b", 10.0)], "t");
        let wider = reconciler().reconcile(
            &metadata,
            &[window("zz", 5.0), window("c", 1.0), window("a", 2.0), window("b", 3.0)],
            "t",
        );

        for result in [&empty, &partial, &wider] {
            assert_eq!(ids(result), vec!["a", "b", "c"]);
            assert_eq!(result.taxonomy.len(), 3);
        }
        assert_eq!(partial.videos[1].views_7d, 10.0);
        assert_eq!(partial.videos[0].views_7d, 0.0);
        assert_eq!(wider.videos[2].views_7d, 1.0);
    }

    #[test]
    fn duplicate_performance_rows_do_not_duplicate_records() {
        let result = reconciler().reconcile(
            &[video("a", "x")],
            &[window("a", 10.0), window("a", 99.0)],
            "t",
        );
        assert_eq!(result.videos.len(), 1);
        assert_eq!(result.videos[0].views_7d, 10.0);
    }

    #[test]
    fn dynamic_baselines_rank_within_the_batch() {
        let metadata = vec![video("hit", "x"), video("flop", "y")];
        let performance = vec![window("hit", 1000.0), window("flop", 10.0)];
        let result = reconciler().reconcile(&metadata, &performance, "t");

        assert_eq!(result.videos[0].performance_tier, PerformanceTier::B);
        assert_eq!(result.videos[1].performance_tier, PerformanceTier::D);
    }

    #[test]
    fn fixed_baselines_are_used_verbatim() {
        let reconciler = Reconciler::new(
            ContentClassifier::default(),
            BaselinePolicy::Fixed(Baselines {
                avg_views: 100.0,
                avg_watch_time: 50.0,
                avg_retention: 40.0,
            }),
        );
        let result = reconciler.reconcile(&[video("a", "x")], &[window("a", 250.0)], "t");
        // 0.4 * 2.5 + 0.3 * 2.5 + 0.3 * 1.0
        assert_eq!(result.videos[0].performance_score, 2.05);
        assert_eq!(result.videos[0].performance_tier, PerformanceTier::A);
    }

    #[test]
    fn taxonomy_mirrors_the_pillar() {
        let result = reconciler().reconcile(&[video("v1", "Scrum et Jira ?")], &[], "t");
        let taxonomy = &result.taxonomy[0];
        assert_eq!(taxonomy.primary_topic, result.videos[0].content_pillar);
        assert_eq!(taxonomy.secondary_topics, vec!["Outils".to_string()]);
        assert_eq!(taxonomy.hook_type, "Question");
        assert_eq!(taxonomy.publication_day, "Monday");
    }

    #[test]
    fn engagement_rate_handles_zero_views() {
        let mut v = video("a", "x");
        assert_eq!(engagement_rate(&v), 0.0);
        v.view_count = 400;
        v.like_count = 10;
        v.comment_count = 3;
        assert_eq!(engagement_rate(&v), 3.25);
    }

    #[test]
    fn pillar_summary_orders_by_total_views() {
        let mut a = video("a", "Scrum");
        a.view_count = 100;
        let mut b = video("b", "Kanban");
        b.view_count = 300;
        let mut c = video("c", "Jira");
        c.view_count = 1000;
        let result = reconciler().reconcile(&[a, b, c], &[], "t");

        let summary = summarize_pillars(&result.videos);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].content_pillar, "Outils");
        assert_eq!(summary[1].content_pillar, "Agilité");
        assert_eq!(summary[1].video_count, 2);
        assert_eq!(summary[1].total_views, 400);
        assert_eq!(summary[1].avg_views, 200.0);
    }

    struct CountingClassifier {
        calls: AtomicUsize,
    }

    impl VideoClassifier for CountingClassifier {
        fn classify_video(&self, video: &VideoMetadata) -> Classification {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ContentClassifier::default().classify(video)
        }
    }

    #[test]
    fn classifier_and_scorer_run_once_per_record() {
        let classifier = CountingClassifier {
            calls: AtomicUsize::new(0),
        };
        let reconciler = Reconciler::new(classifier, BaselinePolicy::Dynamic);
        let metadata = vec![video("v1", "Scrum"), video("v2", "Jira"), video("v3", "Focus")];
        let performance = vec![window("v1", 300.0), window("v1", 900.0), window("v3", 30.0)];

        let result = reconciler.reconcile(&metadata, &performance, "2024-02-01");

        assert_eq!(reconciler.classifier.calls.load(Ordering::SeqCst), 3);
        let joined = vec![window("v1", 300.0), PerformanceWindow::empty("v2"), window("v3", 30.0)];
        let scorer = PerformanceScorer::new(Baselines::from_windows(&joined));
        for (record, window) in result.videos.iter().zip(&joined) {
            let expected = scorer.score(window);
            assert_eq!(record.performance_score, round2(expected.value));
            assert_eq!(record.performance_tier, expected.tier);
        }
    }

    fn enriched(title: &str, view_count: i64) -> EnrichedVideoRecord {
        let mut metadata = video(title, title);
        metadata.view_count = view_count;
        reconciler()
            .reconcile(&[metadata], &[], "2024-02-01")
            .videos
            .remove(0)
    }

    fn summary_value<'a>(summary: &'a [SummaryMetric], metric: &str) -> &'a Cell {
        &summary.iter().find(|m| m.metric == metric).unwrap().value
    }

    #[test]
    fn channel_summary_totals_and_best_video() {
        let videos = vec![enriched("A", 100), enriched("B", 250), enriched("C", 250)];
        let since = NaiveDate::from_ymd_opt(2020, 11, 16);
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();

        let summary = summarize_channel(&videos, since, today);

        assert_eq!(summary.len(), 7);
        assert_eq!(summary_value(&summary, "Total Videos"), &Cell::Int(3));
        assert_eq!(summary_value(&summary, "Total Views"), &Cell::Int(600));
        assert_eq!(summary_value(&summary, "Average Views per Video"), &Cell::Int(200));
        // first of the tied videos wins
        assert_eq!(summary_value(&summary, "Best Performing Video"), &Cell::text("B"));
        assert_eq!(summary_value(&summary, "Best Video Views"), &Cell::Int(250));
        assert_eq!(summary_value(&summary, "Genesis Date"), &Cell::text("2020-11-16"));
        assert_eq!(summary_value(&summary, "Analysis Date"), &Cell::text("2024-06-10"));
        assert_eq!(summary[0].to_row(), vec![Cell::text("Total Videos"), Cell::Int(3)]);
    }

    #[test]
    fn channel_summary_without_videos() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();

        let summary = summarize_channel(&[], None, today);

        assert_eq!(summary_value(&summary, "Total Videos"), &Cell::Int(0));
        assert_eq!(summary_value(&summary, "Average Views per Video"), &Cell::Int(0));
        assert_eq!(summary_value(&summary, "Best Performing Video"), &Cell::Empty);
        assert_eq!(summary_value(&summary, "Best Video Views"), &Cell::Empty);
        assert_eq!(summary_value(&summary, "Genesis Date"), &Cell::Empty);
    }
}
