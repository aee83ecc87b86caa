use crate::models::{PerformanceTier, PerformanceWindow};
use serde::{Deserialize, Serialize};

const VIEWS_WEIGHT: f64 = 0.4;
const ENGAGEMENT_WEIGHT: f64 = 0.3;
const RETENTION_WEIGHT: f64 = 0.3;

/// Channel-wide reference values the per-video metrics are divided by.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    pub avg_views: f64,
    pub avg_watch_time: f64,
    pub avg_retention: f64,
}

impl Baselines {
    /// Mean of each metric over the given windows. An empty batch gives zeros,
    /// which the scorer floors to 1.
    pub fn from_windows<'a>(windows: impl IntoIterator<Item = &'a PerformanceWindow>) -> Self {
        let mut count = 0usize;
        let mut views = 0.0;
        let mut watch_time = 0.0;
        let mut retention = 0.0;

        for window in windows {
            count += 1;
            views += window.views;
            watch_time += window.watch_time;
            retention += window.avg_view_percentage;
        }

        if count == 0 {
            return Baselines {
                avg_views: 0.0,
                avg_watch_time: 0.0,
                avg_retention: 0.0,
            };
        }

        let n = count as f64;
        Baselines {
            avg_views: views / n,
            avg_watch_time: watch_time / n,
            avg_retention: retention / n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BaselinePolicy {
    /// Mean of the current run's records.
    Dynamic,
    Fixed(Baselines),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub value: f64,
    pub tier: PerformanceTier,
}

#[derive(Debug, Clone, Copy)]
pub struct PerformanceScorer {
    baselines: Baselines,
}

impl PerformanceScorer {
    pub fn new(baselines: Baselines) -> Self {
        PerformanceScorer { baselines }
    }

    pub fn baselines(&self) -> Baselines {
        self.baselines
    }

    pub fn score(&self, window: &PerformanceWindow) -> Score {
        let views_ratio = window.views / self.baselines.avg_views.max(1.0);
        let engagement_ratio = window.watch_time / self.baselines.avg_watch_time.max(1.0);
        let retention_ratio = window.avg_view_percentage / self.baselines.avg_retention.max(1.0);

        let value = VIEWS_WEIGHT * views_ratio
            + ENGAGEMENT_WEIGHT * engagement_ratio
            + RETENTION_WEIGHT * retention_ratio;

        // f64::max swallows NaN, so a NaN baseline has to be caught here too.
        let baselines_ok = self.baselines.avg_views.is_finite()
            && self.baselines.avg_watch_time.is_finite()
            && self.baselines.avg_retention.is_finite();

        if !value.is_finite() || !baselines_ok {
            return Score {
                value: 0.0,
                tier: PerformanceTier::C,
            };
        }

        Score {
            value,
            tier: tier_for(value),
        }
    }
}

pub fn tier_for(score: f64) -> PerformanceTier {
    if score >= 2.0 {
        PerformanceTier::A
    } else if score >= 1.2 {
        PerformanceTier::B
    } else if score >= 0.8 {
        PerformanceTier::C
    } else {
        PerformanceTier::D
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(views: f64, watch_time: f64, retention: f64) -> PerformanceWindow {
        PerformanceWindow {
            video_id: "v".to_string(),
            views,
            watch_time,
            avg_view_duration: 0.0,
            avg_view_percentage: retention,
        }
    }

    fn scorer() -> PerformanceScorer {
        PerformanceScorer::new(Baselines {
            avg_views: 100.0,
            avg_watch_time: 50.0,
            avg_retention: 40.0,
        })
    }

    #[test]
    fn weighted_sum_of_ratios() {
        let score = scorer().score(&window(250.0, 100.0, 80.0));
        assert!((score.value - 2.2).abs() < 1e-9);
        assert_eq!(score.tier, PerformanceTier::A);
    }

    #[test]
    fn tier_thresholds() {
        assert_eq!(tier_for(2.5), PerformanceTier::A);
        assert_eq!(tier_for(1.2), PerformanceTier::B);
        assert_eq!(tier_for(1.19), PerformanceTier::C);
        assert_eq!(tier_for(0.8), PerformanceTier::C);
        assert_eq!(tier_for(0.79), PerformanceTier::D);
        assert_eq!(tier_for(0.0), PerformanceTier::D);
    }

    #[test]
    fn zero_baselines_are_floored() {
        let scorer = PerformanceScorer::new(Baselines::from_windows(&[] as &[PerformanceWindow]));
        let score = scorer.score(&window(1.0, 1.0, 1.0));
        assert!((score.value - 1.0).abs() < 1e-9);
        assert_eq!(score.tier, PerformanceTier::C);

        assert_eq!(scorer.score(&window(0.0, 0.0, 0.0)).tier, PerformanceTier::D);
    }

    #[test]
    fn non_numeric_metrics_fall_back_to_third_tier() {
        assert_eq!(scorer().score(&window(f64::NAN, 1.0, 1.0)).tier, PerformanceTier::C);
        assert_eq!(
            scorer().score(&window(f64::INFINITY, 1.0, 1.0)).tier,
            PerformanceTier::C
        );

        let broken = PerformanceScorer::new(Baselines {
            avg_views: f64::NAN,
            avg_watch_time: 1.0,
            avg_retention: 1.0,
        });
        assert_eq!(broken.score(&window(10.0, 1.0, 1.0)).tier, PerformanceTier::C);
    }

    #[test]
    fn dynamic_baselines_are_batch_means() {
        let windows = vec![window(100.0, 10.0, 40.0), window(300.0, 30.0, 60.0)];
        let baselines = Baselines::from_windows(&windows);
        assert_eq!(baselines.avg_views, 200.0);
        assert_eq!(baselines.avg_watch_time, 20.0);
        assert_eq!(baselines.avg_retention, 50.0);
    }
}
