//! Per-framework × category summaries of a run

use crate::types::{DocumentCategory, ExtractionOutcome, ExtractionStatus};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Timing statistics over successful extractions, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStatistics {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation (0 for a single value)
    pub std_dev: f64,
    pub sample_count: usize,
}

/// Median of `values` (sorted in place)
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Calculate timing statistics, or `None` for an empty slice
pub fn calculate_statistics(times: &[f64]) -> Option<TimingStatistics> {
    if times.is_empty() {
        return None;
    }

    let count = times.len() as f64;
    let mean = times.iter().sum::<f64>() / count;
    let min = times.iter().copied().fold(f64::INFINITY, f64::min);
    let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let std_dev = if times.len() > 1 {
        let variance = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / (count - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    let mut sorted = times.to_vec();
    Some(TimingStatistics {
        mean,
        median: median(&mut sorted),
        min,
        max,
        std_dev,
        sample_count: times.len(),
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Summary record for one framework and category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub framework: String,
    pub category: DocumentCategory,

    pub total_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    pub partial_files: usize,
    pub timeout_files: usize,
    pub skipped_files: usize,

    pub timing: Option<TimingStatistics>,
    pub avg_peak_memory_mb: Option<f64>,
    pub avg_cpu_percent: Option<f64>,
    pub files_per_second: Option<f64>,
    pub mb_per_second: Option<f64>,
    pub success_rate: f64,

    pub avg_character_count: Option<usize>,
    pub avg_word_count: Option<usize>,
}

impl BenchmarkSummary {
    /// Summarize outcomes that all share one framework and category
    pub fn from_outcomes(framework: &str, category: DocumentCategory, outcomes: &[&ExtractionOutcome]) -> Self {
        let count = |status: ExtractionStatus| outcomes.iter().filter(|o| o.status() == status).count();
        let successful: Vec<&ExtractionOutcome> = outcomes.iter().copied().filter(|o| o.is_success()).collect();

        let times: Vec<f64> = successful.iter().map(|o| o.extraction_time).collect();
        let timing = calculate_statistics(&times);

        let total_time: f64 = times.iter().sum();
        let total_mb = successful.iter().map(|o| o.file_size as f64).sum::<f64>() / BYTES_PER_MB;
        let (files_per_second, mb_per_second) = if successful.is_empty() {
            (None, None)
        } else if total_time > 0.0 {
            (Some(successful.len() as f64 / total_time), Some(total_mb / total_time))
        } else {
            (Some(0.0), Some(0.0))
        };

        Self {
            framework: framework.to_string(),
            category,
            total_files: outcomes.len(),
            successful_files: successful.len(),
            failed_files: count(ExtractionStatus::Failed),
            partial_files: count(ExtractionStatus::Partial),
            timeout_files: count(ExtractionStatus::Timeout),
            skipped_files: count(ExtractionStatus::Skipped),
            timing,
            avg_peak_memory_mb: mean(successful.iter().map(|o| o.peak_memory_mb)),
            avg_cpu_percent: mean(successful.iter().map(|o| o.avg_cpu_percent)),
            files_per_second,
            mb_per_second,
            success_rate: if outcomes.is_empty() {
                0.0
            } else {
                successful.len() as f64 / outcomes.len() as f64
            },
            avg_character_count: mean(
                successful
                    .iter()
                    .filter_map(|o| o.character_count)
                    .filter(|c| *c > 0)
                    .map(|c| c as f64),
            )
            .map(|m| m as usize),
            avg_word_count: mean(
                successful
                    .iter()
                    .filter_map(|o| o.word_count)
                    .filter(|c| *c > 0)
                    .map(|c| c as f64),
            )
            .map(|m| m as usize),
        }
    }
}

impl fmt::Display for BenchmarkSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}: {} succeeded, {} failed, {} timed out",
            self.framework, self.category, self.successful_files, self.failed_files, self.timeout_files
        )?;
        if self.skipped_files > 0 {
            write!(f, ", {} skipped", self.skipped_files)?;
        }
        if let Some(timing) = &self.timing {
            write!(f, " (mean {:.3}s, median {:.3}s)", timing.mean, timing.median)?;
        }
        Ok(())
    }
}

/// Group outcomes by (framework, category) in first-seen order and summarize each group
pub fn summarize(outcomes: &[ExtractionOutcome]) -> Vec<BenchmarkSummary> {
    let mut groups: IndexMap<(&str, DocumentCategory), Vec<&ExtractionOutcome>> = IndexMap::new();
    for outcome in outcomes {
        groups
            .entry((outcome.framework.as_str(), outcome.category))
            .or_default()
            .push(outcome);
    }

    groups
        .into_iter()
        .map(|((framework, category), group)| BenchmarkSummary::from_outcomes(framework, category, &group))
        .collect()
}
