// /////////////////////////////////////////////////////////////////////////////
// Video Commerce Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Metrics
//!
//! Prometheus counters and histograms for job outcomes and per-processor
//! step timing. One service instance is created at startup and shared; the
//! registry is exposed for scraping or text-format dumps.

use prometheus::{
    CounterVec, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

use commerce_pipeline_domain::PipelineError;

/// Prometheus-backed metrics service.
pub struct MetricsService {
    registry: Registry,
    jobs_total: CounterVec,
    job_duration_seconds: Histogram,
    step_duration_seconds: HistogramVec,
}

impl MetricsService {
    pub fn new() -> Result<Self, PipelineError> {
        let registry = Registry::new();

        let jobs_total = CounterVec::new(
            Opts::new("pipeline_jobs_total", "Jobs by terminal outcome"),
            &["outcome"],
        )
        .map_err(metrics_err)?;
        let job_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("pipeline_job_duration_seconds", "End-to-end job duration")
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )
        .map_err(metrics_err)?;
        let step_duration_seconds = HistogramVec::new(
            HistogramOpts::new("pipeline_step_duration_seconds", "Per-processor step duration")
                .buckets(vec![0.05, 0.25, 1.0, 5.0, 15.0, 60.0, 180.0]),
            &["processor"],
        )
        .map_err(metrics_err)?;

        registry
            .register(Box::new(jobs_total.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(job_duration_seconds.clone()))
            .map_err(metrics_err)?;
        registry
            .register(Box::new(step_duration_seconds.clone()))
            .map_err(metrics_err)?;

        Ok(Self {
            registry,
            jobs_total,
            job_duration_seconds,
            step_duration_seconds,
        })
    }

    /// Records a terminal job outcome and its duration.
    pub fn record_job(&self, outcome: &str, duration_secs: f64) {
        self.jobs_total.with_label_values(&[outcome]).inc();
        self.job_duration_seconds.observe(duration_secs);
    }

    /// Records one processor step duration.
    pub fn record_step(&self, processor: &str, duration_secs: f64) {
        self.step_duration_seconds
            .with_label_values(&[processor])
            .observe(duration_secs);
    }

    /// Text-format dump of every registered metric.
    pub fn render(&self) -> Result<String, PipelineError> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(metrics_err)
    }
}

fn metrics_err(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::internal(format!("metrics error: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_render() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_job("completed", 12.5);
        metrics.record_job("failed", 2.0);
        metrics.record_step("extract-frames", 0.8);

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("pipeline_jobs_total"));
        assert!(rendered.contains("outcome=\"completed\""));
        assert!(rendered.contains("processor=\"extract-frames\""));
    }
}
