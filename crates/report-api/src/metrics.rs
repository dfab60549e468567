//! Prometheus counters for the report pipeline, served from `/metrics`.
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use report_cache::{Fetched, Source};
use report_core::ReportError;
use report_out::Format;

/// Counters registered in a private registry, one set per service.
pub struct Metrics {
    registry: Registry,
    /// Reads answered without generating
    pub cache_hits: IntCounter,
    /// Reads that generated the artifact themselves
    pub cache_misses: IntCounter,
    /// Generations by outcome: `success`, `coalesced`, `failed`, `timeout`
    pub generations: IntCounterVec,
    /// Successful renders by format
    pub renders: IntCounterVec,
    /// Responses by HTTP status code
    pub responses: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let cache_hits = IntCounter::new(
            "report_cache_hits_total",
            "Reads served from an existing or concurrently generated artifact",
        )?;
        let cache_misses = IntCounter::new(
            "report_cache_misses_total",
            "Reads that had to generate an artifact",
        )?;
        let generations = IntCounterVec::new(
            Opts::new("report_generations_total", "Report generations by outcome"),
            &["outcome"],
        )?;
        let renders = IntCounterVec::new(
            Opts::new("report_renders_total", "Rendered responses by format"),
            &["format"],
        )?;
        let responses = IntCounterVec::new(
            Opts::new("report_responses_total", "Responses by HTTP status"),
            &["status"],
        )?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(generations.clone()))?;
        registry.register(Box::new(renders.clone()))?;
        registry.register(Box::new(responses.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            generations,
            renders,
            responses,
        })
    }

    /// Count the outcome of a cache read or forced refresh.
    pub fn record_fetch(&self, result: &Result<Fetched, ReportError>, forced: bool) {
        match result {
            Ok(fetched) => match fetched.source {
                Source::Hit => self.cache_hits.inc(),
                Source::Coalesced => {
                    if !forced {
                        self.cache_hits.inc();
                    }
                    self.generations.with_label_values(&["coalesced"]).inc();
                }
                Source::Generated => {
                    if !forced {
                        self.cache_misses.inc();
                    }
                    self.generations.with_label_values(&["success"]).inc();
                }
            },
            Err(err) => {
                if !forced {
                    self.cache_misses.inc();
                }
                let outcome = match err {
                    ReportError::GenerationTimedOut(_) => "timeout",
                    _ => "failed",
                };
                self.generations.with_label_values(&[outcome]).inc();
            }
        }
    }

    /// Count one successful render.
    pub fn record_render(&self, format: Format) {
        self.renders.with_label_values(&[format.as_str()]).inc();
    }

    /// Count one response by status code.
    pub fn record_response(&self, status: u16) {
        self.responses
            .with_label_values(&[status.to_string().as_str()])
            .inc();
    }

    /// Text exposition format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
