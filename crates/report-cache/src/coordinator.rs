//! Cache Coordinator: the single writer of the artifact store
use chrono::Utc;
use report_core::{CacheKey, CachedArtifact, OptionSet, ReportData, ReportDefinition, ReportError};
use report_registry::ReportRegistry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::clock::next_timestamp;
use crate::locks::{KeyGuard, KeyLocks};
use crate::store::{ArtifactStore, MemoryStore};

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on one generator run.
    pub generation_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(60),
        }
    }
}

/// Where a returned artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Already stored, no lock taken
    Hit,
    /// Produced by another caller while this one waited for the key lock
    Coalesced,
    /// Produced by this call
    Generated,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Hit => "hit",
            Source::Coalesced => "coalesced",
            Source::Generated => "generated",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub artifact: Arc<CachedArtifact>,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmSummary {
    pub refreshed: usize,
    pub failed: usize,
}

pub struct CacheCoordinator {
    store: Arc<dyn ArtifactStore>,
    locks: KeyLocks,
    config: CacheConfig,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn ArtifactStore>, config: CacheConfig) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
            config,
        }
    }

    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// The stable key for a report and its options.
    pub fn key_get(&self, definition: &ReportDefinition, options: &OptionSet) -> CacheKey {
        CacheKey::new(definition, options)
    }

    /// Stored artifact, if any, without generating.
    pub fn peek(&self, definition: &ReportDefinition, options: &OptionSet) -> Option<Arc<CachedArtifact>> {
        self.store.get(&CacheKey::new(definition, options))
    }

    /// Read, generating on a miss.
    pub async fn data_get(
        &self,
        definition: &ReportDefinition,
        options: &OptionSet,
    ) -> Result<Fetched, ReportError> {
        self.get_or_refresh(definition, options, false).await
    }

    /// Regenerate regardless of what is stored. Authorization is the
    /// caller's job and must happen before this.
    pub async fn refresh(
        &self,
        definition: &ReportDefinition,
        options: &OptionSet,
    ) -> Result<Fetched, ReportError> {
        self.get_or_refresh(definition, options, true).await
    }

    /// Return the stored artifact, or generate and publish one. With
    /// `force_refresh` the stored artifact is ignored.
    pub async fn get_or_refresh(
        &self,
        definition: &ReportDefinition,
        options: &OptionSet,
        force_refresh: bool,
    ) -> Result<Fetched, ReportError> {
        let key = CacheKey::new(definition, options);

        if !force_refresh {
            if let Some(artifact) = self.store.get(&key) {
                debug!(key = %key, "cache hit");
                return Ok(Fetched {
                    artifact,
                    source: Source::Hit,
                });
            }
        }

        let requested_at = Utc::now();
        let guard = self.locks.acquire(key.as_str()).await;

        let previous = self.store.get(&key);
        if let Some(prev) = &previous {
            // Someone published while we waited. For a forced refresh that
            // only counts if it was published after our request.
            if !force_refresh || prev.generated_at > requested_at {
                debug!(key = %key, "coalesced into concurrent generation");
                return Ok(Fetched {
                    artifact: Arc::clone(prev),
                    source: Source::Coalesced,
                });
            }
        }

        let started = Instant::now();
        let (data, _guard) = self.generate(definition, options, guard).await.map_err(|err| {
            warn!(key = %key, error = %err, "generation failed, keeping previous artifact");
            err
        })?;

        let artifact = Arc::new(CachedArtifact {
            key: key.clone(),
            data,
            generated_at: next_timestamp(previous.as_ref().map(|prev| prev.generated_at)),
        });
        self.store.put(key.clone(), Arc::clone(&artifact));

        info!(
            key = %key,
            rows = artifact.data.table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            generated_at = %artifact.generated_at,
            "report generated"
        );

        Ok(Fetched {
            artifact,
            source: Source::Generated,
        })
    }

    /// Refresh every option combination of every registered report.
    pub async fn warm_all(&self, registry: &ReportRegistry) -> WarmSummary {
        let mut summary = WarmSummary::default();
        for definition in registry.list() {
            for options in definition.option_combinations() {
                match self.refresh(definition, &options).await {
                    Ok(_) => summary.refreshed += 1,
                    Err(err) => {
                        warn!(report = %definition.id(), error = %err, "warm-up generation failed");
                        summary.failed += 1;
                    }
                }
            }
        }
        info!(refreshed = summary.refreshed, failed = summary.failed, "cache warm-up done");
        summary
    }

    /// Number of published artifacts.
    pub fn stored(&self) -> usize {
        self.store.len()
    }

    /// Keys currently being generated or waited on.
    pub fn inflight(&self) -> usize {
        self.locks.len()
    }

    /// Runs the generator on the blocking pool. The key guard travels with
    /// the generator and comes back only on completion, so a caller that
    /// times out or is dropped leaves the key locked until the generator
    /// really returns.
    async fn generate(
        &self,
        definition: &ReportDefinition,
        options: &OptionSet,
        guard: KeyGuard,
    ) -> Result<(ReportData, KeyGuard), ReportError> {
        let generator = Arc::clone(definition.generator());
        let report_id = definition.id().to_string();
        let options = options.clone();
        let task = tokio::task::spawn_blocking(move || {
            let result = generator.generate(&report_id, &options);
            (result, guard)
        });

        match tokio::time::timeout(self.config.generation_timeout, task).await {
            Err(_) => Err(ReportError::GenerationTimedOut(
                self.config.generation_timeout.as_millis() as u64,
            )),
            Ok(Err(join_err)) => Err(ReportError::GenerationFailed(format!(
                "generator aborted: {}",
                join_err
            ))),
            Ok(Ok((result, guard))) => result.map(|data| (data, guard)).map_err(ReportError::from),
        }
    }
}
