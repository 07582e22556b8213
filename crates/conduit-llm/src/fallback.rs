//! Fallback policy engine
//!
//! Per-request state machine: `INIT -> TRYING(i)` and, on a classified
//! failure, either `TRYING(i+1)` with the next candidate or `ABORT`.
//! Candidate selection for `auto` is keyed by the classified error kind
//! and driven by the configured model catalog; given the same (model,
//! error kind) the proposed candidates are always the same, in the same
//! order.

use std::time::{Duration, Instant};

use conduit_config::{FallbackConfig, ModelCatalogEntry};

use crate::error::{ErrorKind, ProviderFailure};
use crate::types::{FallbackPolicy, ModelRef};

/// A (provider, model) substitution candidate with its selection rationale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Provider name; `None` for explicit-list entries resolved later
    pub provider: Option<String>,
    /// Model identifier
    pub model: String,
    /// Why this candidate was selected
    pub rationale: &'static str,
}

/// Candidate selection engine shared across requests
pub struct FallbackEngine {
    catalog: Vec<ModelCatalogEntry>,
    max_attempts: u32,
    budget: Duration,
}

impl FallbackEngine {
    /// Build the engine from configuration
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            catalog: config.catalog.clone(),
            max_attempts: config.max_attempts.max(1),
            budget: Duration::from_secs(config.budget_seconds),
        }
    }

    /// Start a per-request plan
    pub fn plan(&self, policy: FallbackPolicy) -> FallbackPlan<'_> {
        FallbackPlan {
            engine: self,
            policy,
            attempted: Vec::new(),
            explicit_cursor: 0,
            deadline: Instant::now() + self.budget,
        }
    }

    fn find(&self, provider: &str, model: &str) -> Option<&ModelCatalogEntry> {
        self.catalog
            .iter()
            .find(|e| e.provider == provider && e.model == model)
    }

    /// Ordered `auto` candidates after a classified failure
    ///
    /// Deterministic for a given (provider, model, kind): selection walks
    /// the catalog in configuration order with stable sorts only.
    pub fn auto_candidates(&self, provider: &str, model: &str, kind: ErrorKind) -> Vec<Candidate> {
        let current = self.find(provider, model);
        let mut candidates: Vec<Candidate> = Vec::new();

        let mut push = |entry: &ModelCatalogEntry, rationale: &'static str| {
            if entry.provider == provider && entry.model == model {
                return;
            }
            if candidates
                .iter()
                .any(|c| c.provider.as_deref() == Some(entry.provider.as_str()) && c.model == entry.model)
            {
                return;
            }
            candidates.push(Candidate {
                provider: Some(entry.provider.clone()),
                model: entry.model.clone(),
                rationale,
            });
        };

        match kind {
            ErrorKind::RateLimited => {
                // Same price/speed tier on a different provider
                for entry in &self.catalog {
                    let tier_match = current.is_none_or(|c| {
                        entry.price_tier == c.price_tier && entry.speed_tier == c.speed_tier
                    });
                    if entry.provider != provider && tier_match {
                        push(entry, "same tier, different provider");
                    }
                }
            }
            ErrorKind::StructuredGenerationUnsupported => {
                // Similar price tier with native structured-output support
                let mut with_schema: Vec<&ModelCatalogEntry> =
                    self.catalog.iter().filter(|e| e.structured_output).collect();
                if let Some(c) = current {
                    with_schema.sort_by_key(|e| e.price_tier.abs_diff(c.price_tier));
                }
                for entry in with_schema {
                    push(entry, "native structured output");
                }
            }
            ErrorKind::ContentModerated => {
                // Historically more permissive models first
                let floor = current.map_or(0.0, |c| c.permissiveness);
                let mut permissive: Vec<&ModelCatalogEntry> = self
                    .catalog
                    .iter()
                    .filter(|e| e.permissiveness > floor)
                    .collect();
                permissive.sort_by(|a, b| {
                    b.permissiveness
                        .partial_cmp(&a.permissiveness)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                for entry in permissive {
                    push(entry, "more permissive model");
                }
            }
            ErrorKind::TransientNetwork | ErrorKind::ProviderDown => {
                // Same model on an alternate provider before escalating tiers
                for entry in &self.catalog {
                    if entry.model == model && entry.provider != provider {
                        push(entry, "same model, alternate provider");
                    }
                }
                if let Some(c) = current {
                    for entry in &self.catalog {
                        if entry.price_tier == c.price_tier {
                            push(entry, "same price tier");
                        }
                    }
                }
            }
            // Fail fast: retrying a malformed or unexplainable request
            // cannot help
            ErrorKind::InvalidRequest | ErrorKind::Unknown => {}
        }

        candidates
    }
}

/// Per-request fallback state
pub struct FallbackPlan<'a> {
    engine: &'a FallbackEngine,
    policy: FallbackPolicy,
    attempted: Vec<(String, String)>,
    explicit_cursor: usize,
    deadline: Instant,
}

impl FallbackPlan<'_> {
    /// Record an attempt against a resolved (provider, model) pair
    pub fn record_attempt(&mut self, provider: &str, model: &str) {
        self.attempted.push((provider.to_owned(), model.to_owned()));
    }

    /// Number of attempts made so far
    pub fn attempts(&self) -> u32 {
        u32::try_from(self.attempted.len()).unwrap_or(u32::MAX)
    }

    /// Propose the next candidate after a classified failure
    ///
    /// Returns `None` when the policy, attempt bound, wall-clock budget,
    /// or error kind make the failure terminal. Every transition is
    /// logged with its cause.
    pub fn next(&mut self, failure: &ProviderFailure) -> Option<Candidate> {
        let (provider, model) = self.attempted.last().cloned()?;
        let attempt = self.attempts();

        if !failure.kind.is_recoverable() {
            tracing::warn!(
                attempt,
                %provider,
                %model,
                kind = failure.kind.as_str(),
                "failure is not recoverable, aborting"
            );
            return None;
        }

        if attempt >= self.engine.max_attempts {
            tracing::warn!(
                attempt,
                max_attempts = self.engine.max_attempts,
                kind = failure.kind.as_str(),
                "attempt bound reached, aborting"
            );
            return None;
        }

        if Instant::now() >= self.deadline {
            tracing::warn!(
                attempt,
                kind = failure.kind.as_str(),
                "wall-clock budget exhausted, aborting"
            );
            return None;
        }

        let policy = self.policy.clone();
        let candidate = match policy {
            FallbackPolicy::Never => {
                tracing::debug!(attempt, "fallback policy is never, aborting");
                None
            }
            FallbackPolicy::Explicit(refs) => self.next_explicit(&refs),
            FallbackPolicy::Auto => self
                .engine
                .auto_candidates(&provider, &model, failure.kind)
                .into_iter()
                .find(|c| !self.was_attempted(c)),
        };

        match &candidate {
            Some(c) => {
                tracing::warn!(
                    attempt,
                    from_provider = %provider,
                    from_model = %model,
                    to_provider = c.provider.as_deref().unwrap_or("<unresolved>"),
                    to_model = %c.model,
                    cause = failure.kind.as_str(),
                    rationale = c.rationale,
                    "falling back to next candidate"
                );
            }
            None => {
                tracing::warn!(
                    attempt,
                    %provider,
                    %model,
                    cause = failure.kind.as_str(),
                    "fallback candidates exhausted"
                );
            }
        }

        candidate
    }

    fn next_explicit(&mut self, refs: &[ModelRef]) -> Option<Candidate> {
        while self.explicit_cursor < refs.len() {
            let reference = &refs[self.explicit_cursor];
            self.explicit_cursor += 1;

            let candidate = Candidate {
                provider: reference.provider.clone(),
                model: reference.model.clone(),
                rationale: "explicit fallback list",
            };
            if !self.was_attempted(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn was_attempted(&self, candidate: &Candidate) -> bool {
        self.attempted.iter().any(|(p, m)| {
            m == &candidate.model && candidate.provider.as_ref().is_none_or(|cp| cp == p)
        })
    }
}
