use serde::Deserialize;

/// Fallback policy engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackConfig {
    /// Maximum attempts per request, including the primary
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wall-clock budget in seconds across all attempts
    #[serde(default = "default_budget_seconds")]
    pub budget_seconds: u64,
    /// Circuit breaker settings for provider health tracking
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Model catalog that `auto` fallback selects candidates from
    #[serde(default)]
    pub catalog: Vec<ModelCatalogEntry>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            budget_seconds: default_budget_seconds(),
            circuit_breaker: CircuitBreakerConfig::default(),
            catalog: Vec::new(),
        }
    }
}

/// One model the `auto` fallback policy may substitute
///
/// Tiers are ordinal buckets: price tier 1 is the most expensive,
/// speed tier 1 the fastest. Permissiveness is a 0.0-1.0 score of how
/// rarely the model's safety layer refuses borderline content.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelCatalogEntry {
    /// Provider name (key in the provider table)
    pub provider: String,
    /// Model identifier on that provider
    pub model: String,
    /// Price bucket (1 = premium)
    pub price_tier: u8,
    /// Speed bucket (1 = fastest)
    pub speed_tier: u8,
    /// How permissive the model's moderation historically is (0.0-1.0)
    #[serde(default = "default_permissiveness")]
    pub permissiveness: f64,
    /// Whether the model supports native structured output
    #[serde(default)]
    pub structured_output: bool,
}

/// Circuit breaker configuration for provider health tracking
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Errors within the window before the circuit opens
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Error-counting window in seconds
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds before an open circuit allows a probe request
    #[serde(default = "default_recovery_seconds")]
    pub recovery_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold: default_error_threshold(),
            window_seconds: default_window_seconds(),
            recovery_seconds: default_recovery_seconds(),
        }
    }
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_budget_seconds() -> u64 {
    60
}

const fn default_permissiveness() -> f64 {
    0.5
}

const fn default_error_threshold() -> u32 {
    5
}

const fn default_window_seconds() -> u64 {
    60
}

const fn default_recovery_seconds() -> u64 {
    30
}
