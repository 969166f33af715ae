//! Process configuration (spec §6 "Environment").
//!
//! Loaded once at startup from environment variables, with `.env` support via
//! `dotenvy` for local development, matching the teacher's `crate::config::
//! Config` convention of a single struct constructed before the router and
//! threaded through as shared state.

use std::time::Duration;

use crate::csm::CsmConfig;

/// Default listening port (spec §6: "baseline 8083").
const DEFAULT_PORT: u16 = 8083;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub csm: CsmConfig,
}

impl Config {
    /// Load from the process environment, falling back to the spec's
    /// wire-visible defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: env_u16("PORT", DEFAULT_PORT),
            csm: CsmConfig {
                no_answer_timeout: env_duration_secs("CSM_NO_ANSWER_TIMEOUT_SECS", 60),
                offer_stall_timeout: env_duration_secs("CSM_OFFER_STALL_TIMEOUT_SECS", 10),
                candidate_ttl: env_duration_secs("CSM_CANDIDATE_TTL_SECS", 60),
                sweep_interval: env_duration_secs("CSM_SWEEP_INTERVAL_SECS", 5),
            },
        }
    }

    /// Configuration for tests, independent of the process environment
    /// (matches the teacher's `Config::default_for_test` convention).
    pub fn default_for_test() -> Self {
        Self {
            port: 0,
            csm: CsmConfig::default(),
        }
    }
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
