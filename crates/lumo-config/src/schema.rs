// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_timeout_secs() -> u64 {
    120
}

/// Connection settings for the opaque `LlmClient` dependency.
///
/// Every field mirrors one of the environment variables named in the
/// orchestration engine's external-interface contract (`LLM_BASE_URL`,
/// `LLM_API_KEY`, `LLM_MODEL`, `LLM_TIMEOUT`); the env vars always win over a
/// config file, matching the layering `load()` performs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key. Prefer setting LLM_API_KEY in the environment over committing
    /// this to a config file.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_max_replans() -> u32 {
    3
}
fn default_max_iterations() -> u32 {
    20
}
fn default_completion_threshold() -> f32 {
    0.7
}

/// Tunables for the orchestrator's bounded counters and goal-completion
/// heuristic. `completion_threshold` exposes the "mostly done" cutoff used
/// by the unparseable-evaluation fallback as a tunable rather than a
/// hardcoded constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_replans")]
    pub max_replans: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Fraction of steps that must be `done` for the unparseable-evaluation
    /// fallback to consider the goal completed.
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            max_replans: default_max_replans(),
            max_iterations: default_max_iterations(),
            completion_threshold: default_completion_threshold(),
        }
    }
}

fn default_secs_default() -> u64 {
    60
}
fn default_secs_package() -> u64 {
    180
}
fn default_secs_systemctl() -> u64 {
    60
}
fn default_secs_build() -> u64 {
    300
}

/// Per-command-class timeout table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_secs_default")]
    pub default_secs: u64,
    #[serde(default = "default_secs_package")]
    pub package_secs: u64,
    #[serde(default = "default_secs_systemctl")]
    pub systemctl_secs: u64,
    #[serde(default = "default_secs_build")]
    pub build_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default_secs: default_secs_default(),
            package_secs: default_secs_package(),
            systemctl_secs: default_secs_systemctl(),
            build_secs: default_secs_build(),
        }
    }
}

fn default_shell_path() -> String {
    "/bin/bash".into()
}
fn default_poll_chunk_ms() -> u64 {
    2000
}

/// ShellSession runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_path")]
    pub shell_path: String,
    /// Size of each polling read window while waiting for the end-marker.
    #[serde(default = "default_poll_chunk_ms")]
    pub poll_chunk_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            shell_path: default_shell_path(),
            poll_chunk_ms: default_poll_chunk_ms(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
