// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority. Later files override earlier ones; environment variables
/// override all of them.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/lumo-agent/config.yaml"));
    paths.push(PathBuf::from("/etc/lumo-agent/config.yml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/lumo-agent/config.yaml"));
        paths.push(home.join(".config/lumo-agent/config.yml"));
    }
    if let Some(cfg) = dirs::config_dir() {
        paths.push(cfg.join("lumo-agent/config.yaml"));
        paths.push(cfg.join("lumo-agent/config.yml"));
    }

    paths.push(PathBuf::from(".lumo-agent/config.yaml"));
    paths.push(PathBuf::from(".lumo-agent/config.yml"));
    paths.push(PathBuf::from("lumo-agent.yaml"));
    paths.push(PathBuf::from("lumo-agent.yml"));

    paths
}

/// Load configuration by merging all discovered YAML files, an optional
/// explicit path (e.g. a `--config` CLI flag), and finally the `LLM_*`
/// environment variables named in the engine's external interface.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty())
    {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Environment variables win over every file layer, matching the
/// statement that `LLM_BASE_URL`/`LLM_API_KEY`/`LLM_MODEL`/`LLM_TIMEOUT` are
/// the baseline configuration contract.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("LLM_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Ok(v) = std::env::var("LLM_API_KEY") {
        config.llm.api_key = v;
    }
    if let Ok(v) = std::env::var("LLM_MODEL") {
        config.llm.model = v;
    }
    if let Ok(v) = std::env::var("LLM_TIMEOUT") {
        if let Ok(secs) = v.parse() {
            config.llm.timeout_secs = secs;
        }
    }
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
