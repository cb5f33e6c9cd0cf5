// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The safety gate and output-scanning tables.
//!
//! The Planner's pre-filter and the Executor's catastrophic-command gate
//! are deliberately separate, overlapping lists: the executor is
//! authoritative, since it sees the exact command text after any
//! transformation a repair step may have introduced.

use std::sync::OnceLock;

use regex::Regex;

/// Fragments that mark a planner/repair line as containing an unfilled
/// template placeholder rather than a concrete command.
pub const PLACEHOLDER_FRAGMENTS: &[&str] = &[
    "/path/to",
    "xxx",
    "用户名",
    "文件名",
    "目录名",
    "服务名",
    "包名",
    "your_",
    "YOUR_",
    "[name]",
    "{name}",
];

/// Literal patterns the Planner rejects outright, before a command ever
/// reaches the Executor's authoritative gate.
pub const PLANNER_CATASTROPHIC_LITERALS: &[&str] = &[
    "rm -rf /",
    "rm -rf /*",
    "rm -fr /",
    "rm -fr /*",
    "> /dev/sda",
    "mkfs.",
    "dd if=",
    ":(){:|:&};:",
];

pub fn contains_placeholder(command: &str) -> bool {
    PLACEHOLDER_FRAGMENTS.iter().any(|p| command.contains(p))
}

pub fn is_planner_catastrophic(command: &str) -> bool {
    PLANNER_CATASTROPHIC_LITERALS
        .iter()
        .any(|p| command.contains(p))
}

const CRITICAL_ROOTS: &[&str] = &["/bin", "/sbin", "/usr", "/lib", "/lib64", "/boot", "/etc"];

fn rm_recursive_root_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\brm\s+(?:-\w*\s+)*-(?:r|rf|fr)\b.*?(\S+)").expect("static regex is valid")
    })
}

fn mkfs_dev_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bmkfs(?:\.\w+)?\s+.*?/dev/\S+").expect("static regex is valid"))
}

fn dd_dev_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bdd\b.*?\bof=/dev/\S+").expect("static regex is valid"))
}

fn redirect_dev_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">\s*/dev/(?:sd|nvme)\S*").expect("static regex is valid"))
}

/// The Executor's last line of defense. Blocks a command independent of
/// whether it already passed the Planner's pre-filter.
pub fn is_catastrophic(command: &str) -> bool {
    let trimmed = command.trim();

    if trimmed.contains(":(){") || trimmed.contains(":()") {
        return true;
    }

    if let Some(caps) = rm_recursive_root_re().captures(trimmed) {
        if let Some(target) = caps.get(1) {
            let target = target.as_str().trim_end_matches('/');
            if target == "" || target == "/" {
                return true;
            }
            if CRITICAL_ROOTS.contains(&target) {
                return true;
            }
        }
    }

    if mkfs_dev_re().is_match(trimmed) {
        return true;
    }
    if dd_dev_re().is_match(trimmed) {
        return true;
    }
    if redirect_dev_re().is_match(trimmed) {
        return true;
    }

    false
}

/// Tokens checked first; any match marks the step's output successful
/// regardless of any fatal-error pattern also present.
pub const SUCCESS_PATTERNS: &[&str] = &[
    "complete!",
    "successfully",
    "is already installed",
    "already the newest version",
    "nothing to do",
    "is newest version",
    "active: active (running)",
    "active (running)",
    "active (exited)",
    "enabled",
    "created symlink",
    "loaded: loaded",
    "dependencies resolved",
    "running transaction",
    "installed:",
    "upgraded:",
];

/// Fatal-error literal/regex patterns, applied to lowercased output after
/// the success whitelist has been checked and found not to match.
pub fn fatal_error_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        const RAW: &[&str] = &[
            "command not found",
            "no such file or directory",
            "permission denied",
            "operation not permitted",
            "unable to locate package",
            "no package .* available",
            "e: unable to",
            "e: package",
            "fatal:",
            "cannot allocate memory",
            "no space left on device",
            "read-only file system",
            "unit .* not found",
            "failed to start",
            "failed to enable",
            "job for .* failed",
        ];
        RAW.iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

pub const WARNING_PATTERNS: &[&str] = &["warning:", "warn", "deprecated", "obsolete"];

/// Checks `raw_output` (pre-lowercased internally) for a success token
/// first, then a fatal-error pattern. Returns `Some(message)` when a fatal
/// pattern fires and no success token preempted it.
pub fn scan_output_for_error(raw_output: &str) -> Option<String> {
    let lower = raw_output.to_lowercase();

    if SUCCESS_PATTERNS.iter().any(|p| lower.contains(p)) {
        return None;
    }

    let fatal = fatal_error_patterns().iter().any(|re| re.is_match(&lower));
    if !fatal {
        // Fall back to literal match in case a pattern failed to compile —
        // never crash the executor over a malformed table entry.
        const LITERAL_FALLBACK: &[&str] = &["command not found", "permission denied", "fatal:"];
        if !LITERAL_FALLBACK.iter().any(|p| lower.contains(p)) {
            return None;
        }
    }

    Some(extract_error_message(raw_output))
}

/// First line containing any diagnostic keyword, truncated to 200 chars;
/// else the last three lines joined, truncated to 300.
pub fn extract_error_message(output: &str) -> String {
    const KEYWORDS: &[&str] = &["error", "failed", "denied", "not found", "unable", "cannot"];

    for line in output.lines() {
        let lower = line.to_lowercase();
        if KEYWORDS.iter().any(|k| lower.contains(k)) {
            return truncate_chars(line.trim(), 200);
        }
    }

    let tail: Vec<&str> = output.lines().rev().take(3).collect::<Vec<_>>().into_iter().rev().collect();
    truncate_chars(&tail.join("\n"), 300)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
