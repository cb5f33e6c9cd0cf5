// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use regex::Regex;
use std::sync::OnceLock;

fn ansi_escape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("static ANSI regex is valid")
    })
}

/// Strip ANSI CSI/OSC escape sequences from a chunk of terminal output.
pub fn strip_ansi(text: &str) -> String {
    ansi_escape_re().replace_all(text, "").into_owned()
}

/// Clean raw PTY output for a single command per the sanitization rules:
/// strip ANSI, strip every occurrence of the end-marker (not just the
/// trailing one), drop a leading line that echoes the command, drop the
/// `echo '<marker>'` line itself, trim trailing whitespace.
pub fn clean_output(raw: &str, command: &str, marker: &str) -> String {
    let text = strip_ansi(raw);
    let text = text.replace(marker, "");

    let echo_double = format!("echo \"{marker}\"");
    let echo_single = format!("echo '{marker}'");

    let mut cleaned_lines: Vec<&str> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if i == 0 && command_echoed(line, command) {
            continue;
        }
        if line.contains(&echo_single) || line.contains(&echo_double) {
            continue;
        }
        cleaned_lines.push(line);
    }

    cleaned_lines.join("\n").trim_end().to_string()
}

fn command_echoed(line: &str, command: &str) -> bool {
    !command.is_empty() && line.contains(command)
}
