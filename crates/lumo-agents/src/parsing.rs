// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The `title::command` line grammar shared by the Planner and the Repair
//! agent, plus the filters that reject placeholder and catastrophic lines
//! before a step ever reaches [`crate::model::AgentContext::steps`].

use crate::safety::{contains_placeholder, is_planner_catastrophic};

/// One parsed, filtered `title::command` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStep {
    pub title: String,
    pub command: String,
}

/// Parse an LLM response into candidate steps, one per line.
///
/// A line is a candidate only if, after stripping leading list decoration
/// (digits, `.`, `-`, `)`, `*`, spaces), it contains `::`. The first `::`
/// splits `title` from `command`; backticks wrapping the command are
/// stripped. Lines that don't match this shape (blank lines, prose) are
/// silently skipped — they are not errors, just non-step lines the model
/// produced around the plan.
pub fn parse_steps(response: &str) -> Vec<ParsedStep> {
    response
        .lines()
        .filter_map(|line| parse_line(line))
        .collect()
}

fn parse_line(line: &str) -> Option<ParsedStep> {
    let stripped = strip_list_decoration(line);
    if !stripped.contains("::") {
        return None;
    }
    let (title, command) = stripped.split_once("::")?;
    let title = title.trim().to_string();
    let command = strip_backticks(command.trim());
    if title.is_empty() {
        return None;
    }
    Some(ParsedStep { title, command })
}

fn strip_list_decoration(line: &str) -> &str {
    line.trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | ')' | '*' | ' '))
}

fn strip_backticks(command: &str) -> String {
    command.trim_matches('`').to_string()
}

/// Apply the Planner's pre-filter: drop steps with an
/// empty command, an unfilled placeholder, or a literal catastrophic
/// pattern. Returns the surviving steps in order.
pub fn filter_planner_steps(steps: Vec<ParsedStep>) -> Vec<ParsedStep> {
    steps
        .into_iter()
        .filter(|s| !s.command.is_empty())
        .filter(|s| !contains_placeholder(&s.command))
        .filter(|s| !is_planner_catastrophic(&s.command))
        .collect()
}

/// Apply the Repair agent's narrower filter: drop only
/// placeholder lines, keep at most two steps.
pub fn filter_repair_steps(steps: Vec<ParsedStep>) -> Vec<ParsedStep> {
    steps
        .into_iter()
        .filter(|s| !s.command.is_empty())
        .filter(|s| !contains_placeholder(&s.command))
        .take(2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_title_command_line() {
        let steps = parse_steps("显示运行时间::uptime");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title, "显示运行时间");
        assert_eq!(steps[0].command, "uptime");
    }

    #[test]
    fn strips_numbered_list_decoration() {
        let steps = parse_steps("1. Show uptime::uptime");
        assert_eq!(steps[0].title, "Show uptime");
    }

    #[test]
    fn strips_bullet_decoration() {
        let steps = parse_steps("- Show uptime::uptime");
        assert_eq!(steps[0].title, "Show uptime");
    }

    #[test]
    fn strips_backticks_around_command() {
        let steps = parse_steps("Show uptime::`uptime`");
        assert_eq!(steps[0].command, "uptime");
    }

    #[test]
    fn splits_only_on_first_double_colon() {
        let steps = parse_steps("Label::echo a::b");
        assert_eq!(steps[0].command, "echo a::b");
    }

    #[test]
    fn lines_without_double_colon_are_skipped() {
        let steps = parse_steps("Here is my plan:\nShow uptime::uptime\nThat's all.");
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn empty_response_yields_no_steps() {
        assert!(parse_steps("").is_empty());
    }

    #[test]
    fn planner_filter_drops_placeholder_commands() {
        let steps = parse_steps("Copy file::cp /path/to/file /tmp");
        assert!(filter_planner_steps(steps).is_empty());
    }

    #[test]
    fn planner_filter_drops_catastrophic_commands() {
        let steps = parse_steps("Clean up::rm -rf /");
        assert!(filter_planner_steps(steps).is_empty());
    }

    #[test]
    fn planner_filter_keeps_concrete_commands() {
        let steps = parse_steps("Show uptime::uptime\nList files::ls -la");
        assert_eq!(filter_planner_steps(steps).len(), 2);
    }

    #[test]
    fn repair_filter_caps_at_two_steps() {
        let steps = parse_steps("a::echo 1\nb::echo 2\nc::echo 3");
        assert_eq!(filter_repair_steps(steps).len(), 2);
    }

    #[test]
    fn repair_filter_drops_placeholders_but_not_catastrophic() {
        // Repair's filter is narrower than the Planner's —
        // it only drops placeholders, not catastrophic literals (the
        // Executor's gate is the authoritative backstop for those).
        let steps = parse_steps("a::cp /path/to/x /tmp\nb::rm -rf /");
        let filtered = filter_repair_steps(steps);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].command, "rm -rf /");
    }
}
