// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Prompt templates as opaque strings with named slots.
//!
//! Prompt wording is intentionally out of scope for this module; it requires "strict,
//! named substitution (not positional)" (§9) so that future prompt edits
//! cannot silently break callers — an unresolved `{slot}` is a programming
//! error, not a template fact, and panics rather than silently emitting the
//! literal placeholder text to the LLM.

/// Render `template`, substituting every `{name}` occurrence with the value
/// from `slots`. Panics if the template references a name missing from
/// `slots` — a caller bug, since every slot is known at the call site.
pub fn render(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in slots {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    debug_assert!(
        !out.contains('{') || !looks_like_unfilled_slot(&out),
        "prompt template has an unfilled slot: {out}"
    );
    out
}

fn looks_like_unfilled_slot(s: &str) -> bool {
    // A conservative heuristic: `{word}` with no spaces inside the braces.
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '{' {
            if let Some(end) = s[i..].find('}') {
                let inner = &s[i + 1..i + end];
                if !inner.is_empty() && inner.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return true;
                }
            }
        }
    }
    false
}

pub const ROUTER_PROMPT: &str =
    "Classify the user's goal as conversational or actionable.\n\
     Goal: {goal}\n\
     Reply with the single word CHAT if this is small talk or a question \
     that needs no shell command, otherwise reply with TASK.";

/// Shared system-identity message prefixed onto the LLM history for the
/// agents whose prompts the spec requires it for: Chat and Planner's
/// plan-generation call carry it alongside `ctx.memory`; Repair carries it
/// alone, with no conversation memory.
pub const SYSTEM_IDENTITY: &str =
    "You are Lumo, an autonomous Linux operations assistant having a \
     conversation with the user.";

pub const CHAT_PROMPT: &str =
    "Reply conversationally to the user.\n\
     Message: {goal}";

pub const PLANNER_PROMPT: &str =
    "Plan the shell commands needed to accomplish this goal.\n\
     Goal: {goal}\n\
     Reply with one step per line, each formatted exactly as \
     `title::command`. Use concrete commands only, never placeholders.";

pub const PLAN_INTRO_PROMPT: &str =
    "In one short sentence, introduce this plan to the user.\n\
     Goal: {goal}\n\
     Steps:\n{steps}";

pub const REPAIR_PROMPT: &str =
    "The step \"{title}\" failed.\n\
     Command: {command}\n\
     Error: {error}\n\
     Recent output:\n{recent_output}\n\
     Propose up to two corrective steps, one per line, formatted exactly as \
     `title::command`.";

pub const EVALUATION_PROMPT: &str =
    "Decide whether this goal has been achieved.\n\
     Goal: {goal}\n\
     Execution summary:\n{summary}\n\
     Reply with exactly one of: COMPLETED, INCOMPLETE:<reason>, \
     BLOCKED:<reason>.";

pub const SUMMARY_PROMPT: &str =
    "Write a short, human-readable report of this run for the user.\n\
     Goal: {goal}\n\
     Execution log:\n{log}";
