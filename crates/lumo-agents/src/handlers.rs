// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Per-command-class timeout derivation and the interactive-handler
//! library consulted by the Executor before invoking the shell.

use std::time::Duration;

use regex::Regex;

use lumo_config::TimeoutsConfig;
use lumo_shell::Handler;

const PACKAGE_NETWORK_KEYWORDS: &[&str] =
    &["apt", "yum", "dnf", "pip", "npm", "wget", "curl", "git clone"];
const BUILD_KEYWORDS: &[&str] = &["make", "cmake", "configure", "build"];

/// Derive a command's timeout from its class.
pub fn derive_timeout(command: &str, timeouts: &TimeoutsConfig) -> Duration {
    let lower = command.to_lowercase();

    if PACKAGE_NETWORK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Duration::from_secs(timeouts.package_secs);
    }
    if lower.contains("systemctl") {
        return Duration::from_secs(timeouts.systemctl_secs);
    }
    if BUILD_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Duration::from_secs(timeouts.build_secs);
    }
    Duration::from_secs(timeouts.default_secs)
}

/// Derive the interactive-prompt handlers applicable to `command`, per the
/// handlers library.
pub fn derive_handlers(command: &str) -> Vec<Handler> {
    let lower = command.to_lowercase();
    let mut out = Vec::new();

    let mut push = |pattern: &str, response: &str| {
        if let Ok(re) = Regex::new(pattern) {
            out.push((re, response.to_string()));
        }
    };

    if PACKAGE_NETWORK_KEYWORDS[..3].iter().any(|k| lower.contains(k)) {
        push(r"(?i)do you want to continue\? \[y/n\]", "y");
        push(r"(?i)is this ok \[y/n\]", "y");
        push(r"\[Y/n\]", "y");
        push(r"\[y/N\]", "y");
    }
    if lower.contains("mysql") || lower.contains("mariadb") {
        push(r"(?i)enter password:", "");
        push(r"(?i)password:", "");
    }
    if lower.trim_start().starts_with("rm") {
        push(r"(?i)remove.*\?", "y");
    }
    if lower.contains("ssh") || lower.contains("scp") {
        push(r"(?i)are you sure you want to continue connecting", "yes");
        push(r"(?i)password:", "");
    }
    if lower.contains("git") {
        push(r"(?i)username for", "");
        push(r"(?i)password for", "");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeouts() -> TimeoutsConfig {
        TimeoutsConfig::default()
    }

    #[test]
    fn apt_get_gets_package_timeout() {
        assert_eq!(
            derive_timeout("apt-get install -y htop", &timeouts()),
            Duration::from_secs(180)
        );
    }

    #[test]
    fn systemctl_gets_systemctl_timeout() {
        assert_eq!(
            derive_timeout("systemctl restart nginx", &timeouts()),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn make_gets_build_timeout() {
        assert_eq!(derive_timeout("make -j4", &timeouts()), Duration::from_secs(300));
    }

    #[test]
    fn uptime_gets_default_timeout() {
        assert_eq!(derive_timeout("uptime", &timeouts()), Duration::from_secs(60));
    }

    #[test]
    fn apt_command_gets_confirmation_handlers() {
        let handlers = derive_handlers("apt-get install -y nginx");
        assert!(handlers.iter().any(|(re, resp)| re.is_match("Do you want to continue? [Y/n]") && resp == "y"));
    }

    #[test]
    fn ssh_command_gets_host_key_and_password_handlers() {
        let handlers = derive_handlers("ssh user@host");
        assert!(handlers
            .iter()
            .any(|(re, _)| re.is_match("Are you sure you want to continue connecting (yes/no)?")));
        assert!(handlers.iter().any(|(_, resp)| resp.is_empty()));
    }

    #[test]
    fn plain_command_gets_no_handlers() {
        assert!(derive_handlers("uptime").is_empty());
    }

    #[test]
    fn pip_command_does_not_get_apt_confirmation_handlers() {
        // pip is in PACKAGE_NETWORK_KEYWORDS for timeout purposes but the
        // handlers library scopes confirmation prompts to apt/yum/dnf only.
        assert!(derive_handlers("pip install requests").is_empty());
    }
}
