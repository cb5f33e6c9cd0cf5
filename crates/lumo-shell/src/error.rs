// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("command timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("shell session is not started")]
    NotStarted,

    #[error("shell process exited before the command completed")]
    Eof,

    #[error("failed to spawn shell: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("failed to spawn shell: {0}")]
    PtyFailed(#[from] anyhow::Error),
}
