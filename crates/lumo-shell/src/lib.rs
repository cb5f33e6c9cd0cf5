// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod error;
mod sanitize;
mod session;

pub use error::ShellError;
pub use sanitize::{clean_output, strip_ansi};
pub use session::{Handler, ShellSession};
