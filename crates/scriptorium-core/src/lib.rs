// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptorium — Core types, error taxonomy, and settings shared across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigStore, ServiceConfig, Settings};
pub use error::{ErrorKind, Result, ScriptoriumError};
pub use types::*;
