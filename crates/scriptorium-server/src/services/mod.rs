// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — bridges the HTTP handlers and the CLI to the backend crates.
//
// Both front ends call the same `AppServices` methods, so a document
// processed from the command line is indistinguishable from an upload.

pub mod app_services;
pub mod data_dir;
