// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! REST front-end for the mailbox gateway, using Actix Web.

pub mod errors;
pub mod rest;

pub use errors::ApiError;
pub use rest::{configure_rest_service, run_server, AppState};
