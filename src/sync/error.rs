// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::gateway::{GatewayError, OperationKind};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// More than one local anchor claims the same folder reference.
    #[error("{count} anchors share reference {reference}")]
    Consistency { reference: String, count: usize },

    #[error("Unexpected result shape for {0}")]
    UnexpectedResult(OperationKind),
}
