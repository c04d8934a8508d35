// Copyright 2020 Zachary Stewart
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Errors returned by the [`Bootstrapper`](super::Bootstrapper).

use reqwest::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;

/// Failure to obtain a session. The message is fit to show to a user as is; the
/// underlying cause is available through [`source`](std::error::Error::source).
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("could not create game")]
    GameCreationFailed(#[source] BootstrapFailure),
    #[error("could not join game")]
    GameJoinFailed(#[source] BootstrapFailure),
}

impl BootstrapError {
    /// Get the underlying cause.
    pub fn failure(&self) -> &BootstrapFailure {
        match self {
            BootstrapError::GameCreationFailed(failure) => failure,
            BootstrapError::GameJoinFailed(failure) => failure,
        }
    }

    /// The HTTP status the server answered with, if it answered with an unexpected one.
    pub fn status(&self) -> Option<StatusCode> {
        match self.failure() {
            BootstrapFailure::Status(status) => Some(*status),
            _ => None,
        }
    }
}

/// What went wrong during a create or join request.
#[derive(Debug, Error)]
pub enum BootstrapFailure {
    /// The server answered with something other than the expected status.
    #[error("server answered {0}")]
    Status(StatusCode),
    /// The request could not be sent or the response body could not be decoded.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The credential could not be persisted.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
