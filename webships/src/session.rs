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

//! Session bootstrap: the one-shot create/join handshake.
//!
//! A successful handshake yields a [`SessionCredential`], which is persisted in the
//! injected [`SessionStore`] so that another view (or a later run of the CLI) can
//! pick it up with [`SessionCredential::load`].

use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::ClientConfig,
    storage::{SessionStore, StorageError, GAME_KEY, JOIN_CODE_KEY, PLAYER_KEY, TOKEN_KEY},
};

pub use self::errors::{BootstrapError, BootstrapFailure};

mod errors;

/// Identifiers and token that authorize this client within one game.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub game_id: String,
    pub player_id: String,
    auth_token: String,
    /// Shareable code for the game. Only present on the creator's credential.
    pub join_code: Option<String>,
}

impl SessionCredential {
    pub fn new(
        game_id: impl Into<String>,
        player_id: impl Into<String>,
        auth_token: impl Into<String>,
        join_code: Option<String>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            player_id: player_id.into(),
            auth_token: auth_token.into(),
            join_code,
        }
    }

    /// The bearer token. Opaque; never log or display it.
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Recover a credential previously written by [`persist`](Self::persist). Returns
    /// `None` unless the game, player and token are all present.
    pub fn load(store: &impl SessionStore) -> Option<Self> {
        Some(Self {
            game_id: store.get(GAME_KEY)?,
            player_id: store.get(PLAYER_KEY)?,
            auth_token: store.get(TOKEN_KEY)?,
            join_code: store.get(JOIN_CODE_KEY),
        })
    }

    /// Write the credential to `store`. If any write fails, the keys are cleared so no
    /// partial credential is left behind.
    pub fn persist(&self, store: &impl SessionStore) -> Result<(), StorageError> {
        let written = (|| {
            store.set(GAME_KEY, &self.game_id)?;
            store.set(PLAYER_KEY, &self.player_id)?;
            match &self.join_code {
                Some(code) => store.set(JOIN_CODE_KEY, code)?,
                None => store.remove(JOIN_CODE_KEY)?,
            }
            store.set(TOKEN_KEY, &self.auth_token)
        })();
        if written.is_err() {
            Self::forget(store);
        }
        written
    }

    /// Remove any stored credential, ignoring failures.
    pub fn forget(store: &impl SessionStore) {
        for key in [GAME_KEY, PLAYER_KEY, JOIN_CODE_KEY, TOKEN_KEY].iter() {
            let _ = store.remove(key);
        }
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("game_id", &self.game_id)
            .field("player_id", &self.player_id)
            .field("auth_token", &"<redacted>")
            .field("join_code", &self.join_code)
            .finish()
    }
}

#[derive(Deserialize)]
struct CreateGameResponse {
    game_id: String,
    join_code: String,
    player: String,
    token: String,
}

#[derive(Serialize)]
struct JoinGameRequest<'a> {
    join_code: &'a str,
}

#[derive(Deserialize)]
struct JoinGameResponse {
    game_id: String,
    player: String,
    token: String,
}

/// Performs the create/join handshake against the game server's HTTP surface.
pub struct Bootstrapper<S: SessionStore> {
    config: ClientConfig,
    http: reqwest::Client,
    store: S,
}

impl<S: SessionStore> Bootstrapper<S> {
    pub fn new(config: ClientConfig, store: S) -> Self {
        Self::with_client(config, reqwest::Client::new(), store)
    }

    /// Use a preconfigured HTTP client, e.g. one with a timeout.
    pub fn with_client(config: ClientConfig, http: reqwest::Client, store: S) -> Self {
        Self {
            config,
            http,
            store,
        }
    }

    /// The store credentials are written to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a new game. Succeeds only on `201 Created` with a well-formed body.
    pub async fn create_game(&self) -> Result<SessionCredential, BootstrapError> {
        let result = async {
            let response = self.http.post(self.config.endpoint("games")).send().await?;
            let body: CreateGameResponse = expect_json(response, StatusCode::CREATED).await?;
            let credential = SessionCredential::new(
                body.game_id,
                body.player,
                body.token,
                Some(body.join_code),
            );
            credential.persist(&self.store)?;
            Ok::<_, BootstrapFailure>(credential)
        }
        .await;
        match result {
            Ok(credential) => {
                info!(
                    game_id = %credential.game_id,
                    player = %credential.player_id,
                    join_code = credential.join_code.as_deref().unwrap_or(""),
                    "game created"
                );
                Ok(credential)
            }
            Err(failure) => {
                warn!(error = %failure, "game creation failed");
                Err(BootstrapError::GameCreationFailed(failure))
            }
        }
    }

    /// Join an existing game by its code. The code is sent exactly as given; the
    /// server decides whether it is valid. Succeeds only on `200 OK`.
    pub async fn join_game(&self, join_code: &str) -> Result<SessionCredential, BootstrapError> {
        let result = async {
            let response = self
                .http
                .post(self.config.endpoint("games/join"))
                .json(&JoinGameRequest { join_code })
                .send()
                .await?;
            let body: JoinGameResponse = expect_json(response, StatusCode::OK).await?;
            let credential = SessionCredential::new(body.game_id, body.player, body.token, None);
            credential.persist(&self.store)?;
            Ok::<_, BootstrapFailure>(credential)
        }
        .await;
        match result {
            Ok(credential) => {
                info!(
                    game_id = %credential.game_id,
                    player = %credential.player_id,
                    "game joined"
                );
                Ok(credential)
            }
            Err(failure) => {
                warn!(error = %failure, "joining game failed");
                Err(BootstrapError::GameJoinFailed(failure))
            }
        }
    }
}

async fn expect_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    expected: StatusCode,
) -> Result<T, BootstrapFailure> {
    let status = response.status();
    if status != expected {
        return Err(BootstrapFailure::Status(status));
    }
    Ok(response.json().await?)
}
