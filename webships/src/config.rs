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

//! Server addresses used by the client.

use std::env;

use once_cell::sync::Lazy;
use thiserror::Error;
use url::Url;

/// Environment variable holding the base HTTP address of the game server.
pub const API_URL_VAR: &str = "WEBSHIPS_API_URL";
/// Environment variable holding the streaming endpoint of the game server.
pub const WS_URL_VAR: &str = "WEBSHIPS_WS_URL";

static DEFAULT_API_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost:8080").expect("default api url is valid"));
static DEFAULT_WS_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("ws://localhost:8080/ws").expect("default ws url is valid"));

/// Error returned when a configured address cannot be used.
#[derive(Debug, Error)]
#[error("invalid {name} {value:?}: {source}")]
pub struct ConfigError {
    name: &'static str,
    value: String,
    #[source]
    source: url::ParseError,
}

impl ConfigError {
    /// Name of the setting that failed to parse.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Addresses of the external game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base address for the create/join requests.
    pub api_url: Url,
    /// Address of the streaming endpoint. The session token is added as a query
    /// parameter when connecting.
    pub ws_url: Url,
}

impl ClientConfig {
    /// Build a config from explicit addresses.
    pub fn new(api_url: &str, ws_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: parse_url("api url", api_url)?,
            ws_url: parse_url("ws url", ws_url)?,
        })
    }

    /// Read the addresses from [`API_URL_VAR`] and [`WS_URL_VAR`], falling back to the
    /// local development server for unset or empty variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(api) = env_nonempty(API_URL_VAR) {
            config.api_url = parse_url(API_URL_VAR, &api)?;
        }
        if let Some(ws) = env_nonempty(WS_URL_VAR) {
            config.ws_url = parse_url(WS_URL_VAR, &ws)?;
        }
        Ok(config)
    }

    /// Replace the API address.
    pub fn with_api_url(mut self, api_url: &str) -> Result<Self, ConfigError> {
        self.api_url = parse_url("api url", api_url)?;
        Ok(self)
    }

    /// Replace the streaming address.
    pub fn with_ws_url(mut self, ws_url: &str) -> Result<Self, ConfigError> {
        self.ws_url = parse_url("ws url", ws_url)?;
        Ok(self)
    }

    /// Resolve a path such as `games/join` against the API address. The API address
    /// is treated as a directory even when it lacks a trailing slash.
    pub(crate) fn endpoint(&self, path: &str) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.split('/'));
        }
        url
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.clone(),
            ws_url: DEFAULT_WS_URL.clone(),
        }
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError {
        name,
        value: value.to_owned(),
        source,
    })
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
