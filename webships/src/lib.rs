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

//! Client for the WebShips online Battleship server.
//!
//! The server owns the game: boards, turns, and shot resolution all happen remotely.
//! This crate covers the client side of a match session:
//!
//! [`session`] turns "create a match" or "join by code" into a [`SessionCredential`]
//! and persists it in a [`SessionStore`] so other views can pick it up.
//!
//! [`realtime`] opens the authenticated streaming connection for a game and folds the
//! server's events into a [`SessionView`], using the pure state machine in [`phase`].
//!
//! [`protocol`] defines the messages exchanged over that connection.

pub mod config;
pub mod phase;
pub mod protocol;
pub mod realtime;
pub mod session;
pub mod storage;

pub use self::{
    config::ClientConfig,
    phase::{Connectivity, MatchPhase, SessionTracker, SessionView},
    protocol::{ServerEvent, ShipKind},
    realtime::{RealtimeClient, SessionNotice},
    session::{Bootstrapper, SessionCredential},
    storage::{FileStore, MemoryStore, SessionStore},
};
