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

//! Pure state machine behind the realtime client.
//!
//! [`SessionTracker`] folds transport lifecycle callbacks and inbound frames, strictly
//! in the order they are fed to it, into a [`SessionView`]. It never touches the
//! network, so the transport loop in [`crate::realtime`] stays a thin shim.

use std::fmt;

use tracing::debug;

use crate::protocol::{ServerEvent, ShotResult};

/// Coarse stage of a match as announced by the server.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MatchPhase {
    /// Waiting for the second player.
    Waiting,
    /// Both players are in and placing ships.
    Placing,
    /// Shots are being fired.
    Active,
    /// A winner has been decided.
    Finished,
}

impl MatchPhase {
    /// Map a `game_state` status string to a phase. Returns `None` for statuses this
    /// client doesn't know.
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "waiting" => Some(MatchPhase::Waiting),
            "placing" => Some(MatchPhase::Placing),
            "active" => Some(MatchPhase::Active),
            "finished" => Some(MatchPhase::Finished),
            _ => None,
        }
    }

    /// The phase after `event`. Only `game_state` events with a recognized status
    /// change it; everything else leaves it as is.
    pub fn apply(self, event: &ServerEvent) -> Self {
        match event {
            ServerEvent::GameState(state) => state.phase().unwrap_or(self),
            _ => self,
        }
    }

    /// Status name as the server spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchPhase::Waiting => "waiting",
            MatchPhase::Placing => "placing",
            MatchPhase::Active => "active",
            MatchPhase::Finished => "finished",
        }
    }
}

impl Default for MatchPhase {
    fn default() -> Self {
        MatchPhase::Waiting
    }
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// State of the streaming connection.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Connectivity {
    /// No connection attempted yet.
    Idle,
    Connecting,
    Connected,
    /// Closed by either side or failed. Terminal for a given connection.
    Disconnected,
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity::Idle
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(match self {
            Connectivity::Idle => "idle",
            Connectivity::Connecting => "connecting",
            Connectivity::Connected => "connected",
            Connectivity::Disconnected => "disconnected",
        })
    }
}

/// Something the presentation layer may want to react to, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    Connectivity(Connectivity),
    PhaseChanged { from: MatchPhase, to: MatchPhase },
    /// The second participant connected.
    OpponentJoined,
    ShotResolved(ShotResult),
    TurnChanged(String),
    GameFinished { winner: String },
    /// The server rejected a command.
    ServerError(String),
}

/// Everything the presentation layer shows about a live session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionView {
    pub phase: MatchPhase,
    pub connectivity: Connectivity,
    /// Set once `opponent_joined` arrives.
    pub opponent_joined: bool,
    /// Player whose turn it is, once the server says.
    pub turn: Option<String>,
    pub winner: Option<String>,
    /// Most recent `error` message from the server.
    pub last_error: Option<String>,
    headline: Headline,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Headline {
    Phase(MatchPhase),
    OpponentJoined,
}

impl Default for Headline {
    fn default() -> Self {
        Headline::Phase(MatchPhase::Waiting)
    }
}

impl SessionView {
    /// One-line description of where the match stands, following whichever of the
    /// phase or the opponent signal arrived last.
    pub fn headline(&self) -> &'static str {
        match self.headline {
            Headline::OpponentJoined => "Opponent joined. Ready to place ships.",
            Headline::Phase(MatchPhase::Waiting) => "Waiting for opponent...",
            Headline::Phase(MatchPhase::Placing) => "Both players connected. Place your ships.",
            Headline::Phase(MatchPhase::Active) => "Match in progress.",
            Headline::Phase(MatchPhase::Finished) => "Match over.",
        }
    }
}

/// Folds one connection's lifecycle and events into a [`SessionView`].
#[derive(Debug, Default)]
pub struct SessionTracker {
    view: SessionView,
    deactivated: bool,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current view.
    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn phase(&self) -> MatchPhase {
        self.view.phase
    }

    pub fn connectivity(&self) -> Connectivity {
        self.view.connectivity
    }

    /// A connection attempt started. Only valid from `Idle`.
    pub fn begin_connect(&mut self) -> Option<SessionNotice> {
        if self.view.connectivity != Connectivity::Idle || self.deactivated {
            return None;
        }
        self.set_connectivity(Connectivity::Connecting)
    }

    /// The transport handshake succeeded. Does not touch the phase.
    pub fn opened(&mut self) -> Option<SessionNotice> {
        if self.view.connectivity != Connectivity::Connecting || self.deactivated {
            return None;
        }
        self.set_connectivity(Connectivity::Connected)
    }

    /// The transport closed or failed, for any reason.
    pub fn closed(&mut self) -> Option<SessionNotice> {
        self.set_connectivity(Connectivity::Disconnected)
    }

    /// The owning view is going away. Returns true the first time only, meaning the
    /// caller must close the transport. Frames received afterwards are discarded.
    pub fn deactivate(&mut self) -> bool {
        !std::mem::replace(&mut self.deactivated, true)
    }

    /// Decode and apply one inbound text frame. Malformed frames, and any frame
    /// arriving after deactivation or disconnect, are dropped.
    pub fn receive(&mut self, frame: &str) -> Vec<SessionNotice> {
        if self.deactivated || self.view.connectivity == Connectivity::Disconnected {
            debug!("discarding frame received after teardown");
            return Vec::new();
        }
        match ServerEvent::parse(frame) {
            Ok(event) => self.apply(&event),
            Err(err) => {
                debug!(error = %err, "dropping malformed frame");
                Vec::new()
            }
        }
    }

    /// Apply a decoded event.
    pub fn apply(&mut self, event: &ServerEvent) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        let view = &mut self.view;
        match event {
            ServerEvent::OpponentJoined(_) => {
                view.opponent_joined = true;
                view.headline = Headline::OpponentJoined;
                notices.push(SessionNotice::OpponentJoined);
            }
            ServerEvent::GameState(state) => {
                let next = view.phase.apply(event);
                if state.phase().is_some() {
                    view.headline = Headline::Phase(next);
                } else {
                    debug!(status = %state.status, "ignoring unrecognized game status");
                }
                if !state.turn.is_empty() {
                    view.turn = Some(state.turn.clone());
                }
                if !state.winner.is_empty() {
                    view.winner = Some(state.winner.clone());
                }
                if next != view.phase {
                    notices.push(SessionNotice::PhaseChanged {
                        from: view.phase,
                        to: next,
                    });
                    view.phase = next;
                }
            }
            ServerEvent::ShotResult(shot) => {
                notices.push(SessionNotice::ShotResolved(shot.clone()));
            }
            ServerEvent::TurnChanged(turn) => {
                view.turn = Some(turn.turn.clone());
                notices.push(SessionNotice::TurnChanged(turn.turn.clone()));
            }
            ServerEvent::GameFinished(finished) => {
                view.winner = Some(finished.winner.clone());
                notices.push(SessionNotice::GameFinished {
                    winner: finished.winner.clone(),
                });
            }
            ServerEvent::Error(err) => {
                view.last_error = Some(err.message.clone());
                notices.push(SessionNotice::ServerError(err.message.clone()));
            }
            ServerEvent::Unknown(kind) => {
                debug!(kind = %kind, "ignoring unknown event");
            }
        }
        notices
    }

    fn set_connectivity(&mut self, next: Connectivity) -> Option<SessionNotice> {
        if self.view.connectivity == next {
            return None;
        }
        self.view.connectivity = next;
        Some(SessionNotice::Connectivity(next))
    }
}
