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

//! The realtime session client.
//!
//! [`RealtimeClient::connect`] opens one authenticated streaming connection for a game
//! and spawns a task that owns it. The task feeds transport callbacks and inbound
//! frames, in arrival order, to a [`SessionTracker`] and publishes the resulting
//! [`SessionView`] on a watch channel. [`SessionNotice`]s go out on an unbounded
//! channel returned alongside the client.
//!
//! The connection lives exactly as long as the client: [`RealtimeClient::close`] (or
//! dropping the client) requests closure immediately, and any frame that shows up
//! afterwards is discarded. There is no automatic reconnection; connect again to get
//! a fresh session view.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    handshake::client::Request,
    http::{header::AUTHORIZATION, HeaderValue},
    Message,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::ClientConfig,
    phase::SessionTracker,
    protocol::{ClientMessage, Coord, ShipPlacement},
    session::SessionCredential,
};

pub use crate::phase::{Connectivity, SessionNotice, SessionView};

/// Time [`RealtimeClient::shutdown`] waits for the connection task before aborting it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Error returned by the realtime client.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// No game id was supplied, so there is nothing to connect to.
    #[error("no game to connect to")]
    MissingGame,
    /// The streaming address could not be turned into a connection request.
    #[error("cannot build streaming request: {0}")]
    Request(#[source] tungstenite::Error),
    /// The session token contains characters that cannot be sent in a header.
    #[error("session token cannot be sent in a request header")]
    InvalidToken,
    /// The connection is not open, or the client was closed.
    #[error("not connected")]
    NotConnected,
}

enum Command {
    Send(ClientMessage),
    Close,
}

/// Handle to one live streaming connection.
pub struct RealtimeClient {
    game_id: String,
    view: watch::Receiver<SessionView>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    /// Set synchronously on close so the task drops frames already in flight.
    deactivated: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeClient {
    /// Connect to the game's streaming endpoint, authenticating with `token`.
    ///
    /// Returns as soon as the connection attempt has started; the view is already
    /// [`Connectivity::Connecting`]. Must be called from within a tokio runtime.
    pub fn connect(
        config: &ClientConfig,
        game_id: &str,
        token: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionNotice>), RealtimeError> {
        if game_id.is_empty() {
            return Err(RealtimeError::MissingGame);
        }
        let request = stream_request(&config.ws_url, token)?;

        let mut tracker = SessionTracker::new();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        if let Some(notice) = tracker.begin_connect() {
            let _ = notice_tx.send(notice);
        }
        let (view_tx, view_rx) = watch::channel(tracker.view().clone());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let deactivated = Arc::new(AtomicBool::new(false));

        info!(game_id, endpoint = %config.ws_url, "connecting to game");
        let task = tokio::spawn(
            Connection {
                tracker,
                view_tx,
                notice_tx,
                cmd_rx,
                deactivated: Arc::clone(&deactivated),
            }
            .run(request),
        );

        let client = Self {
            game_id: game_id.to_owned(),
            view: view_rx,
            cmd_tx,
            deactivated,
            task: Some(task),
        };
        Ok((client, notice_rx))
    }

    /// Connect using a stored session credential.
    pub fn for_session(
        config: &ClientConfig,
        credential: &SessionCredential,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionNotice>), RealtimeError> {
        Self::connect(config, &credential.game_id, credential.auth_token())
    }

    /// Game this connection belongs to.
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Snapshot of the current view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver that observes every view update.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Submit a full ship layout.
    pub fn place_ships(&self, ships: Vec<ShipPlacement>) -> Result<(), RealtimeError> {
        self.send(ClientMessage::PlaceShips {
            game_id: self.game_id.clone(),
            ships,
        })
    }

    /// Fire at a cell on the opponent's board.
    pub fn fire(&self, coord: Coord) -> Result<(), RealtimeError> {
        self.send(ClientMessage::Fire {
            game_id: self.game_id.clone(),
            coord,
        })
    }

    /// Queue a message for the server. Fails unless the connection is open.
    pub fn send(&self, message: ClientMessage) -> Result<(), RealtimeError> {
        if self.is_closed() || self.view.borrow().connectivity != Connectivity::Connected {
            return Err(RealtimeError::NotConnected);
        }
        self.cmd_tx
            .send(Command::Send(message))
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// True once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.deactivated.load(Ordering::Acquire)
    }

    /// Request closure of the connection. Takes effect immediately for inbound
    /// frames; the close handshake itself happens on the connection task. Calling it
    /// more than once has no further effect.
    pub fn close(&mut self) {
        if !self.deactivated.swap(true, Ordering::AcqRel) {
            debug!(game_id = %self.game_id, "closing game connection");
            let _ = self.cmd_tx.send(Command::Close);
        }
    }

    /// Close the connection and wait for the connection task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "connection task failed"),
                Err(_) => {
                    warn!("connection task did not exit in time; aborting it");
                    task.abort();
                }
            }
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// The streaming address with the `token` query parameter set, replacing any
/// existing one.
pub fn stream_url(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != "token")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (key, value) in &kept {
            query.append_pair(key, value);
        }
        query.append_pair("token", token);
    }
    url
}

/// Build the upgrade request. The token goes in the `token` query parameter and,
/// for servers that authenticate from headers, as a bearer `Authorization` header.
fn stream_request(base: &Url, token: &str) -> Result<Request, RealtimeError> {
    let mut request = stream_url(base, token)
        .as_str()
        .into_client_request()
        .map_err(RealtimeError::Request)?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| RealtimeError::InvalidToken)?;
    request.headers_mut().insert(AUTHORIZATION, bearer);
    Ok(request)
}

/// State owned by the connection task.
struct Connection {
    tracker: SessionTracker,
    view_tx: watch::Sender<SessionView>,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    deactivated: Arc<AtomicBool>,
}

impl Connection {
    async fn run(mut self, request: Request) {
        let connecting = tokio_tungstenite::connect_async(request);
        tokio::pin!(connecting);
        let socket = loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send(_)) => debug!("dropping command sent before connect"),
                    Some(Command::Close) | None => {
                        // Dropping the pending handshake tears down the transport.
                        self.tracker.deactivate();
                        self.finish();
                        return;
                    }
                },
                result = &mut connecting => match result {
                    Ok((socket, _)) => break socket,
                    Err(err) => {
                        warn!(error = %err, "game connection failed");
                        self.finish();
                        return;
                    }
                },
            }
        };

        let (mut sink, mut stream) = socket.split();
        if self.deactivated.load(Ordering::Acquire) {
            self.tracker.deactivate();
            let _ = sink.close().await;
            self.finish();
            return;
        }
        let opened = self.tracker.opened();
        self.publish(opened);
        info!("game connection open");

        loop {
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send(message)) => {
                        let text = match message.to_json() {
                            Ok(text) => text,
                            Err(err) => {
                                warn!(error = %err, "cannot encode outbound message; skipping it");
                                continue;
                            }
                        };
                        if let Err(err) = sink.send(Message::Text(text.into())).await {
                            warn!(error = %err, "sending to game server failed");
                            break;
                        }
                    }
                    Some(Command::Close) | None => {
                        if self.tracker.deactivate() {
                            let _ = sink.close().await;
                        }
                        break;
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if self.deactivated.load(Ordering::Acquire) {
                            debug!("discarding frame received after close was requested");
                            if self.tracker.deactivate() {
                                let _ = sink.close().await;
                            }
                            break;
                        }
                        let notices = self.tracker.receive(&text);
                        self.publish_all(notices);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "game server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "game connection dropped");
                        break;
                    }
                    None => break,
                },
            }
        }
        self.finish();
    }

    fn finish(&mut self) {
        let closed = self.tracker.closed();
        self.publish(closed);
        info!("game connection closed");
    }

    fn publish(&self, notice: Option<SessionNotice>) {
        self.publish_all(notice);
    }

    /// Publish the view before the notices, so a notice reader sees the view it caused.
    fn publish_all(&self, notices: impl IntoIterator<Item = SessionNotice>) {
        let current = self.tracker.view();
        self.view_tx.send_if_modified(|view| {
            if *view == *current {
                return false;
            }
            *view = current.clone();
            true
        });
        for notice in notices {
            // The receiver may have been dropped by a caller that only watches the view.
            let _ = self.notice_tx.send(notice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_sets_token() {
        let base = Url::parse("ws://localhost:8080/ws").unwrap();
        assert_eq!(
            stream_url(&base, "abc").as_str(),
            "ws://localhost:8080/ws?token=abc"
        );
    }

    #[test]
    fn stream_url_keeps_other_params_and_replaces_token() {
        let base = Url::parse("wss://example.com/ws?region=eu&token=old").unwrap();
        let url = stream_url(&base, "a b&c");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("region".to_owned(), "eu".to_owned()),
                ("token".to_owned(), "a b&c".to_owned()),
            ]
        );
    }

    #[test]
    fn request_carries_bearer_header() {
        let base = Url::parse("ws://localhost:8080/ws").unwrap();
        let request = stream_request(&base, "t1").unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer t1");
        assert_eq!(request.uri().query(), Some("token=t1"));
    }

    #[test]
    fn bad_tokens_are_rejected_before_connecting() {
        let base = Url::parse("ws://localhost:8080/ws").unwrap();
        assert!(matches!(
            stream_request(&base, "line\nbreak"),
            Err(RealtimeError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn missing_game_id_does_not_connect() {
        let config = ClientConfig::default();
        assert!(matches!(
            RealtimeClient::connect(&config, "", "t1"),
            Err(RealtimeError::MissingGame)
        ));
    }
}
