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

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use webships::{
    session::{BootstrapError, BootstrapFailure},
    storage::{SessionStore, GAME_KEY, JOIN_CODE_KEY, PLAYER_KEY, TOKEN_KEY},
    Bootstrapper, ClientConfig, MemoryStore, SessionCredential,
};

/// Scripted answer of the mock game server.
#[derive(Clone)]
struct Reply {
    status: StatusCode,
    body: Value,
}

#[derive(Clone)]
struct MockServer {
    create: Arc<Mutex<Reply>>,
    join: Arc<Mutex<Reply>>,
    join_bodies: Arc<Mutex<Vec<Value>>>,
}

impl MockServer {
    fn new() -> Self {
        let unset = Reply {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({"error": "unset"}),
        };
        Self {
            create: Arc::new(Mutex::new(unset.clone())),
            join: Arc::new(Mutex::new(unset)),
            join_bodies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on_create(&self, status: StatusCode, body: Value) {
        *self.create.lock().unwrap() = Reply { status, body };
    }

    fn on_join(&self, status: StatusCode, body: Value) {
        *self.join.lock().unwrap() = Reply { status, body };
    }

    fn join_bodies(&self) -> Vec<Value> {
        self.join_bodies.lock().unwrap().clone()
    }
}

async fn create_game(State(server): State<MockServer>) -> Response {
    let reply = server.create.lock().unwrap().clone();
    (reply.status, Json(reply.body)).into_response()
}

async fn join_game(State(server): State<MockServer>, Json(body): Json<Value>) -> Response {
    server.join_bodies.lock().unwrap().push(body);
    let reply = server.join.lock().unwrap().clone();
    (reply.status, Json(reply.body)).into_response()
}

/// Start the mock server and return it with a client config pointing at it.
async fn start() -> (MockServer, ClientConfig) {
    let server = MockServer::new();
    let app = Router::new()
        .route("/games", post(create_game))
        .route("/games/join", post(join_game))
        .with_state(server.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let config = ClientConfig::new(
        &format!("http://{}", addr),
        &format!("ws://{}/ws", addr),
    )
    .unwrap();
    (server, config)
}

#[tokio::test]
async fn create_game_returns_and_stores_credential() {
    let (server, config) = start().await;
    server.on_create(
        StatusCode::CREATED,
        json!({"game_id": "g-42", "join_code": "QX7K2P", "player": "p1", "token": "tok-1"}),
    );
    let bootstrapper = Bootstrapper::new(config, MemoryStore::new());

    let credential = bootstrapper.create_game().await.unwrap();
    assert_eq!(credential.game_id, "g-42");
    assert_eq!(credential.player_id, "p1");
    assert_eq!(credential.auth_token(), "tok-1");
    assert_eq!(credential.join_code.as_deref(), Some("QX7K2P"));

    let store = bootstrapper.store();
    assert_eq!(store.get(TOKEN_KEY).as_deref(), Some("tok-1"));
    assert_eq!(store.get(PLAYER_KEY).as_deref(), Some("p1"));
    assert_eq!(store.get(GAME_KEY).as_deref(), Some("g-42"));
    assert_eq!(store.get(JOIN_CODE_KEY).as_deref(), Some("QX7K2P"));
    assert_eq!(SessionCredential::load(store), Some(credential));
}

#[tokio::test]
async fn create_game_rejects_other_statuses() {
    let (server, config) = start().await;
    let body = json!({"game_id": "g", "join_code": "c", "player": "p1", "token": "t"});
    for status in [
        StatusCode::OK,
        StatusCode::BAD_REQUEST,
        StatusCode::INTERNAL_SERVER_ERROR,
    ]
    .iter()
    {
        server.on_create(*status, body.clone());
        let bootstrapper = Bootstrapper::new(config.clone(), MemoryStore::new());
        let err = bootstrapper.create_game().await.unwrap_err();
        assert!(
            matches!(err, BootstrapError::GameCreationFailed(_)),
            "status {}",
            status
        );
        assert_eq!(err.status().map(|s| s.as_u16()), Some(status.as_u16()));
        assert_eq!(err.to_string(), "could not create game");
        assert!(bootstrapper.store().is_empty());
    }
}

#[tokio::test]
async fn create_game_rejects_malformed_body() {
    let (server, config) = start().await;
    server.on_create(StatusCode::CREATED, json!({"game_id": "g-1"}));
    let bootstrapper = Bootstrapper::new(config, MemoryStore::new());

    let err = bootstrapper.create_game().await.unwrap_err();
    assert!(matches!(
        err,
        BootstrapError::GameCreationFailed(BootstrapFailure::Request(_))
    ));
    assert!(bootstrapper.store().is_empty());
}

#[tokio::test]
async fn create_game_network_failure() {
    // Grab a free port and release it so nothing is listening there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ClientConfig::new(&format!("http://{}", addr), "ws://127.0.0.1:1/ws").unwrap();
    let bootstrapper = Bootstrapper::new(config, MemoryStore::new());
    let err = bootstrapper.create_game().await.unwrap_err();
    assert!(matches!(
        err,
        BootstrapError::GameCreationFailed(BootstrapFailure::Request(_))
    ));
    assert!(bootstrapper.store().is_empty());
}

#[tokio::test]
async fn join_game_not_found() {
    let (server, config) = start().await;
    server.on_join(StatusCode::NOT_FOUND, json!({"error": "invalid join code"}));
    let bootstrapper = Bootstrapper::new(config, MemoryStore::new());

    let err = bootstrapper.join_game("ABC123").await.unwrap_err();
    assert!(matches!(err, BootstrapError::GameJoinFailed(_)));
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
    assert_eq!(err.to_string(), "could not join game");
    assert!(bootstrapper.store().is_empty());
    assert_eq!(server.join_bodies(), vec![json!({"join_code": "ABC123"})]);
}

#[tokio::test]
async fn join_game_success() {
    let (server, config) = start().await;
    server.on_join(
        StatusCode::OK,
        json!({"game_id": "g1", "player": "p2", "token": "t1"}),
    );
    let bootstrapper = Bootstrapper::new(config, MemoryStore::new());

    let credential = bootstrapper.join_game("ABC123").await.unwrap();
    assert_eq!(credential, SessionCredential::new("g1", "p2", "t1", None));
    assert_eq!(credential.join_code, None);
    assert_eq!(
        SessionCredential::load(bootstrapper.store()),
        Some(credential)
    );
}

#[tokio::test]
async fn join_game_conflict_is_a_join_failure() {
    let (server, config) = start().await;
    server.on_join(StatusCode::CONFLICT, json!({"error": "game full"}));
    let bootstrapper = Bootstrapper::new(config, MemoryStore::new());
    let err = bootstrapper.join_game("FULL01").await.unwrap_err();
    assert!(matches!(err, BootstrapError::GameJoinFailed(_)));
}

#[tokio::test]
async fn join_code_is_sent_verbatim() {
    let (server, config) = start().await;
    server.on_join(StatusCode::BAD_REQUEST, json!({"error": "join_code required"}));
    let bootstrapper = Bootstrapper::new(config, MemoryStore::new());

    for code in ["", "  lower case ", "ÜNÎCÖDE"].iter() {
        assert!(bootstrapper.join_game(code).await.is_err());
    }
    assert_eq!(
        server.join_bodies(),
        vec![
            json!({"join_code": ""}),
            json!({"join_code": "  lower case "}),
            json!({"join_code": "ÜNÎCÖDE"}),
        ]
    );
}

#[tokio::test]
async fn failed_join_keeps_previous_session() {
    let (server, config) = start().await;
    let store = MemoryStore::new();
    let previous = SessionCredential::new("g0", "p1", "t0", Some("OLD123".into()));
    previous.persist(&store).unwrap();

    server.on_join(StatusCode::NOT_FOUND, json!({"error": "invalid join code"}));
    let bootstrapper = Bootstrapper::new(config, &store);
    assert!(bootstrapper.join_game("NOPE").await.is_err());
    assert_eq!(SessionCredential::load(&store), Some(previous));
}
