//! Scripted [`BaseSession`] used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use super::error::AuthError;
use super::session::BaseSession;
use super::types::{AuthenticationRequest, AuthenticationResponse};

/// Build a server response with the given housekeeping fields.
pub(crate) fn response(
    exp: Option<i64>,
    refresh_token: Option<&str>,
    device_id: Option<&str>,
) -> AuthenticationResponse {
    let mut body = json!({
        "accessToken": "jwt-token",
        "authentication": {"strategy": "local", "payload": {}},
        "user": {"name": "Ann"}
    });
    if let Some(exp) = exp {
        body["authentication"]["payload"]["exp"] = json!(exp);
    }
    if let Some(token) = refresh_token {
        body["refreshToken"] = json!(token);
    }
    if let Some(device_id) = device_id {
        body["deviceId"] = json!(device_id);
    }
    serde_json::from_value(body).expect("valid response fixture")
}

struct Gate {
    started: Notify,
    release: Notify,
}

pub(crate) struct FakeBase {
    reply: Mutex<Result<AuthenticationResponse, AuthError>>,
    remove_reply: Mutex<Result<(), AuthError>>,
    requests: Mutex<Vec<AuthenticationRequest>>,
    reauthenticate_calls: Mutex<Vec<(bool, Option<String>)>>,
    reauthenticate_devices: Mutex<Vec<Option<String>>>,
    removes: AtomicUsize,
    gate: Option<Gate>,
}

impl FakeBase {
    pub(crate) fn new() -> Self {
        Self {
            reply: Mutex::new(Ok(response(None, None, None))),
            remove_reply: Mutex::new(Ok(())),
            requests: Mutex::new(Vec::new()),
            reauthenticate_calls: Mutex::new(Vec::new()),
            reauthenticate_devices: Mutex::new(Vec::new()),
            removes: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Hold every `authenticate` call until [`FakeBase::release`].
    pub(crate) fn gated(mut self) -> Self {
        self.gate = Some(Gate {
            started: Notify::new(),
            release: Notify::new(),
        });
        self
    }

    pub(crate) fn respond(&self, reply: Result<AuthenticationResponse, AuthError>) {
        *self.reply.lock().unwrap() = reply;
    }

    pub(crate) fn fail_remove(&self, error: AuthError) {
        *self.remove_reply.lock().unwrap() = Err(error);
    }

    /// Wait until a gated `authenticate` call is parked.
    pub(crate) async fn started(&self) {
        if let Some(gate) = &self.gate {
            gate.started.notified().await;
        }
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.release.notify_one();
        }
    }

    pub(crate) fn requests(&self) -> Vec<AuthenticationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn reauthenticate_calls(&self) -> Vec<(bool, Option<String>)> {
        self.reauthenticate_calls.lock().unwrap().clone()
    }

    /// Device ids passed to each `reauthenticate` call, in order.
    pub(crate) fn reauthenticate_devices(&self) -> Vec<Option<String>> {
        self.reauthenticate_devices.lock().unwrap().clone()
    }

    pub(crate) fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseSession for FakeBase {
    async fn authenticate(
        &self,
        request: AuthenticationRequest,
    ) -> Result<AuthenticationResponse, AuthError> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.reply.lock().unwrap().clone()
    }

    async fn reauthenticate(
        &self,
        force: bool,
        strategy: Option<&str>,
        device_id: Option<String>,
    ) -> Result<AuthenticationResponse, AuthError> {
        self.reauthenticate_calls
            .lock()
            .unwrap()
            .push((force, strategy.map(str::to_string)));
        self.reauthenticate_devices.lock().unwrap().push(device_id);
        self.reply.lock().unwrap().clone()
    }

    async fn remove_access_token(&self) -> Result<(), AuthError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.remove_reply.lock().unwrap().clone()
    }
}
