//! Scripted in-process dispatcher for deterministic transport tests

use super::traits::{ApiRequest, ApiResponse, Dispatch, RequestBody};
use super::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

/// One scripted outcome, consumed in order
pub(crate) enum Scripted {
    Respond(ApiResponse),
    Fail(TransportError),
}

impl Scripted {
    pub(crate) fn status(status: u16) -> Self {
        Scripted::Respond(ApiResponse::new(status, Vec::new()))
    }

    pub(crate) fn json(status: u16, body: serde_json::Value) -> Self {
        Scripted::Respond(ApiResponse::new(status, body.to_string()))
    }
}

/// A request as seen by the dispatcher
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub endpoint: String,
    pub at: Instant,
    pub json: Option<serde_json::Value>,
}

pub(crate) struct ScriptedDispatcher {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedDispatcher {
    pub(crate) fn new(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn endpoints(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.endpoint.clone()).collect()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl Dispatch for ScriptedDispatcher {
    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let json = match &request.body {
            Some(RequestBody::Json(value)) => Some(value.clone()),
            _ => None,
        };
        self.calls.lock().push(RecordedCall {
            endpoint: request.endpoint.clone(),
            at: Instant::now(),
            json,
        });

        match self.script.lock().pop_front() {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(e)) => Err(e),
            None => Err(TransportError::Network {
                detail: "script exhausted".to_string(),
            }),
        }
    }
}
