//! Scripted in-memory backend for driving the orchestrator.

use std::cell::RefCell;
use std::collections::VecDeque;

use postboard_cli::gateway::{GatewayError, Invoke};
use serde_json::{json, Value};

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub function: String,
    pub payload: Value,
}

/// Answers calls from a queue of canned responses, in order, and records
/// every call it receives.
#[derive(Default)]
pub struct ScriptedBackend {
    replies: RefCell<VecDeque<Result<Value, String>>>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response envelope.
    pub fn reply(self, envelope: Value) -> Self {
        self.replies.borrow_mut().push_back(Ok(envelope));
        self
    }

    /// Queue a transport failure.
    pub fn fail_transport(self, reason: &str) -> Self {
        self.replies.borrow_mut().push_back(Err(reason.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn functions(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.function.clone()).collect()
    }
}

impl Invoke for ScriptedBackend {
    fn invoke(&self, function: &str, payload: &[u8]) -> Result<Vec<u8>, GatewayError> {
        self.calls.borrow_mut().push(Call {
            function: function.to_string(),
            payload: serde_json::from_slice(payload).unwrap_or(Value::Null),
        });
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(envelope)) => Ok(serde_json::to_vec(&envelope).unwrap_or_default()),
            Some(Err(reason)) => Err(GatewayError::Transport {
                function: function.to_string(),
                reason,
            }),
            None => panic!("unscripted call to {function}"),
        }
    }
}

pub fn success(data: Value) -> Value {
    json!({
        "statusCode": 200,
        "headers": {"Content-Type": "application/json"},
        "body": {"result": "success", "data": data}
    })
}

pub fn success_without_data() -> Value {
    json!({"statusCode": 200, "body": {"result": "success"}})
}

pub fn failure(status: i64, message: &str) -> Value {
    json!({
        "statusCode": status,
        "body": {"result": "failure", "error": {"message": message}}
    })
}

pub fn tokens(access_token: &str) -> Value {
    json!({
        "ChallengeParameters": {},
        "AuthenticationResult": {
            "AccessToken": access_token,
            "ExpiresIn": 3600,
            "TokenType": "Bearer",
            "RefreshToken": "refresh",
            "IdToken": "id"
        }
    })
}

pub fn post(alias: &str, timestamp: i64, message: &str) -> Value {
    json!({
        "Alias": {"S": alias},
        "Timestamp": {"S": timestamp.to_string()},
        "Message": {"S": message}
    })
}
