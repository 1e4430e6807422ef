use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{OutputSchema, Provider, Usage};

/// What the mock saw on one free-text call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Vec<Tool>,
}

/// A mock provider that returns pre-configured responses for testing.
///
/// Free-text and structured replies are served from separate queues, so one
/// instance can back both the router and the handlers. A queued `Err` is raised
/// as a provider fault.
#[derive(Default)]
pub struct MockProvider {
    responses: Mutex<Vec<Result<Message, String>>>,
    decisions: Mutex<Vec<Result<Value, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
    structured_calls: Mutex<Vec<Vec<Message>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockProvider {
    /// Create a new mock provider with a sequence of free-text responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Queue a fault for the next free-text call
    pub fn with_fault<S: Into<String>>(self, reason: S) -> Self {
        lock(&self.responses).push(Err(reason.into()));
        self
    }

    /// Queue a free-text response
    pub fn with_response(self, message: Message) -> Self {
        lock(&self.responses).push(Ok(message));
        self
    }

    /// Queue a structured response
    pub fn with_decision(self, decision: Value) -> Self {
        lock(&self.decisions).push(Ok(decision));
        self
    }

    /// Queue a fault for the next structured call
    pub fn with_decision_fault<S: Into<String>>(self, reason: S) -> Self {
        lock(&self.decisions).push(Err(reason.into()));
        self
    }

    /// Every free-text call so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn complete_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Messages sent on every structured call so far, oldest first
    pub fn structured_calls(&self) -> Vec<Vec<Message>> {
        lock(&self.structured_calls).clone()
    }

    pub fn structured_count(&self) -> usize {
        lock(&self.structured_calls).len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, messages: &[Message], tools: &[Tool]) -> Result<(Message, Usage)> {
        lock(&self.calls).push(RecordedCall {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
        });

        let mut responses = lock(&self.responses);
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            return Ok((Message::assistant().with_text(""), Usage::default()));
        }
        match responses.remove(0) {
            Ok(message) => Ok((message, Usage::default())),
            Err(reason) => Err(anyhow!(reason)),
        }
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        _schema: &OutputSchema,
    ) -> Result<(Value, Usage)> {
        lock(&self.structured_calls).push(messages.to_vec());

        let mut decisions = lock(&self.decisions);
        if decisions.is_empty() {
            return Err(anyhow!("No structured response configured"));
        }
        match decisions.remove(0) {
            Ok(value) => Ok((value, Usage::default())),
            Err(reason) => Err(anyhow!(reason)),
        }
    }
}
