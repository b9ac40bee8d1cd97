//! Mock implementations of core traits for testing.
//!
//! These are shared by unit and integration tests across the workspace.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::{
    traits::{Actuator, MemoryBackend, MissionLog, ReasoningClient, StructuredRequest},
    types::{Episode, EpisodeDraft, MemoryCounts, Rule, RuleDraft},
    Error, Result,
};

// =============================================================================
// Mock Reasoning Capability
// =============================================================================

/// What the mock answers to a structured completion.
#[derive(Debug, Clone)]
pub enum PlanScript {
    /// Return this raw value.
    Respond(Value),
    /// Return no content.
    Empty,
    /// Fail the request with this message.
    Fail(String),
}

type Embedder = Box<dyn Fn(&str) -> Vec<f32> + Send + Sync>;

/// Scripted reasoning capability.
pub struct MockReasoning {
    plan: PlanScript,
    embedder: Option<Embedder>,
    requests: Mutex<Vec<StructuredRequest>>,
    embed_calls: Mutex<usize>,
}

impl MockReasoning {
    pub fn new(plan: PlanScript) -> Self {
        Self {
            plan,
            embedder: Some(Box::new(|_| vec![1.0; 8])),
            requests: Mutex::new(Vec::new()),
            embed_calls: Mutex::new(0),
        }
    }

    /// Structured completion always returns `plan`.
    pub fn with_plan(plan: Value) -> Self {
        Self::new(PlanScript::Respond(plan))
    }

    /// Structured completion always errors, forcing the heuristic planner.
    pub fn unavailable() -> Self {
        Self::new(PlanScript::Fail("reasoning capability offline".to_string()))
    }

    /// Compute embeddings with a custom function.
    pub fn with_embedder(mut self, f: impl Fn(&str) -> Vec<f32> + Send + Sync + 'static) -> Self {
        self.embedder = Some(Box::new(f));
        self
    }

    /// Make every embedding request fail.
    pub fn with_failing_embeddings(mut self) -> Self {
        self.embedder = None;
        self
    }

    /// Structured requests received so far.
    pub fn requests(&self) -> Vec<StructuredRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn embed_calls(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }
}

#[async_trait]
impl ReasoningClient for MockReasoning {
    async fn structured_complete(&self, request: &StructuredRequest) -> Result<Option<Value>> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.plan {
            PlanScript::Respond(v) => Ok(Some(v.clone())),
            PlanScript::Empty => Ok(None),
            PlanScript::Fail(msg) => Err(Error::model_provider(msg.clone())),
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        *self.embed_calls.lock().unwrap() += 1;
        match &self.embedder {
            Some(f) => Ok(f(text)),
            None => Err(Error::embedding("embedding endpoint unreachable")),
        }
    }
}

// =============================================================================
// Mock Actuator
// =============================================================================

/// Actuation operations, for selecting which ones fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorOp {
    Connect,
    Takeoff,
    Goto,
    Land,
}

/// Actuator that records every call and fails the selected operations.
#[derive(Default)]
pub struct MockActuator {
    failing: HashSet<ActuatorOp>,
    calls: Mutex<Vec<String>>,
}

impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, op: ActuatorOp) -> Self {
        self.failing.insert(op);
        self
    }

    /// Calls in order, e.g. `"arm_and_takeoff(10)"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, op: ActuatorOp, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.contains(&op) {
            return Err(Error::actuation(format!("{} rejected by vehicle", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl Actuator for MockActuator {
    async fn connect(&self) -> Result<()> {
        self.record(ActuatorOp::Connect, "connect()".to_string())
    }

    async fn arm_and_takeoff(&self, altitude: f64) -> Result<String> {
        self.record(ActuatorOp::Takeoff, format!("arm_and_takeoff({})", altitude))?;
        Ok(format!("airborne at {}m", altitude))
    }

    async fn goto_location(&self, lat: f64, lon: f64, alt: f64) -> Result<String> {
        self.record(ActuatorOp::Goto, format!("goto_location({}, {}, {})", lat, lon, alt))?;
        Ok("Move command sent".to_string())
    }

    async fn land(&self) -> Result<String> {
        self.record(ActuatorOp::Land, "land()".to_string())?;
        Ok("Landing initiated".to_string())
    }
}

// =============================================================================
// Recording Mission Log
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
    Section,
}

/// Mission log that keeps every line for assertions.
#[derive(Default)]
pub struct RecordingLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.of_level(LogLevel::Error)
    }

    pub fn sections(&self) -> Vec<String> {
        self.of_level(LogLevel::Section)
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|(_, l)| l.contains(needle))
    }

    fn of_level(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl MissionLog for RecordingLog {
    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push((LogLevel::Info, message.to_string()));
    }

    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push((LogLevel::Error, message.to_string()));
    }

    fn section(&self, title: &str) {
        self.lines.lock().unwrap().push((LogLevel::Section, title.to_string()));
    }
}

// =============================================================================
// Failing Memory Backend
// =============================================================================

/// Backend whose every operation fails, as if the database were gone.
#[derive(Debug, Default)]
pub struct FailingBackend;

#[async_trait]
impl MemoryBackend for FailingBackend {
    async fn insert_episode(&self, _draft: EpisodeDraft, _embedding: Vec<f32>, _poisoned: bool) -> Result<Episode> {
        Err(Error::storage("database unavailable"))
    }

    async fn insert_rule(&self, _draft: RuleDraft, _embedding: Vec<f32>, _poisoned: bool) -> Result<Rule> {
        Err(Error::storage("database unavailable"))
    }

    async fn episodes(&self) -> Result<Vec<Episode>> {
        Err(Error::storage("database unavailable"))
    }

    async fn rules(&self) -> Result<Vec<Rule>> {
        Err(Error::storage("database unavailable"))
    }

    async fn counts(&self) -> Result<MemoryCounts> {
        Err(Error::storage("database unavailable"))
    }

    async fn recent_episodes(&self, _limit: usize) -> Result<Vec<Episode>> {
        Err(Error::storage("database unavailable"))
    }

    async fn recent_rules(&self, _limit: usize) -> Result<Vec<Rule>> {
        Err(Error::storage("database unavailable"))
    }
}
