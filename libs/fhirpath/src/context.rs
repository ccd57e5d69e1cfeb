//! Evaluation context
//!
//! Carries everything an evaluation needs besides the expression and the
//! input collection: the fixed evaluation instant, external constants,
//! the optional reference resolver and the optional trace sink.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{FixedOffset, Timelike, Utc};

use crate::value::{Collection, Node, Value};

/// Resolves `Reference.reference` strings for the `resolve()` function.
///
/// Server-side evaluation typically wires this to the backend; standalone
/// evaluation leaves it unset, in which case `resolve()` only follows
/// `#local` contained references.
pub trait ResourceResolver: Send + Sync {
    fn resolve(&self, reference: &str) -> Option<serde_json::Value>;
}

/// Sink for `trace()` output.
pub type TraceSink = dyn Fn(&str, &Collection) + Send + Sync;

/// Shared, immutable evaluation context.
///
/// `now()`, `today()` and `timeOfDay()` all read the instant fixed here,
/// so repeated calls within one evaluation agree; tests inject a known
/// instant via [`EvalContext::at_instant`].
#[derive(Clone)]
pub struct EvalContext {
    instant: chrono::DateTime<FixedOffset>,
    externals: HashMap<String, Collection>,
    resolver: Option<Arc<dyn ResourceResolver>>,
    trace_sink: Option<Arc<TraceSink>>,
}

impl std::fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvalContext")
            .field("instant", &self.instant)
            .field("externals", &self.externals.keys())
            .finish_non_exhaustive()
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalContext {
    /// Context with the evaluation instant taken from the system clock.
    pub fn new() -> Self {
        Self::at_instant(Utc::now().fixed_offset())
    }

    /// Context with an explicit evaluation instant (millisecond-truncated).
    pub fn at_instant(instant: chrono::DateTime<FixedOffset>) -> Self {
        let millis = instant.nanosecond() / 1_000_000;
        let instant = instant
            .with_nanosecond(millis * 1_000_000)
            .unwrap_or(instant);
        let mut externals = HashMap::new();
        externals.insert(
            "ucum".to_string(),
            Collection::single(Value::String("http://unitsofmeasure.org".to_string())),
        );
        externals.insert(
            "sct".to_string(),
            Collection::single(Value::String("http://snomed.info/sct".to_string())),
        );
        externals.insert(
            "loinc".to_string(),
            Collection::single(Value::String("http://loinc.org".to_string())),
        );
        Self {
            instant,
            externals,
            resolver: None,
            trace_sink: None,
        }
    }

    /// Bind `%context`, `%resource` and `%rootResource` to a resource.
    pub fn with_resource(self, resource: &serde_json::Value) -> Self {
        let node = Collection::single(Value::Node(Node::from_json(resource.clone())));
        self.with_constant("context", node.clone())
            .with_constant("resource", node.clone())
            .with_constant("rootResource", node)
    }

    /// Register an external constant accessible as `%name`.
    pub fn with_constant(mut self, name: impl Into<String>, value: Collection) -> Self {
        self.externals.insert(name.into(), value);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ResourceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_trace_sink(mut self, sink: Arc<TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    pub fn instant(&self) -> chrono::DateTime<FixedOffset> {
        self.instant
    }

    pub(crate) fn external(&self, name: &str) -> Option<&Collection> {
        self.externals.get(name)
    }

    pub(crate) fn resolver(&self) -> Option<&Arc<dyn ResourceResolver>> {
        self.resolver.as_ref()
    }

    pub(crate) fn trace(&self, name: &str, values: &Collection) {
        if let Some(sink) = &self.trace_sink {
            sink(name, values);
        }
    }
}
