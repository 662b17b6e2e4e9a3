//! Operation type → remote route table.

use std::fmt;

use hashbrown::HashMap;
use serde_json::Value;

use crate::types::OperationType;

/// Request method of a remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Create or upsert.
    Post,
    /// Partial update.
    Patch,
    /// Delete.
    Delete,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a route sends as the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// The payload unchanged, as JSON.
    AsIs,
    /// No body.
    Empty,
}

/// Shape of the remote call for one operation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Request method.
    pub method: Method,
    /// Collection path segment, e.g. `tasks`.
    pub resource: &'static str,
    /// Payload field appended as a second path segment, e.g. `id`.
    pub key: Option<&'static str>,
    /// Body handling.
    pub body: BodyMode,
}

impl Route {
    const fn collection(method: Method, resource: &'static str) -> Self {
        Self {
            method,
            resource,
            key: None,
            body: BodyMode::AsIs,
        }
    }

    const fn member(
        method: Method,
        resource: &'static str,
        key: &'static str,
        body: BodyMode,
    ) -> Self {
        Self {
            method,
            resource,
            key: Some(key),
            body,
        }
    }

    /// Resolves this route against a record payload.
    pub fn resolve(&self, payload: &Value) -> Result<RemoteRequest, DispatchError> {
        let mut segments = vec![self.resource.to_string()];
        if let Some(field) = self.key {
            segments.push(path_key(payload, field)?);
        }
        let body = match self.body {
            BodyMode::AsIs => Some(payload.clone()),
            BodyMode::Empty => None,
        };
        Ok(RemoteRequest {
            method: self.method,
            segments,
            body,
        })
    }
}

/// A fully resolved remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    /// Request method.
    pub method: Method,
    /// Path segments below the service base, unencoded.
    pub segments: Vec<String>,
    /// JSON body, if any.
    pub body: Option<Value>,
}

impl RemoteRequest {
    /// Slash-joined path for logs, e.g. `/tasks/42`.
    pub fn path(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            out.push_str(segment);
        }
        out
    }
}

/// A record could not be turned into a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The table has no route for this operation type.
    #[error("Unknown mutation type: {0}")]
    NoRoute(OperationType),
    /// The payload lacks the field the path needs.
    #[error("payload field `{field}` missing or not a string/number")]
    MissingKey {
        /// Payload field name.
        field: &'static str,
    },
}

/// Map from operation type to route.
#[derive(Debug, Clone)]
pub struct DispatchTable {
    routes: HashMap<OperationType, Route>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        use BodyMode::{AsIs, Empty};
        use Method::{Delete, Patch, Post};
        use OperationType::*;

        let mut table = Self::empty();
        table.insert(CreateTask, Route::collection(Post, "tasks"));
        table.insert(UpdateTask, Route::member(Patch, "tasks", "id", AsIs));
        table.insert(DeleteTask, Route::member(Delete, "tasks", "id", Empty));
        // Both habit intents hit the same upsert endpoint.
        table.insert(CreateHabit, Route::collection(Post, "habits"));
        table.insert(UpdateHabit, Route::collection(Post, "habits"));
        table.insert(LogMood, Route::collection(Post, "mood"));
        table.insert(CreateJournal, Route::collection(Post, "journals"));
        table.insert(UpdateJournal, Route::member(Patch, "journals", "slug", AsIs));
        table.insert(CreateEvent, Route::collection(Post, "events"));
        table.insert(UpdateEvent, Route::member(Patch, "events", "id", AsIs));
        table.insert(DeleteEvent, Route::member(Delete, "events", "id", Empty));
        table.insert(LogActivity, Route::collection(Post, "activities"));
        table.insert(CreateGoal, Route::collection(Post, "goals"));
        table.insert(UpdateGoal, Route::member(Patch, "goals", "id", AsIs));
        table
    }
}

impl DispatchTable {
    /// A table with no routes.
    pub fn empty() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Adds or replaces the route for `op`.
    pub fn insert(&mut self, op: OperationType, route: Route) -> Option<Route> {
        self.routes.insert(op, route)
    }

    /// Drops the route for `op`.
    pub fn remove(&mut self, op: OperationType) -> Option<Route> {
        self.routes.remove(&op)
    }

    /// Route for `op`, if any.
    pub fn route(&self, op: OperationType) -> Option<&Route> {
        self.routes.get(&op)
    }

    /// Resolves the remote call for `op` with `payload`.
    pub fn resolve(
        &self,
        op: OperationType,
        payload: &Value,
    ) -> Result<RemoteRequest, DispatchError> {
        self.route(op)
            .ok_or(DispatchError::NoRoute(op))?
            .resolve(payload)
    }
}

fn path_key(payload: &Value, field: &'static str) -> Result<String, DispatchError> {
    match payload.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(DispatchError::MissingKey { field }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn every_operation_type_has_a_route() {
        let table = DispatchTable::default();
        for op in OperationType::ALL {
            assert!(table.route(op).is_some(), "missing route for {op}");
        }
    }

    #[test]
    fn member_routes_read_key_from_payload() {
        let table = DispatchTable::default();

        let req = table
            .resolve(OperationType::UpdateTask, &json!({"id": 42, "title": "x"}))
            .unwrap();
        assert_eq!(req.method, Method::Patch);
        assert_eq!(req.path(), "/tasks/42");
        assert_eq!(req.body, Some(json!({"id": 42, "title": "x"})));

        let req = table
            .resolve(OperationType::UpdateJournal, &json!({"slug": "day-one"}))
            .unwrap();
        assert_eq!(req.path(), "/journals/day-one");
    }

    #[test]
    fn deletes_send_no_body() {
        let table = DispatchTable::default();
        let req = table
            .resolve(OperationType::DeleteEvent, &json!({"id": "ev-1"}))
            .unwrap();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.path(), "/events/ev-1");
        assert!(req.body.is_none());
    }

    #[test]
    fn habits_share_the_upsert_endpoint() {
        let table = DispatchTable::default();
        let create = table.route(OperationType::CreateHabit).unwrap();
        let update = table.route(OperationType::UpdateHabit).unwrap();
        assert_eq!(create, update);
    }

    #[test]
    fn missing_key_and_missing_route_are_errors() {
        let mut table = DispatchTable::default();
        assert_eq!(
            table.resolve(OperationType::DeleteTask, &json!({"title": "x"})),
            Err(DispatchError::MissingKey { field: "id" })
        );

        table.remove(OperationType::LogMood);
        let err = table.resolve(OperationType::LogMood, &json!({})).unwrap_err();
        assert_eq!(err, DispatchError::NoRoute(OperationType::LogMood));
        assert_eq!(err.to_string(), "Unknown mutation type: log-mood");
    }
}
