//! ObservationScope for begin/complete logging around a unit of work
//!
//! - Logs `{name}_BEGIN` on creation (TRACE)
//! - Logs `{name}_COMPLETE` with elapsed microseconds on `complete` (TRACE)
//! - Logs `{name}_ERROR` on `fail` (ERROR)
//! - Logs `{name}_INCOMPLETE` if dropped without either (WARN)

use std::cell::Cell;
use std::time::Instant;

use super::logger::Logger;

/// A scope that logs its own lifecycle
///
/// ```ignore
/// let scope = ObservationScope::with_fields("SEGMENT_FILTER", &[("segment", "7")]);
/// // ... evaluate ...
/// scope.complete_with_fields(&[("matched", "42")]);
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: Cell<bool>,
    fields: Vec<(&'a str, String)>,
    started: Instant,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope carrying fields on every event
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::trace(&format!("{}_BEGIN", name), fields);

        Self {
            name,
            completed: Cell::new(false),
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
        }
    }

    /// Microseconds since the scope was opened
    pub fn elapsed_us(&self) -> u128 {
        self.started.elapsed().as_micros()
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as completed with additional fields
    pub fn complete_with_fields(self, extra_fields: &[(&str, &str)]) {
        self.completed.set(true);
        let elapsed = self.elapsed_us().to_string();

        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.extend(extra_fields.iter().copied());
        all_fields.push(("elapsed_us", elapsed.as_str()));

        Logger::trace(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    /// Mark the scope as failed
    pub fn fail(self, reason: &str) {
        self.completed.set(true);

        let mut all_fields: Vec<(&str, &str)> =
            self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all_fields.push(("reason", reason));

        Logger::error(&format!("{}_ERROR", self.name), &all_fields);
    }

    /// Check if the scope has been completed or failed
    pub fn is_completed(&self) -> bool {
        self.completed.get()
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed.get() {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logger::capture;

    fn names(events: &[serde_json::Value]) -> Vec<&str> {
        events.iter().filter_map(|e| e["event"].as_str()).collect()
    }

    #[test]
    fn test_scope_starts_incomplete() {
        let events = capture::events(|| {
            let scope = ObservationScope::new("TEST");
            assert!(!scope.is_completed());
            scope.complete();
        });
        assert_eq!(names(&events), vec!["TEST_BEGIN", "TEST_COMPLETE"]);
    }

    #[test]
    fn test_scope_with_fields_complete() {
        let events = capture::events(|| {
            let scope = ObservationScope::with_fields("TEST", &[("segment", "1")]);
            scope.complete_with_fields(&[("matched", "3")]);
        });
        assert_eq!(names(&events), vec!["TEST_BEGIN", "TEST_COMPLETE"]);
        assert_eq!(events[0]["segment"], "1");
        let complete = &events[1];
        assert_eq!(complete["severity"], "TRACE");
        assert_eq!(complete["segment"], "1");
        assert_eq!(complete["matched"], "3");
        assert!(complete["elapsed_us"].is_string());
    }

    #[test]
    fn test_scope_fail() {
        let events = capture::events(|| {
            let scope = ObservationScope::with_fields("TEST", &[("segment", "1")]);
            scope.fail("EVAL_MISSING_FIELD");
        });
        assert_eq!(names(&events), vec!["TEST_BEGIN", "TEST_ERROR"]);
        assert_eq!(events[1]["severity"], "ERROR");
        assert_eq!(events[1]["reason"], "EVAL_MISSING_FIELD");
        assert_eq!(events[1]["segment"], "1");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let events = capture::events(|| {
            let scope = ObservationScope::new("TEST");
            assert!(!scope.is_completed());
            drop(scope);
        });
        assert_eq!(names(&events), vec!["TEST_BEGIN", "TEST_INCOMPLETE"]);
        assert_eq!(events[1]["severity"], "WARN");
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let scope = ObservationScope::new("TEST");
        let first = scope.elapsed_us();
        let second = scope.elapsed_us();
        assert!(second >= first);
        scope.complete();
    }
}
