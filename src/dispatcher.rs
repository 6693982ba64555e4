//! Notification fan-out for assignment transitions.
//!
//! The [`Dispatcher`] is called synchronously at every transition and hands the
//! event to each registered [`NotificationSink`]. Sinks receive the status as a
//! plain string so that new statuses never break an older sink; the shared
//! [`render_message`] template falls back to a generic line for anything it
//! does not recognize.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::AssignmentStatus;

/// Receives rendered transition events. Must not panic.
pub trait NotificationSink: Send + Sync {
    fn render(&self, student_name: &str, assignment_name: &str, status: &str);
}

impl<F> NotificationSink for F
where
    F: Fn(&str, &str, &str) + Send + Sync,
{
    fn render(&self, student_name: &str, assignment_name: &str, status: &str) {
        self(student_name, assignment_name, status)
    }
}

/// One-line message for a transition, e.g. `Ada has submitted A1.`
pub fn render_message(student_name: &str, assignment_name: &str, status: &str) -> String {
    match status {
        "released" => format!("{student_name}, {assignment_name} has been released."),
        "working" => format!("{student_name} is working on {assignment_name}."),
        "submitted" => format!("{student_name} has submitted {assignment_name}."),
        "final reminder" => format!("{student_name}, {assignment_name} final reminder."),
        "pass" => format!("{student_name} has passed {assignment_name}."),
        "fail" => format!("{student_name} has failed {assignment_name}."),
        other => format!("{student_name}, {assignment_name} is now {other}."),
    }
}

/// Fans every transition out to its sinks, in registration order.
#[derive(Clone, Default)]
pub struct Dispatcher {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`add_sink`](Self::add_sink).
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn notify(&self, student_name: &str, assignment_name: &str, status: AssignmentStatus) {
        for sink in &self.sinks {
            sink.render(student_name, assignment_name, status.as_str());
        }
    }
}

/// Prints each transition to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn render(&self, student_name: &str, assignment_name: &str, status: &str) {
        println!(
            "Observer → {}",
            render_message(student_name, assignment_name, status)
        );
    }
}

/// Emits each transition as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn render(&self, student_name: &str, assignment_name: &str, status: &str) {
        tracing::info!(
            student = %student_name,
            assignment = %assignment_name,
            status = %status,
            "{}",
            render_message(student_name, assignment_name, status)
        );
    }
}

/// A transition as captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub student: String,
    pub assignment: String,
    pub status: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Keeps every transition in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking reader must not silence later notifications.
    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Recorded statuses, optionally restricted to one assignment.
    pub fn statuses(&self, assignment_name: Option<&str>) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|n| assignment_name.is_none_or(|name| n.assignment == name))
            .map(|n| n.status.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Export the log as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.lock())
    }
}

impl NotificationSink for RecordingSink {
    fn render(&self, student_name: &str, assignment_name: &str, status: &str) {
        self.lock().push(Notification {
            student: student_name.to_string(),
            assignment: assignment_name.to_string(),
            status: status.to_string(),
            message: render_message(student_name, assignment_name, status),
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_messages() {
        assert_eq!(
            render_message("Alice Smith", "A1", "released"),
            "Alice Smith, A1 has been released."
        );
        assert_eq!(
            render_message("Alice Smith", "A1", "working"),
            "Alice Smith is working on A1."
        );
        assert_eq!(
            render_message("Bob Jones", "A2", "final reminder"),
            "Bob Jones, A2 final reminder."
        );
        assert_eq!(
            render_message("Bob Jones", "A2", "fail"),
            "Bob Jones has failed A2."
        );
    }

    #[test]
    fn unknown_status_falls_back() {
        assert_eq!(
            render_message("Alice Smith", "A1", "archived"),
            "Alice Smith, A1 is now archived."
        );
    }

    #[test]
    fn dispatcher_fans_out_in_order() {
        let first = Arc::new(RecordingSink::new());
        let second = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new()
            .with_sink(first.clone())
            .with_sink(second.clone());

        dispatcher.notify("Ada", "A1", AssignmentStatus::Released);
        dispatcher.notify("Ada", "A1", AssignmentStatus::FinalReminder);

        assert_eq!(dispatcher.sink_count(), 2);
        assert_eq!(first.statuses(None), vec!["released", "final reminder"]);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn empty_dispatcher_is_noop() {
        Dispatcher::new().notify("Ada", "A1", AssignmentStatus::Pass);
    }

    #[test]
    fn closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = move |student: &str, assignment: &str, status: &str| {
            captured
                .lock()
                .unwrap()
                .push(format!("{student}/{assignment}/{status}"));
        };

        let dispatcher = Dispatcher::new().with_sink(Arc::new(sink));
        dispatcher.notify("Ada", "A1", AssignmentStatus::Working);

        assert_eq!(*seen.lock().unwrap(), vec!["Ada/A1/working".to_string()]);
    }

    #[test]
    fn recording_sink_filters_and_exports() {
        let sink = RecordingSink::new();
        sink.render("Ada", "A1", "released");
        sink.render("Ada", "A2", "released");
        sink.render("Ada", "A1", "working");

        assert_eq!(sink.statuses(Some("A1")), vec!["released", "working"]);
        let events = sink.events();
        assert_eq!(events[1].message, "Ada, A2 has been released.");

        let json = sink.to_json().unwrap();
        let parsed: Vec<Notification> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 3);

        sink.clear();
        assert!(sink.is_empty());
    }
}
