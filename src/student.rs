//! A student's assignment ledger.
//!
//! [`Student`] owns its assignment records, derives the overall grade, and
//! drives every record through the [`StateMachine`]. Each transition is
//! broadcast synchronously through the optional [`Dispatcher`]; transitions
//! that arm a deferred follow-up register it with the student's own
//! [`DeferredScheduler`], keyed by assignment name. Deferred transitions fire
//! when the clock is moved with [`Student::advance`] or [`Student::run_until`].

use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_TRANSITION_DELAY;
use crate::dispatcher::Dispatcher;
use crate::grading::{GradeSource, RandomGrades};
use crate::scheduler::{DeferredScheduler, Sequence};
use crate::state_machine::{
    Assignment, AssignmentStatus, DeferredAction, MAX_GRADE, NOT_ASSIGNED, StateMachine, Trigger,
    overall_grade,
};

pub struct Student {
    full_name: String,
    email: String,
    ledger: Vec<Assignment>,
    overall_grade: Option<f64>,
    dispatcher: Option<Arc<Dispatcher>>,
    grades: Box<dyn GradeSource>,
    scheduler: DeferredScheduler<String, DeferredAction>,
    delay: Duration,
}

impl std::fmt::Debug for Student {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Student")
            .field("full_name", &self.full_name)
            .field("email", &self.email)
            .field("ledger", &self.ledger)
            .field("overall_grade", &self.overall_grade)
            .field("pending", &self.scheduler.len())
            .finish()
    }
}

impl Student {
    /// A student with no dispatcher, random grading and the default delay.
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            ledger: Vec::new(),
            overall_grade: None,
            dispatcher: None,
            grades: Box::new(RandomGrades),
            scheduler: DeferredScheduler::new(),
            delay: DEFAULT_TRANSITION_DELAY,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Option<Arc<Dispatcher>>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_grade_source(mut self, grades: impl GradeSource + 'static) -> Self {
        self.grades = Box::new(grades);
        self
    }

    /// Latency of both auto-submit and auto-grade.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_full_name(&mut self, full_name: impl Into<String>) {
        self.full_name = full_name.into();
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn has_dispatcher(&self) -> bool {
        self.dispatcher.is_some()
    }

    pub fn assignment(&self, name: &str) -> Option<&Assignment> {
        self.ledger.iter().find(|a| a.name == name)
    }

    /// Records in first-seen order.
    pub fn assignments(&self) -> &[Assignment] {
        &self.ledger
    }

    pub fn overall_grade(&self) -> Option<f64> {
        self.overall_grade
    }

    /// Human-facing status label, or [`NOT_ASSIGNED`] for an unseen name.
    pub fn query_status(&self, name: &str) -> &'static str {
        self.assignment(name)
            .map_or(NOT_ASSIGNED, |a| a.status.label())
    }

    /// Whether any record is still outstanding. With `name`, whether that
    /// assignment is outstanding; an unseen name counts as outstanding.
    pub fn has_outstanding(&self, name: Option<&str>) -> bool {
        match name {
            Some(name) => self
                .assignment(name)
                .is_none_or(|a| a.status.is_outstanding()),
            None => self.ledger.iter().any(|a| a.status.is_outstanding()),
        }
    }

    /// Ensure the assignment exists, then apply an explicit grade if given.
    ///
    /// First mention only releases the assignment; a grade is applied to
    /// existing records alone. Grades above 100 are ignored.
    pub fn update_status(&mut self, name: &str, grade: Option<u8>) {
        let Some(idx) = self.position(name) else {
            self.release(name);
            return;
        };

        match grade {
            Some(grade) if grade <= MAX_GRADE => {
                self.apply(idx, Trigger::Grade(grade));
            }
            Some(grade) => {
                tracing::warn!(
                    student = %self.full_name,
                    assignment = %name,
                    grade,
                    "Ignoring out-of-range grade"
                );
            }
            None => {}
        }
    }

    pub fn start_working(&mut self, name: &str) {
        let idx = self.ensure_assignment(name);
        self.cancel_pending(name);
        self.apply(idx, Trigger::StartWorking);
    }

    /// Submit explicitly. Also re-opens grading for an already graded record.
    pub fn submit(&mut self, name: &str) {
        let idx = self.ensure_assignment(name);
        self.cancel_pending(name);
        self.apply(idx, Trigger::Submit);
    }

    /// Final reminder: marks the record, then submits it straight away.
    pub fn receive_reminder(&mut self, name: &str) {
        let idx = self.ensure_assignment(name);
        self.cancel_pending(name);
        self.apply(idx, Trigger::Reminder);
        self.apply(idx, Trigger::Submit);
    }

    /// Current virtual time of this student's scheduler.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Due time of the earliest pending deferred transition.
    pub fn next_due(&self) -> Option<Duration> {
        self.scheduler.next_due()
    }

    /// Due time and scheduling order of the earliest pending transition.
    pub fn next_slot(&self) -> Option<(Duration, u64)> {
        self.scheduler.next_slot()
    }

    /// Take scheduling order from a counter shared with other students.
    pub(crate) fn share_sequence(&mut self, sequence: Sequence) {
        self.scheduler.set_sequence(sequence);
    }

    pub fn pending_action(&self, name: &str) -> Option<DeferredAction> {
        self.scheduler.pending_action(&name.to_string())
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Move the clock forward by `by`, firing what falls due. Returns how many
    /// deferred transitions fired.
    pub fn advance(&mut self, by: Duration) -> usize {
        let deadline = self.scheduler.now().saturating_add(by);
        self.run_until(deadline)
    }

    /// Fire every deferred transition due at or before `deadline`, including
    /// ones scheduled along the way, then park the clock at `deadline`.
    pub fn run_until(&mut self, deadline: Duration) -> usize {
        let mut fired = 0;
        while self.fire_next(deadline) {
            fired += 1;
        }
        self.scheduler.advance_to(deadline);
        fired
    }

    /// Fire the earliest deferred transition due at or before `deadline`.
    pub fn fire_next(&mut self, deadline: Duration) -> bool {
        let Some(fired) = self.scheduler.pop_due(deadline) else {
            return false;
        };

        match self.position(&fired.key) {
            Some(idx) => {
                // Only draw a grade for a submission that will actually be graded.
                let grade = match fired.action {
                    DeferredAction::AutoGrade
                        if self.ledger[idx].status == AssignmentStatus::Submitted =>
                    {
                        self.grades.next_grade().min(MAX_GRADE)
                    }
                    _ => 0,
                };
                if !self.apply(idx, Trigger::Deferred(fired.action, grade)) {
                    tracing::debug!(
                        student = %self.full_name,
                        assignment = %fired.key,
                        action = %fired.action,
                        "Skipping stale deferred transition"
                    );
                }
            }
            None => {
                tracing::debug!(assignment = %fired.key, "Deferred transition for unknown assignment");
            }
        }
        true
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.ledger.iter().position(|a| a.name == name)
    }

    /// Get-or-create. Creating a record announces it as released.
    fn ensure_assignment(&mut self, name: &str) -> usize {
        match self.position(name) {
            Some(idx) => idx,
            None => self.release(name),
        }
    }

    fn release(&mut self, name: &str) -> usize {
        self.ledger.push(Assignment::new(name));
        let idx = self.ledger.len() - 1;
        self.notify(idx);
        idx
    }

    fn cancel_pending(&mut self, name: &str) {
        if self.scheduler.cancel(&name.to_string()) {
            tracing::debug!(
                student = %self.full_name,
                assignment = %name,
                "Cancelled pending deferred transition"
            );
        }
    }

    /// Run one trigger through the state machine and carry out its side
    /// effects: overall grade refresh, notification, deferred follow-up.
    /// Returns false when the trigger's guard rejected it.
    fn apply(&mut self, idx: usize, trigger: Trigger) -> bool {
        let Some(transition) = StateMachine::next(&mut self.ledger[idx], trigger) else {
            return false;
        };

        if transition.from.is_graded() || transition.to.is_graded() {
            self.overall_grade = overall_grade(&self.ledger);
        }

        self.notify(idx);

        if let Some(action) = transition.to.follow_up() {
            let name = self.ledger[idx].name.clone();
            let handle = self.scheduler.schedule(name.clone(), self.delay, action);
            tracing::debug!(
                student = %self.full_name,
                assignment = %name,
                action = %action,
                due_ms = handle.due().as_millis() as u64,
                "Scheduled deferred transition"
            );
        }
        true
    }

    fn notify(&self, idx: usize) {
        if let Some(dispatcher) = &self.dispatcher {
            let assignment = &self.ledger[idx];
            dispatcher.notify(&self.full_name, &assignment.name, assignment.status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::RecordingSink;
    use crate::grading::{FixedGrade, ScriptedGrades};

    const DELAY: Duration = DEFAULT_TRANSITION_DELAY;

    fn make_student(grades: impl GradeSource + 'static) -> (Student, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let dispatcher = Dispatcher::new().with_sink(sink.clone());
        let student = Student::new("Alice Smith", "alice@example.com")
            .with_dispatcher(Some(Arc::new(dispatcher)))
            .with_grade_source(grades);
        (student, sink)
    }

    #[test]
    fn release_then_idle() {
        let (mut s, sink) = make_student(FixedGrade(70));
        s.update_status("A1", None);

        assert_eq!(s.query_status("A1"), "released");
        assert_eq!(sink.statuses(None), vec!["released"]);
        assert_eq!(s.pending_count(), 0);

        s.advance(Duration::from_secs(10));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn unseen_assignment_is_not_assigned() {
        let (s, sink) = make_student(FixedGrade(70));
        assert_eq!(s.query_status("A9"), NOT_ASSIGNED);
        assert!(sink.is_empty());
    }

    #[test]
    fn full_happy_path() {
        let (mut s, sink) = make_student(FixedGrade(72));
        s.start_working("A1");
        assert_eq!(sink.statuses(None), vec!["released", "working"]);
        assert_eq!(s.pending_action("A1"), Some(DeferredAction::AutoSubmit));

        assert_eq!(s.advance(DELAY), 1);
        assert_eq!(s.query_status("A1"), "submitted");
        assert_eq!(s.pending_action("A1"), Some(DeferredAction::AutoGrade));

        assert_eq!(s.advance(DELAY), 1);
        assert_eq!(s.query_status("A1"), "Pass");
        assert_eq!(s.overall_grade(), Some(72.0));
        assert_eq!(
            sink.statuses(None),
            vec!["released", "working", "submitted", "pass"]
        );
        assert_eq!(s.pending_count(), 0);
    }

    #[test]
    fn single_advance_runs_chained_transitions() {
        let (mut s, sink) = make_student(FixedGrade(20));
        s.start_working("A1");

        assert_eq!(s.advance(Duration::from_secs(5)), 2);
        assert_eq!(s.query_status("A1"), "Fail");
        assert_eq!(sink.statuses(None).last().unwrap(), "fail");
        assert_eq!(s.now(), Duration::from_secs(5));
    }

    #[test]
    fn starting_twice_cancels_first_auto_submit() {
        let (mut s, sink) = make_student(FixedGrade(90));
        s.start_working("A1");
        s.advance(Duration::from_millis(250));
        s.start_working("A1");

        // The first timer would have fired at 500ms.
        assert_eq!(s.advance(Duration::from_millis(300)), 0);
        assert_eq!(s.query_status("A1"), "working");

        assert_eq!(s.advance(Duration::from_millis(200)), 1);
        let submitted = sink
            .statuses(None)
            .iter()
            .filter(|st| *st == "submitted")
            .count();
        assert_eq!(submitted, 1);
    }

    #[test]
    fn reminder_short_circuits_auto_submit() {
        let (mut s, sink) = make_student(ScriptedGrades::new([64], 0));
        s.start_working("A1");
        s.receive_reminder("A1");

        assert_eq!(
            sink.statuses(None),
            vec!["released", "working", "final reminder", "submitted"]
        );
        assert_eq!(s.pending_count(), 1);
        assert_eq!(s.pending_action("A1"), Some(DeferredAction::AutoGrade));

        assert_eq!(s.advance(DELAY), 1);
        assert_eq!(s.advance(Duration::from_secs(10)), 0);
        assert_eq!(
            sink.statuses(None),
            vec!["released", "working", "final reminder", "submitted", "pass"]
        );
        assert_eq!(s.overall_grade(), Some(64.0));
    }

    #[test]
    fn reminder_on_unseen_assignment_releases_first() {
        let (mut s, sink) = make_student(FixedGrade(10));
        s.receive_reminder("A2");
        assert_eq!(
            sink.statuses(None),
            vec!["released", "final reminder", "submitted"]
        );
    }

    #[test]
    fn resubmission_after_grading_regrades() {
        let (mut s, sink) = make_student(ScriptedGrades::new([80, 30], 0));
        s.submit("A1");
        s.advance(DELAY);
        assert_eq!(s.query_status("A1"), "Pass");
        assert_eq!(s.overall_grade(), Some(80.0));

        s.submit("A1");
        assert_eq!(s.query_status("A1"), "submitted");
        assert_eq!(s.assignment("A1").unwrap().grade, None);
        assert_eq!(s.overall_grade(), None);

        s.advance(DELAY);
        assert_eq!(s.query_status("A1"), "Fail");
        assert_eq!(s.overall_grade(), Some(30.0));
        assert_eq!(
            sink.statuses(None),
            vec!["released", "submitted", "pass", "submitted", "fail"]
        );
    }

    #[test]
    fn explicit_grade_leaves_timer_and_timer_goes_stale() {
        let (mut s, sink) = make_student(FixedGrade(10));
        s.start_working("A1");
        s.update_status("A1", Some(95));

        assert_eq!(s.query_status("A1"), "Pass");
        assert_eq!(s.pending_action("A1"), Some(DeferredAction::AutoSubmit));

        // Fires, but the guard rejects it.
        assert_eq!(s.advance(DELAY), 1);
        assert_eq!(s.query_status("A1"), "Pass");
        assert_eq!(sink.statuses(None), vec!["released", "working", "pass"]);
    }

    #[test]
    fn stale_auto_grade_draws_no_grade() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let draws = Arc::new(AtomicUsize::new(0));
        let counter = draws.clone();
        let (mut s, _sink) = make_student(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            99u8
        });
        s.submit("A1");
        s.update_status("A1", Some(40));

        assert_eq!(s.advance(DELAY), 1);
        assert_eq!(draws.load(Ordering::SeqCst), 0);
        assert_eq!(s.query_status("A1"), "Fail");
        assert_eq!(s.overall_grade(), Some(40.0));
    }

    #[test]
    fn advance_by_max_duration_drains_without_overflow() {
        let (mut s, _sink) = make_student(FixedGrade(60));
        s.start_working("A1");
        s.advance(Duration::from_millis(1));

        assert_eq!(s.advance(Duration::MAX), 2);
        assert_eq!(s.query_status("A1"), "Pass");
        assert_eq!(s.now(), Duration::MAX);

        s.start_working("A2");
        assert_eq!(s.next_due(), Some(Duration::MAX));
        assert_eq!(s.advance(Duration::MAX), 2);
    }

    #[test]
    fn custom_grade_source_is_clamped() {
        struct Generous;

        impl GradeSource for Generous {
            fn next_grade(&mut self) -> u8 {
                250
            }
        }

        let (mut s, _sink) = make_student(Generous);
        s.submit("A1");
        s.advance(DELAY);

        assert_eq!(s.assignment("A1").unwrap().grade, Some(MAX_GRADE));
        assert_eq!(s.overall_grade(), Some(100.0));
    }

    #[test]
    fn grade_on_first_mention_only_releases() {
        let (mut s, sink) = make_student(FixedGrade(10));
        s.update_status("A1", Some(90));
        assert_eq!(s.query_status("A1"), "released");
        assert_eq!(s.overall_grade(), None);

        s.update_status("A1", Some(90));
        assert_eq!(s.query_status("A1"), "Pass");
        assert_eq!(sink.statuses(None), vec!["released", "pass"]);
    }

    #[test]
    fn out_of_range_grade_is_ignored() {
        let (mut s, sink) = make_student(FixedGrade(10));
        s.update_status("A1", None);
        s.update_status("A1", Some(101));

        assert_eq!(s.query_status("A1"), "released");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn overall_grade_is_mean_of_graded() {
        let (mut s, _sink) = make_student(FixedGrade(10));
        for name in ["A1", "A2", "A3"] {
            s.update_status(name, None);
        }
        s.update_status("A1", Some(50));
        assert_eq!(s.overall_grade(), Some(50.0));

        s.update_status("A2", Some(51));
        assert_eq!(s.overall_grade(), Some(50.5));

        s.update_status("A4", None);
        assert_eq!(s.overall_grade(), Some(50.5));
        assert_eq!(s.query_status("A1"), "Fail");
        assert_eq!(s.query_status("A2"), "Pass");
    }

    #[test]
    fn missing_dispatcher_still_transitions() {
        let mut s = Student::new("Bob Jones", "bob@example.com").with_grade_source(FixedGrade(60));
        assert!(!s.has_dispatcher());

        s.start_working("A1");
        s.advance(DELAY * 2);
        assert_eq!(s.query_status("A1"), "Pass");
    }

    #[test]
    fn custom_delay() {
        let (s, _sink) = make_student(FixedGrade(60));
        let mut s = s.with_delay(Duration::from_millis(20));
        s.start_working("A1");
        assert_eq!(s.next_due(), Some(Duration::from_millis(20)));
        s.advance(Duration::from_millis(40));
        assert_eq!(s.query_status("A1"), "Pass");
    }

    #[test]
    fn outstanding_tracking() {
        let (mut s, _sink) = make_student(FixedGrade(60));
        assert!(s.has_outstanding(Some("A1")));
        assert!(!s.has_outstanding(None));

        s.start_working("A1");
        assert!(s.has_outstanding(Some("A1")));
        assert!(s.has_outstanding(None));

        s.submit("A1");
        assert!(!s.has_outstanding(Some("A1")));
        assert!(!s.has_outstanding(None));
    }

    #[test]
    fn identity_setters() {
        let (mut s, sink) = make_student(FixedGrade(60));
        s.set_full_name("Alice Jones");
        s.set_email("ajones@example.com");
        s.update_status("A1", None);

        assert_eq!(s.full_name(), "Alice Jones");
        assert_eq!(s.email(), "ajones@example.com");
        assert_eq!(sink.events()[0].student, "Alice Jones");
    }
}
