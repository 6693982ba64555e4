use std::fmt;

use serde::{Deserialize, Serialize};

use super::assignment::Assignment;

/// Grades strictly above this value pass.
pub const PASS_THRESHOLD: u8 = 50;

/// Highest grade an assignment can hold.
pub const MAX_GRADE: u8 = 100;

/// Label returned when a status is queried for an assignment never seen.
pub const NOT_ASSIGNED: &str = "Hasn't been assigned";

/// The six positions of an assignment in its lifecycle.
///
/// Each assignment flows through: RELEASED → WORKING → (FINAL_REMINDER) →
/// SUBMITTED → PASS | FAIL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Released,
    Working,
    Submitted,
    FinalReminder,
    Pass,
    Fail,
}

impl AssignmentStatus {
    /// Derive the graded status for a grade.
    pub fn from_grade(grade: u8) -> Self {
        if grade > PASS_THRESHOLD {
            AssignmentStatus::Pass
        } else {
            AssignmentStatus::Fail
        }
    }

    /// Wire name handed to notification sinks.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Released => "released",
            AssignmentStatus::Working => "working",
            AssignmentStatus::Submitted => "submitted",
            AssignmentStatus::FinalReminder => "final reminder",
            AssignmentStatus::Pass => "pass",
            AssignmentStatus::Fail => "fail",
        }
    }

    /// Human-facing label: graded statuses are capitalized, the rest verbatim.
    pub fn label(&self) -> &'static str {
        match self {
            AssignmentStatus::Pass => "Pass",
            AssignmentStatus::Fail => "Fail",
            other => other.as_str(),
        }
    }

    pub fn is_graded(&self) -> bool {
        matches!(self, AssignmentStatus::Pass | AssignmentStatus::Fail)
    }

    /// Work the student still owes: not yet submitted or graded.
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::Released | AssignmentStatus::Working | AssignmentStatus::FinalReminder
        )
    }

    /// The deferred self-transition armed on entering this status, if any.
    pub fn follow_up(&self) -> Option<DeferredAction> {
        match self {
            AssignmentStatus::Working => Some(DeferredAction::AutoSubmit),
            AssignmentStatus::Submitted => Some(DeferredAction::AutoGrade),
            _ => None,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A delayed self-transition registered with the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredAction {
    /// Submit on the student's behalf once the working period lapses.
    AutoSubmit,
    /// Grade a submission once the grading period lapses.
    AutoGrade,
}

impl fmt::Display for DeferredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredAction::AutoSubmit => write!(f, "auto-submit"),
            DeferredAction::AutoGrade => write!(f, "auto-grade"),
        }
    }
}

/// Something that moves an assignment to a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    StartWorking,
    Submit,
    Reminder,
    /// A grade supplied explicitly through a status update.
    Grade(u8),
    /// A deferred transition firing. The grade is only consulted for
    /// `AutoGrade`.
    Deferred(DeferredAction, u8),
}

/// The result of applying a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: AssignmentStatus,
    pub to: AssignmentStatus,
}

/// Applies triggers to an `Assignment`.
pub struct StateMachine;

impl StateMachine {
    /// Apply `trigger` to the assignment and return the transition taken.
    ///
    /// Explicit triggers always apply. Deferred triggers re-check the status
    /// they were scheduled for and return `None` when the assignment has
    /// already moved on:
    /// - `AutoSubmit` only from `Working` or `FinalReminder`.
    /// - `AutoGrade` only from `Submitted`.
    pub fn next(assignment: &mut Assignment, trigger: Trigger) -> Option<Transition> {
        let from = assignment.status;
        match trigger {
            Trigger::StartWorking => assignment.set_status(AssignmentStatus::Working),
            Trigger::Submit => assignment.set_status(AssignmentStatus::Submitted),
            Trigger::Reminder => assignment.set_status(AssignmentStatus::FinalReminder),
            Trigger::Grade(grade) => assignment.set_grade(grade),
            Trigger::Deferred(DeferredAction::AutoSubmit, _) => match from {
                AssignmentStatus::Working | AssignmentStatus::FinalReminder => {
                    assignment.set_status(AssignmentStatus::Submitted)
                }
                _ => return None,
            },
            Trigger::Deferred(DeferredAction::AutoGrade, grade) => match from {
                AssignmentStatus::Submitted => assignment.set_grade(grade),
                _ => return None,
            },
        }

        Some(Transition {
            from,
            to: assignment.status,
        })
    }
}
