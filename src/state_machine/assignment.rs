use serde::{Deserialize, Serialize};

use super::status::AssignmentStatus;

/// One assignment in a student's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub name: String,
    pub status: AssignmentStatus,
    /// Present exactly when `status` is `Pass` or `Fail`.
    pub grade: Option<u8>,
    /// Statuses this assignment has left, oldest first. Grows by one entry per
    /// transition and is never trimmed.
    #[serde(default)]
    pub history: Vec<AssignmentStatus>,
}

impl Assignment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: AssignmentStatus::Released,
            grade: None,
            history: Vec::new(),
        }
    }

    /// Move to a non-graded status. Any previous grade is dropped.
    pub(crate) fn set_status(&mut self, status: AssignmentStatus) {
        self.history.push(self.status);
        self.status = status;
        if !status.is_graded() {
            self.grade = None;
        }
    }

    /// Record a grade and derive pass/fail from it.
    pub(crate) fn set_grade(&mut self, grade: u8) {
        self.history.push(self.status);
        self.grade = Some(grade);
        self.status = AssignmentStatus::from_grade(grade);
    }
}

/// Arithmetic mean of every grade currently held, `None` when nothing is graded.
pub fn overall_grade<'a>(assignments: impl IntoIterator<Item = &'a Assignment>) -> Option<f64> {
    let (total, count) = assignments
        .into_iter()
        .filter_map(|a| a.grade)
        .fold((0u32, 0u32), |(sum, n), g| (sum + u32::from(g), n + 1));

    if count == 0 {
        None
    } else {
        Some(f64::from(total) / f64::from(count))
    }
}
