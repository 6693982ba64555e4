//! Class roster: enrolment, bulk release, outstanding-work search and the
//! reminder sweep.
//!
//! The classroom also owns the shared timeline. [`Classroom::advance`] moves
//! every student's clock together, firing deferred transitions across the
//! whole roster in due order, with equal due times in the order they were
//! scheduled. [`Classroom::run_for`] does the same against
//! tokio's clock, sleeping until each deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::GradeflowConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{GradeflowError, Result};
use crate::scheduler::Sequence;
use crate::student::Student;

/// Ordered students with unique full names.
#[derive(Debug)]
pub struct Classroom {
    students: Vec<Student>,
    dispatcher: Option<Arc<Dispatcher>>,
    delay: Duration,
    now: Duration,
    sequence: Sequence,
}

impl Default for Classroom {
    fn default() -> Self {
        Self::from_config(&GradeflowConfig::default())
    }
}

impl Classroom {
    pub fn new(dispatcher: Option<Arc<Dispatcher>>, delay: Duration) -> Self {
        Self {
            students: Vec::new(),
            dispatcher,
            delay,
            now: Duration::ZERO,
            sequence: Sequence::default(),
        }
    }

    pub fn from_config(config: &GradeflowConfig) -> Self {
        Self::new(config.dispatcher(), config.transition_delay())
    }

    /// Create a student wired to this classroom's dispatcher and delay.
    pub fn enroll(&mut self, full_name: &str, email: &str) -> Result<&mut Student> {
        let student = Student::new(full_name, email)
            .with_dispatcher(self.dispatcher.clone())
            .with_delay(self.delay);
        self.add_student(student)
    }

    /// Add a prebuilt student. Its clock is brought up to the classroom's and
    /// its future transitions are ordered against the rest of the roster.
    pub fn add_student(&mut self, mut student: Student) -> Result<&mut Student> {
        if self.find_student(student.full_name()).is_some() {
            return Err(GradeflowError::DuplicateStudent(
                student.full_name().to_string(),
            ));
        }

        student.run_until(self.now);
        student.share_sequence(self.sequence.clone());
        tracing::info!(student = %student.full_name(), "Student added to the class list");
        self.students.push(student);
        let last = self.students.len() - 1;
        Ok(&mut self.students[last])
    }

    pub fn remove_student(&mut self, full_name: &str) -> Option<Student> {
        let idx = self.students.iter().position(|s| s.full_name() == full_name)?;
        tracing::info!(student = %full_name, "Student removed from the class list");
        Some(self.students.remove(idx))
    }

    pub fn find_student(&self, full_name: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.full_name() == full_name)
    }

    pub fn find_student_mut(&mut self, full_name: &str) -> Option<&mut Student> {
        self.students.iter_mut().find(|s| s.full_name() == full_name)
    }

    /// Like [`find_student_mut`](Self::find_student_mut), as an error.
    ///
    /// Renaming through the returned student bypasses the roster's uniqueness
    /// check; use [`rename_student`](Self::rename_student) instead.
    pub fn student_mut(&mut self, full_name: &str) -> Result<&mut Student> {
        self.find_student_mut(full_name)
            .ok_or_else(|| GradeflowError::StudentNotFound(full_name.to_string()))
    }

    /// Change a student's full name, keeping names unique across the roster.
    pub fn rename_student(&mut self, full_name: &str, new_name: &str) -> Result<()> {
        if new_name != full_name && self.find_student(new_name).is_some() {
            return Err(GradeflowError::DuplicateStudent(new_name.to_string()));
        }

        self.student_mut(full_name)?.set_full_name(new_name);
        tracing::info!(student = %full_name, new_name = %new_name, "Student renamed");
        Ok(())
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Names of students who still owe work, in roster order.
    ///
    /// With an assignment name, students who have not submitted it, including
    /// those who never saw it. Without one, students with any outstanding
    /// assignment.
    pub fn find_outstanding(&self, assignment_name: Option<&str>) -> Vec<String> {
        self.students
            .iter()
            .filter(|s| s.has_outstanding(assignment_name))
            .map(|s| s.full_name().to_string())
            .collect()
    }

    /// Release every assignment to every student. Each assignment reaches the
    /// whole roster before the next one is released.
    pub fn release_assignments(&mut self, assignment_names: &[&str]) {
        for name in assignment_names {
            for student in &mut self.students {
                student.update_status(name, None);
            }
        }
    }

    /// Send the final reminder for `assignment_name` to every student who has
    /// not submitted it. Returns the names reminded.
    pub fn send_reminder(&mut self, assignment_name: &str) -> Vec<String> {
        let outstanding = self.find_outstanding(Some(assignment_name));
        for student in &mut self.students {
            if outstanding.iter().any(|name| name == student.full_name()) {
                student.receive_reminder(assignment_name);
            }
        }
        tracing::info!(
            assignment = %assignment_name,
            reminded = outstanding.len(),
            "Sent final reminder"
        );
        outstanding
    }

    /// Current virtual time shared by the roster.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Deferred transitions pending across the roster.
    pub fn pending_count(&self) -> usize {
        self.students.iter().map(Student::pending_count).sum()
    }

    /// Earliest due time across the roster.
    pub fn next_due(&self) -> Option<Duration> {
        self.students.iter().filter_map(Student::next_due).min()
    }

    /// Move the shared clock forward by `by`. Returns how many deferred
    /// transitions fired.
    pub fn advance(&mut self, by: Duration) -> usize {
        let deadline = self.now.saturating_add(by);
        self.run_until(deadline)
    }

    /// Fire everything due at or before `deadline`, earliest first. Equal due
    /// times go in the order they were scheduled, across students.
    pub fn run_until(&mut self, deadline: Duration) -> usize {
        let mut fired = 0;
        loop {
            let next = self
                .students
                .iter()
                .enumerate()
                .filter_map(|(idx, s)| s.next_slot().map(|(due, seq)| (due, seq, idx)))
                .filter(|(due, _, _)| *due <= deadline)
                .min();

            let Some((_, _, idx)) = next else { break };
            if self.students[idx].fire_next(deadline) {
                fired += 1;
            }
        }

        for student in &mut self.students {
            student.run_until(deadline);
        }
        self.now = self.now.max(deadline);
        fired
    }

    /// Let `span` of real time pass, firing each deferred transition when
    /// tokio's clock reaches its due time.
    pub async fn run_for(&mut self, span: Duration) -> usize {
        let end = self.now.saturating_add(span);
        let mut fired = 0;

        while let Some(due) = self.next_due().filter(|due| *due <= end) {
            sleep(due.saturating_sub(self.now)).await;
            fired += self.run_until(due);
        }

        sleep(end.saturating_sub(self.now)).await;
        fired + self.run_until(end)
    }
}
