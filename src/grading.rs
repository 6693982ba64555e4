//! Grade sources consulted when a submission is auto-graded.

use std::collections::VecDeque;

use rand::Rng;

use crate::state_machine::MAX_GRADE;

/// Produces the grade for the next auto-graded submission, in `[0, 100]`.
pub trait GradeSource: Send {
    fn next_grade(&mut self) -> u8;
}

impl<F> GradeSource for F
where
    F: FnMut() -> u8 + Send,
{
    fn next_grade(&mut self) -> u8 {
        self().min(MAX_GRADE)
    }
}

/// Uniformly random grades.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGrades;

impl GradeSource for RandomGrades {
    fn next_grade(&mut self) -> u8 {
        rand::thread_rng().gen_range(0..=MAX_GRADE)
    }
}

/// Always the same grade.
#[derive(Debug, Clone, Copy)]
pub struct FixedGrade(pub u8);

impl GradeSource for FixedGrade {
    fn next_grade(&mut self) -> u8 {
        self.0.min(MAX_GRADE)
    }
}

/// Grades handed out in order; `fallback` once the script runs out.
#[derive(Debug, Clone)]
pub struct ScriptedGrades {
    grades: VecDeque<u8>,
    fallback: u8,
}

impl ScriptedGrades {
    pub fn new(grades: impl IntoIterator<Item = u8>, fallback: u8) -> Self {
        Self {
            grades: grades.into_iter().collect(),
            fallback,
        }
    }

    pub fn remaining(&self) -> usize {
        self.grades.len()
    }
}

impl GradeSource for ScriptedGrades {
    fn next_grade(&mut self) -> u8 {
        self.grades
            .pop_front()
            .unwrap_or(self.fallback)
            .min(MAX_GRADE)
    }
}
