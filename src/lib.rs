//! Assignment lifecycle tracking for a classroom.
//!
//! Each [`Student`] keeps a ledger of assignments that move through
//! `released → working → (final reminder) → submitted → pass | fail`.
//! Working and submitted assignments advance on their own after a fixed delay
//! through a per-student [`DeferredScheduler`]; every transition is broadcast
//! through a [`Dispatcher`] to its [`NotificationSink`]s. A [`Classroom`]
//! groups students and drives their shared clock.

pub mod classroom;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod grading;
pub mod scheduler;
pub mod state_machine;
pub mod student;

pub use classroom::Classroom;
pub use config::{GradeflowConfig, SinkKind};
pub use dispatcher::{
    ConsoleSink, Dispatcher, Notification, NotificationSink, RecordingSink, TracingSink,
    render_message,
};
pub use error::{GradeflowError, Result};
pub use grading::{FixedGrade, GradeSource, RandomGrades, ScriptedGrades};
pub use scheduler::{DeferredHandle, DeferredScheduler, Fired};
pub use state_machine::{Assignment, AssignmentStatus, DeferredAction, NOT_ASSIGNED};
pub use student::Student;
