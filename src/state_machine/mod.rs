mod assignment;
mod status;

pub use assignment::{Assignment, overall_grade};
pub use status::{
    AssignmentStatus, DeferredAction, MAX_GRADE, NOT_ASSIGNED, PASS_THRESHOLD, StateMachine,
    Transition, Trigger,
};
