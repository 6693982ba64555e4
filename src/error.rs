use thiserror::Error;

#[derive(Debug, Error)]
pub enum GradeflowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Student already enrolled: {0}")]
    DuplicateStudent(String),

    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GradeflowError>;
