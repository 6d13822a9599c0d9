use std::fmt;

#[derive(Debug)]
pub enum ForemanError {
    TransitionError(String),
    CoordinationError(String),
    ExecutionError(String),
    QueueError(String),
    SchedulingError(String),
    EventError(String),
    ConfigurationError(String),
}

impl fmt::Display for ForemanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForemanError::TransitionError(msg) => write!(f, "Transition error: {msg}"),
            ForemanError::CoordinationError(msg) => write!(f, "Coordination error: {msg}"),
            ForemanError::ExecutionError(msg) => write!(f, "Execution error: {msg}"),
            ForemanError::QueueError(msg) => write!(f, "Queue error: {msg}"),
            ForemanError::SchedulingError(msg) => write!(f, "Scheduling error: {msg}"),
            ForemanError::EventError(msg) => write!(f, "Event error: {msg}"),
            ForemanError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ForemanError {}

impl From<crate::jobs::status::TransitionError> for ForemanError {
    fn from(err: crate::jobs::status::TransitionError) -> Self {
        ForemanError::TransitionError(err.to_string())
    }
}

impl From<crate::jobs::coordinator::CoordinatorError> for ForemanError {
    fn from(err: crate::jobs::coordinator::CoordinatorError) -> Self {
        ForemanError::CoordinationError(err.to_string())
    }
}

impl From<crate::workers::queue::QueueError> for ForemanError {
    fn from(err: crate::workers::queue::QueueError) -> Self {
        ForemanError::QueueError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForemanError>;
