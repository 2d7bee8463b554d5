//! Scheduler status codes

use core::fmt;

/// Result type used by every scheduler directive.
pub type SchedResult<T> = Result<T, SchedError>;

/// Failure of a scheduler directive.
///
/// Every failure is a permanent rejection of that call with that input and
/// leaves all scheduler state exactly as it was before the call.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedError {
    /// Unknown scheduler instance or task identifier
    InvalidId = 4,
    /// Unknown name, invalid processor index, or no online processor in a set
    InvalidName = 3,
    /// Numeric argument out of range (processor not owned, bad budget)
    InvalidNumber = 10,
    /// Priority outside the instance's range
    InvalidPriority = 19,
    /// Caller-supplied buffer too small or malformed
    InvalidSize = 8,
    /// Object is in a state that forbids the operation
    IncorrectState = 14,
    /// Object is still referenced and cannot be changed
    ResourceInUse = 12,
    /// Processor or feature not configured for use
    NotConfigured = 22,
    /// Request cannot be satisfied with the current assignment
    Unsatisfied = 13,
    /// Capacity of a table or instance exhausted
    TooMany = 5,
    /// Directive issued from interrupt context
    CalledFromInterrupt = 18,
    /// Scheduler system not initialised
    NotDefined = 11,
}

/// Taxonomy of directive failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Identifier,
    StateConflict,
    ResourceExhaustion,
}

impl SchedError {
    pub const fn as_str(self) -> &'static str {
        match self {
            SchedError::InvalidId => "invalid id",
            SchedError::InvalidName => "invalid name",
            SchedError::InvalidNumber => "invalid number",
            SchedError::InvalidPriority => "invalid priority",
            SchedError::InvalidSize => "invalid size",
            SchedError::IncorrectState => "incorrect state",
            SchedError::ResourceInUse => "resource in use",
            SchedError::NotConfigured => "not configured",
            SchedError::Unsatisfied => "unsatisfied",
            SchedError::TooMany => "too many",
            SchedError::CalledFromInterrupt => "called from interrupt",
            SchedError::NotDefined => "not defined",
        }
    }

    /// Numeric status code
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn category(self) -> ErrorCategory {
        match self {
            SchedError::InvalidId
            | SchedError::InvalidName
            | SchedError::InvalidNumber
            | SchedError::InvalidPriority
            | SchedError::NotDefined => ErrorCategory::Identifier,
            SchedError::IncorrectState
            | SchedError::ResourceInUse
            | SchedError::NotConfigured
            | SchedError::Unsatisfied
            | SchedError::CalledFromInterrupt => ErrorCategory::StateConflict,
            SchedError::InvalidSize | SchedError::TooMany => ErrorCategory::ResourceExhaustion,
        }
    }
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}
