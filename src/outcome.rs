//! Admission outcomes as values.
//!
//! Every limiter operation reports its result through [`Outcome`] instead of
//! returning an error or panicking. Denial of a request is an expected state
//! of a working limiter, so exhaustion is modeled as `Success(false)`;
//! `Failure` is reserved for operational conditions (e.g. asking a shut-down
//! registry for admission).

/// Result of a limiter operation.
///
/// Exactly one variant is populated: either the operation produced a value,
/// or it could not be performed and carries a reason.
///
/// ```rust
/// use tollgate::Outcome;
///
/// let granted: Outcome<bool> = Outcome::success(true);
/// assert!(granted.is_success());
///
/// let shut: Outcome<bool> = Outcome::failure("limiter shut down");
/// assert_eq!(shut.reason(), Some("limiter shut down"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation completed and produced a value.
    ///
    /// For admission checks the value is `true` (token granted) or `false`
    /// (bucket exhausted) — exhaustion is a successful check, not a failure.
    Success(T),
    /// The operation could not be performed.
    Failure {
        /// Why the operation was refused (e.g. "limiter shut down").
        reason: String,
    },
}

impl<T> Outcome<T> {
    /// Wrap a value in `Success`.
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Wrap a reason in `Failure`.
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure { reason: reason.into() }
    }

    /// Apply `f` to the success value; `Failure` passes through unchanged.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure { reason } => Outcome::Failure { reason },
        }
    }

    /// Check if this outcome is a `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Check if this outcome is a `Failure`.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }

    /// Extract the success value, if present.
    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    /// Borrow the success value, if present.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    /// Borrow the failure reason, if present.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Failure { reason } => Some(reason.as_str()),
            Outcome::Success(_) => None,
        }
    }
}

impl Outcome<bool> {
    /// Convenience for admission checks: `Success(true)`.
    pub fn granted(&self) -> bool {
        matches!(self, Outcome::Success(true))
    }
}
