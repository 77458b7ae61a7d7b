//! Utility macros used internally by the relay crate.

/// Returns early with an error if a condition is not met.
///
/// Works like `assert!`, except the failure is reported through the
/// function's `Result` instead of a panic.
///
/// # Arguments
///
/// * `$predicate` - A boolean expression that should evaluate to true
/// * `$error` - The error value to return if the predicate is false
///
/// # Example
///
/// ```ignore
/// ensure!(max_size > 0, RelayError::invalid_state("read size must be positive"));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
