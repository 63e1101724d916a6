use snafu::Snafu;

pub type Result<T, E = DriverError> = std::result::Result<T, E>;

/// A GPU driver call failed.
///
/// The driver's error code is carried verbatim; `Clone` lets callers latch
/// a failure and replay it.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{call} failed: {code}"), visibility(pub))]
pub struct DriverError {
    /// Driver entry point that failed.
    pub call: &'static str,
    /// Driver error code or message, verbatim.
    pub code: String,
}

/// The external assembler rejected a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{reason}"), visibility(pub))]
pub struct CompileError {
    pub reason: String,
}
