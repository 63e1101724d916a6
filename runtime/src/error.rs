//! Error types for kernel-call dispatch.

use snafu::Snafu;

use warpcall_device::{CompileError, DriverError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the runtime.
///
/// `Clone` because an autotuning failure is latched once and replayed on
/// every later launch of the same call.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// Malformed blob, bad parameter, or a request the device cannot
    /// satisfy.
    #[snafu(display("{message}"))]
    InvalidArgument { message: String },

    /// A GPU driver call failed.
    #[snafu(context(false), display("{source}"))]
    Driver { source: DriverError },

    /// The external assembler rejected a kernel.
    #[snafu(context(false), display("{source}"))]
    Compile { source: CompileError },
}
