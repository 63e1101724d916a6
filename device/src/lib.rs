//! Narrow seams over the GPU driver API and the external assembler.
//!
//! The runtime treats both as black boxes: [`GpuDriver`] covers the handful
//! of driver calls kernel dispatch needs (contexts, modules, functions,
//! launches, async memory operations, events), and [`AsmCompiler`] lowers
//! textual device assembly to a loadable binary image. Production
//! implementations are [`CudaDriver`] (behind the `cuda` feature) and the
//! `ptxas` subprocess in [`compile`]; tests substitute fakes.

pub mod compile;
#[cfg(feature = "cuda")]
pub mod cuda;
pub mod driver;
pub mod error;

pub use compile::{AsmCompiler, PtxasCompiler};
#[cfg(feature = "cuda")]
pub use cuda::CudaDriver;
pub use driver::{Context, DeviceAttribute, Event, Function, GpuDriver, Module, ScopedContext, Stream};
pub use error::{CompileError, DriverError, Result};
