//! GPU custom-call runtime for precompiled tensor-program kernels.
//!
//! A host tensor compiler hands this crate an opaque compressed blob
//! describing one kernel invocation, or a family of candidates to autotune.
//! The runtime decodes it once, compiles the embedded assembly once per
//! kernel identity, loads the resulting module once per device context,
//! marshals parameters against the caller's buffers, and launches on the
//! caller-supplied stream.
//!
//! Three levels of caching back this, all append-only for the life of the
//! process:
//!
//! 1. opaque blob bytes → decoded [`AnyKernelCall`]
//! 2. kernel identity (name, shared memory, assembly, compute capability)
//!    → compiled [`ModuleImage`]
//! 3. per image: device context → loaded function handle
//!
//! Autotuned calls benchmark their candidates exactly once, under a time
//! budget, restoring any input buffers that alias an output, and behave like
//! a single call from then on.

pub mod autotune;
pub mod benchmark;
pub mod calls;
pub mod entry;
pub mod error;
pub mod image;
pub mod kernel;
pub mod registry;

#[cfg(test)]
pub mod test;

pub use autotune::{AutotunedKernelCall, Config, InputOutputAlias};
pub use calls::AnyKernelCall;
pub use entry::{CustomCallStatus, custom_call};
pub use error::{Error, Result};
pub use image::ModuleImage;
pub use kernel::{Kernel, KernelCall, Parameter};
#[cfg(feature = "cuda")]
pub use registry::global;
pub use registry::Runtime;
