//! Wire schema for serialized kernel calls.
//!
//! A host tensor compiler describes each custom-call site as one
//! [`AnyKernelCall`] record: either a single launchable kernel call or a
//! family of candidate calls to autotune at first launch. Records are
//! bincode-encoded and wrapped in a zlib envelope by [`blob`]; the runtime
//! receives the resulting bytes verbatim as its opaque argument.
//!
//! Field names and ordering are the wire contract: both sides of the
//! encoding must agree on this schema exactly.

use serde::{Deserialize, Serialize};

pub mod blob;
pub mod error;

pub use blob::{decode_blob, deflate, encode_blob, inflate};
pub use error::{Error, Result};

/// Description of one device function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    /// Symbol name inside the loaded module.
    pub kernel_name: String,
    /// Launch width in warps; the block width is `num_warps * 32`.
    pub num_warps: u32,
    /// Shared memory requested per block, in bytes.
    pub shared_mem_bytes: u32,
    /// Textual device assembly, pre-lowered by the host compiler.
    pub ptx: String,
    /// Compiler-level IR kept for round-tripping and diagnostics; never
    /// consumed at launch time.
    pub ttir: String,
    /// Target compute capability, encoded as `major * 10 + minor`.
    pub compute_capability: i32,
}

/// One kernel parameter.
///
/// `Array` parameters carry no pointer; the device pointer is taken from the
/// caller's buffers array at launch time, one slot per `Array` in
/// declaration order. Scalars are stored inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameter {
    Array {
        /// Number of leading bytes to zero before launch.
        bytes_to_zero: u64,
        /// Required divisor of the device pointer value; `0` means
        /// unconstrained.
        ptr_divisibility: u64,
    },
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

/// A kernel plus its launch grid and parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelCall {
    pub kernel: Kernel,
    pub grid_0: u32,
    pub grid_1: u32,
    pub grid_2: u32,
    pub parameters: Vec<Parameter>,
}

/// One autotuning candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub kernel_call: KernelCall,
    /// Human-readable candidate label, used in autotuning logs.
    pub description: String,
}

/// Marks a buffer passed as both an input and an output of the call.
///
/// Autotuning launches candidates repeatedly, which would leave junk in such
/// a buffer; the runtime stages and restores `buffer_size_bytes` bytes of
/// the input around the benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOutputAlias {
    pub input_buffer_idx: u64,
    pub output_buffer_idx: u64,
    pub buffer_size_bytes: u64,
}

/// A family of candidate calls benchmarked at first launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutotunedKernelCall {
    pub name: String,
    /// Candidates in preference order; must be non-empty.
    pub configs: Vec<Config>,
    pub input_output_aliases: Vec<InputOutputAlias>,
}

/// Outer record: exactly one call variant per custom-call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnyKernelCall {
    KernelCall(KernelCall),
    AutotunedKernelCall(AutotunedKernelCall),
}
