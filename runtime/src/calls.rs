//! Decoded custom-call objects.

use std::ffi::c_void;

use warpcall_device::Stream;
use warpcall_wire as wire;

use crate::autotune::AutotunedKernelCall;
use crate::error::Result;
use crate::kernel::KernelCall;
use crate::registry::Runtime;

/// One decoded custom-call site: a single launchable call or an autotuned
/// family of candidates.
pub enum AnyKernelCall {
    Single(KernelCall),
    Autotuned(AutotunedKernelCall),
}

impl AnyKernelCall {
    /// # Safety
    ///
    /// Same requirements as [`KernelCall::launch`] and
    /// [`AutotunedKernelCall::launch`].
    pub unsafe fn launch(&self, runtime: &Runtime, stream: Stream, buffers: *const *mut c_void) -> Result<()> {
        match self {
            Self::Single(call) => unsafe { call.launch(runtime, stream, buffers) },
            Self::Autotuned(call) => unsafe { call.launch(runtime, stream, buffers) },
        }
    }

    pub fn from_wire(call: wire::AnyKernelCall) -> Self {
        match call {
            wire::AnyKernelCall::KernelCall(call) => Self::Single(KernelCall::from_wire(call)),
            wire::AnyKernelCall::AutotunedKernelCall(call) => {
                Self::Autotuned(AutotunedKernelCall::from_wire(call))
            }
        }
    }

    pub fn to_wire(&self) -> wire::AnyKernelCall {
        match self {
            Self::Single(call) => wire::AnyKernelCall::KernelCall(call.to_wire()),
            Self::Autotuned(call) => wire::AnyKernelCall::AutotunedKernelCall(call.to_wire()),
        }
    }
}
