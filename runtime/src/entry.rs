//! The custom-call boundary.
//!
//! This is the single point where errors stop propagating: whatever goes
//! wrong anywhere in dispatch ends up as a UTF-8 message in the host
//! framework's status sink.

use std::ffi::c_void;

use warpcall_device::Stream;

use crate::registry::Runtime;

/// Status sink the host framework inspects after a custom call returns.
///
/// Success leaves the sink untouched; a failure overwrites it with the
/// error message.
#[derive(Debug, Default)]
pub struct CustomCallStatus {
    failure: Option<String>,
}

impl CustomCallStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&mut self, message: &str) {
        self.failure = Some(message.to_owned());
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Dispatch one custom call: look up (or decode) the call for `opaque` and
/// launch it on `stream`. Faults never escape; they land in `status`.
///
/// # Safety
///
/// `buffers` must hold one valid device-pointer slot per `Array` parameter
/// of the decoded call, and `stream` must be a live stream of the driver
/// behind `runtime`.
pub unsafe fn custom_call(
    runtime: &Runtime,
    stream: Stream,
    buffers: *const *mut c_void,
    opaque: &[u8],
    status: &mut CustomCallStatus,
) {
    let result = runtime
        .kernel_call(opaque)
        .and_then(|call| unsafe { call.launch(runtime, stream, buffers) });
    if let Err(error) = result {
        status.set_failure(&error.to_string());
    }
}

/// The C entry point the host framework binds for each custom-call site.
///
/// # Safety
///
/// `stream` must be a live CUDA stream, `buffers` must hold one valid
/// device-pointer slot per `Array` parameter of the decoded call, `opaque`
/// must point to `opaque_len` readable bytes, and `status` must point to a
/// live [`CustomCallStatus`].
#[cfg(feature = "cuda")]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn warpcall_kernel_call(
    stream: *mut c_void,
    buffers: *mut *mut c_void,
    opaque: *const std::ffi::c_char,
    opaque_len: usize,
    status: *mut CustomCallStatus,
) {
    let opaque = unsafe { std::slice::from_raw_parts(opaque.cast::<u8>(), opaque_len) };
    let status = unsafe { &mut *status };
    unsafe { custom_call(crate::registry::global(), Stream(stream), buffers.cast_const(), opaque, status) };
}
