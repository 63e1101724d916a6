//! Event-timed kernel benchmarking.

use std::ffi::c_void;

use warpcall_device::Stream;

use crate::error::Result;
use crate::kernel::KernelCall;
use crate::registry::Runtime;

/// Time `iterations` launches of `call` between two stream events, after
/// one untimed warm-up launch. Returns the elapsed milliseconds.
///
/// Any driver error aborts the measurement and propagates.
///
/// # Safety
///
/// Same requirements as [`KernelCall::launch`]; the call is launched
/// `iterations + 1` times against the same buffers.
pub unsafe fn benchmark(
    runtime: &Runtime,
    stream: Stream,
    call: &KernelCall,
    buffers: *const *mut c_void,
    iterations: u32,
) -> Result<f32> {
    let driver = runtime.driver();
    let start = driver.create_event()?;
    let stop = driver.create_event()?;

    unsafe { call.launch(runtime, stream, buffers)? }; // Warm-up.

    driver.record_event(start, stream)?;
    for _ in 0..iterations {
        unsafe { call.launch(runtime, stream, buffers)? };
    }
    driver.record_event(stop, stream)?;
    driver.synchronize_event(stop)?;

    let elapsed = driver.elapsed_millis(start, stop)?;
    driver.destroy_event(start)?;
    driver.destroy_event(stop)?;
    Ok(elapsed)
}
