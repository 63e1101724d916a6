//! The GPU driver seam.
//!
//! Handles are `Copy` newtypes over the driver's opaque pointers. They are
//! plain identifiers: nothing is freed when a handle is dropped, and every
//! operation on them goes through [`GpuDriver`], whose implementations are
//! responsible for thread safety.

use std::ffi::c_void;

use crate::error::Result;

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub *mut c_void);

        // SAFETY: the wrapped pointer is an opaque driver identifier, never
        // dereferenced on the host; the driver API is thread-safe.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}
    };
}

handle!(
    /// A driver stream (`CUstream`).
    Stream
);
handle!(
    /// A driver context (`CUcontext`). Module and function handles are
    /// scoped to the context they were resolved in.
    Context
);
handle!(
    /// A module loaded into one context (`CUmodule`).
    Module
);
handle!(
    /// A device function resolved from a module (`CUfunction`).
    Function
);
handle!(
    /// A timing event (`CUevent`).
    Event
);

/// Device attributes the runtime queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAttribute {
    /// Largest opt-in shared-memory allocation per block, in bytes.
    MaxSharedMemoryPerBlockOptin,
    /// Shared memory available per multiprocessor, in bytes.
    MaxSharedMemoryPerMultiprocessor,
}

/// The driver-API surface kernel dispatch consumes.
///
/// Calls that need a current context ([`GpuDriver::load_module`], the
/// attribute queries, the async copies issued during autotuning) expect the
/// caller to have pushed one, normally through [`ScopedContext`]. Launches
/// and stream-bound operations use the stream's implicit context.
pub trait GpuDriver: Send + Sync + std::fmt::Debug {
    /// Context owning `stream`.
    fn stream_context(&self, stream: Stream) -> Result<Context>;

    /// Make `context` current on this thread.
    fn push_context(&self, context: Context) -> Result<()>;

    /// Undo the most recent [`GpuDriver::push_context`].
    fn pop_context(&self) -> Result<()>;

    /// Load a compiled binary image into the current context.
    fn load_module(&self, image: &[u8]) -> Result<Module>;

    fn unload_module(&self, module: Module) -> Result<()>;

    /// Resolve a function symbol inside a loaded module.
    fn get_function(&self, module: Module, name: &str) -> Result<Function>;

    /// Query an attribute of the current context's device.
    fn current_device_attribute(&self, attribute: DeviceAttribute) -> Result<i32>;

    /// Static shared-memory footprint of a function, in bytes.
    fn function_shared_size(&self, function: Function) -> Result<i32>;

    /// Raise the function's dynamic shared-memory limit.
    fn set_max_dynamic_shared_size(&self, function: Function, bytes: i32) -> Result<()>;

    /// Prefer shared memory over L1 cache for this function.
    fn set_cache_prefer_shared(&self, function: Function) -> Result<()>;

    /// Enqueue a kernel launch.
    ///
    /// # Safety
    ///
    /// `params` must match the function's positional ABI: one pointer per
    /// parameter, each pointing at storage that stays valid until the call
    /// returns. `stream` must be live and own a context compatible with the
    /// module the function came from.
    unsafe fn launch(
        &self,
        function: Function,
        grid: [u32; 3],
        block: [u32; 3],
        shared_mem_bytes: u32,
        stream: Stream,
        params: &[*mut c_void],
    ) -> Result<()>;

    /// Enqueue an async fill of `bytes` bytes at device address `dst`.
    ///
    /// # Safety
    ///
    /// `dst..dst + bytes` must be a valid device allocation on the stream's
    /// device.
    unsafe fn memset_d8_async(&self, dst: u64, value: u8, bytes: u64, stream: Stream) -> Result<()>;

    /// Enqueue an async device-to-host copy of `dst.len()` bytes.
    ///
    /// # Safety
    ///
    /// `src` must address at least `dst.len()` valid device bytes, and `dst`
    /// must stay alive until the stream is synchronized.
    unsafe fn memcpy_dtoh_async(&self, dst: &mut [u8], src: u64, stream: Stream) -> Result<()>;

    /// Enqueue an async host-to-device copy of `src.len()` bytes.
    ///
    /// # Safety
    ///
    /// `dst` must address at least `src.len()` valid device bytes, and `src`
    /// must stay alive until the stream is synchronized.
    unsafe fn memcpy_htod_async(&self, dst: u64, src: &[u8], stream: Stream) -> Result<()>;

    /// Block until all work queued on `stream` has completed.
    fn synchronize_stream(&self, stream: Stream) -> Result<()>;

    fn create_event(&self) -> Result<Event>;

    fn record_event(&self, event: Event, stream: Stream) -> Result<()>;

    /// Block until `event` has been reached on its stream.
    fn synchronize_event(&self, event: Event) -> Result<()>;

    /// Milliseconds elapsed between two recorded events.
    fn elapsed_millis(&self, start: Event, stop: Event) -> Result<f32>;

    fn destroy_event(&self, event: Event) -> Result<()>;
}

/// Pushes a context current and pops it on drop, error paths included.
pub struct ScopedContext<'a> {
    driver: &'a dyn GpuDriver,
}

impl<'a> ScopedContext<'a> {
    pub fn push(driver: &'a dyn GpuDriver, context: Context) -> Result<Self> {
        driver.push_context(context)?;
        Ok(Self { driver })
    }
}

impl Drop for ScopedContext<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.driver.pop_context() {
            tracing::warn!(%error, "failed to pop GPU context");
        }
    }
}
