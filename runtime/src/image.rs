//! Compiled device images and per-context function resolution.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use snafu::ensure;

use warpcall_device::{Context, DeviceAttribute, Function, GpuDriver, Module, ScopedContext};

use crate::error::{InvalidArgumentSnafu, Result};

/// CUDA caps static shared-memory allocations at 48 KiB; larger requests
/// must opt in to dynamic shared memory per function.
const MAX_STATIC_SHARED_MEM_BYTES: i32 = 49152;

/// A loaded module that unloads itself when the image is dropped.
struct OwnedModule {
    module: Module,
    driver: Arc<dyn GpuDriver>,
}

impl Drop for OwnedModule {
    fn drop(&mut self) {
        if let Err(error) = self.driver.unload_module(self.module) {
            tracing::warn!(%error, "failed to unload GPU module");
        }
    }
}

#[derive(Default)]
struct LoadState {
    /// One loaded module per context encountered; kept for ownership only.
    modules: Vec<OwnedModule>,
    /// Append-only: once a context maps to a function, the binding is
    /// stable for as long as the context lives.
    functions: HashMap<Context, Function>,
}

/// A compiled kernel image plus the function handles resolved from it, one
/// per device context encountered.
pub struct ModuleImage {
    kernel_name: String,
    binary_image: Vec<u8>,
    shared_mem_bytes: u32,
    state: Mutex<LoadState>,
}

impl std::fmt::Debug for ModuleImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleImage")
            .field("kernel_name", &self.kernel_name)
            .field("binary_image_len", &self.binary_image.len())
            .field("shared_mem_bytes", &self.shared_mem_bytes)
            .finish_non_exhaustive()
    }
}

impl ModuleImage {
    pub(crate) fn new(kernel_name: impl Into<String>, binary_image: Vec<u8>, shared_mem_bytes: u32) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            binary_image,
            shared_mem_bytes,
            state: Mutex::new(LoadState::default()),
        }
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    /// Resolve the function handle for `context`, loading the module into
    /// that context on first use.
    ///
    /// The target context is pushed for the duration of the load and popped
    /// on every exit path. A failure anywhere leaves the function map
    /// untouched, so a later call retries from scratch.
    pub fn function_for_context(&self, driver: &Arc<dyn GpuDriver>, context: Context) -> Result<Function> {
        let mut state = self.state.lock();
        if let Some(&function) = state.functions.get(&context) {
            return Ok(function);
        }

        let _current = ScopedContext::push(driver.as_ref(), context)?;

        let module = OwnedModule { module: driver.load_module(&self.binary_image)?, driver: Arc::clone(driver) };
        let function = driver.get_function(module.module, &self.kernel_name)?;
        self.configure_shared_memory(driver.as_ref(), function)?;

        state.functions.insert(context, function);
        state.modules.push(module);
        Ok(function)
    }

    /// Unlock the over-48 KiB shared-memory regime for `function`.
    ///
    /// Requests at or below the static limit need no configuration. Above
    /// it, the device's opt-in limit bounds what is satisfiable, and the
    /// function's dynamic limit is raised to whatever the opt-in leaves
    /// after its static allocation.
    fn configure_shared_memory(&self, driver: &dyn GpuDriver, function: Function) -> Result<()> {
        if self.shared_mem_bytes <= MAX_STATIC_SHARED_MEM_BYTES as u32 {
            return Ok(());
        }

        let shared_optin = driver.current_device_attribute(DeviceAttribute::MaxSharedMemoryPerBlockOptin)?;
        ensure!(
            self.shared_mem_bytes <= shared_optin as u32,
            InvalidArgumentSnafu { message: "Shared memory requested exceeds device resources." }
        );

        if shared_optin > MAX_STATIC_SHARED_MEM_BYTES {
            driver.set_cache_prefer_shared(function)?;
            let _shared_total =
                driver.current_device_attribute(DeviceAttribute::MaxSharedMemoryPerMultiprocessor)?;
            let shared_static = driver.function_shared_size(function)?;
            driver.set_max_dynamic_shared_size(function, shared_optin - shared_static)?;
        }
        Ok(())
    }
}
