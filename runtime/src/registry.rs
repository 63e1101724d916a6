//! Process-wide dispatch state: the driver and assembler seams plus the
//! kernel-call and device-image caches.
//!
//! Both caches are append-only for the life of the process. Entries are
//! `Arc`s and are never evicted, so every handle given out stays valid
//! indefinitely, and decoded calls can memoize pointers into the image
//! cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use warpcall_device::{AsmCompiler, GpuDriver};
use warpcall_wire as wire;

use crate::calls::AnyKernelCall;
use crate::error::{InvalidArgumentSnafu, Result};
use crate::image::ModuleImage;

/// Identity of one compiled device image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ImageKey {
    kernel_name: String,
    shared_mem_bytes: u32,
    ptx: String,
    compute_capability: i32,
}

pub struct Runtime {
    driver: Arc<dyn GpuDriver>,
    compiler: Arc<dyn AsmCompiler>,
    /// Opaque blob bytes, verbatim, to the decoded call. Keying by the raw
    /// bytes trades memory for zero collision risk; growth is bounded by
    /// the number of distinct call sites in the host program.
    calls: Mutex<HashMap<Vec<u8>, Arc<AnyKernelCall>>>,
    images: Mutex<HashMap<ImageKey, Arc<ModuleImage>>>,
}

impl Runtime {
    pub fn new(driver: Arc<dyn GpuDriver>, compiler: Arc<dyn AsmCompiler>) -> Self {
        Self { driver, compiler, calls: Mutex::new(HashMap::new()), images: Mutex::new(HashMap::new()) }
    }

    pub fn driver(&self) -> &Arc<dyn GpuDriver> {
        &self.driver
    }

    /// The decoded call for one custom-call site, decoding on first sight.
    ///
    /// The cache lock is held across decoding: a duplicate blob arriving on
    /// another thread waits for the first decode instead of repeating it.
    pub fn kernel_call(&self, opaque: &[u8]) -> Result<Arc<AnyKernelCall>> {
        let mut calls = self.calls.lock();
        if let Some(call) = calls.get(opaque) {
            return Ok(Arc::clone(call));
        }

        let decoded = wire::decode_blob(opaque)
            .map_err(|error| InvalidArgumentSnafu { message: error.to_string() }.build())?;
        let call = Arc::new(AnyKernelCall::from_wire(decoded));
        calls.insert(opaque.to_vec(), Arc::clone(&call));
        Ok(call)
    }

    /// The compiled image for one kernel identity, compiling on first
    /// sight.
    ///
    /// The cache lock is held across compilation. Compiling can be slow,
    /// but each key compiles exactly once; blocking a concurrent duplicate
    /// beats compiling it twice.
    pub fn module_image(
        &self,
        kernel_name: &str,
        shared_mem_bytes: u32,
        ptx: &str,
        compute_capability: i32,
    ) -> Result<Arc<ModuleImage>> {
        let mut images = self.images.lock();
        let key = ImageKey {
            kernel_name: kernel_name.to_owned(),
            shared_mem_bytes,
            ptx: ptx.to_owned(),
            compute_capability,
        };
        if let Some(image) = images.get(&key) {
            return Ok(Arc::clone(image));
        }

        let cc_major = compute_capability / 10;
        let cc_minor = compute_capability % 10;
        tracing::debug!(kernel.name = %kernel_name, cc_major, cc_minor, "compiling device image");
        let binary = self.compiler.compile(cc_major, cc_minor, ptx)?;

        let image = Arc::new(ModuleImage::new(kernel_name, binary, shared_mem_bytes));
        images.insert(key, Arc::clone(&image));
        Ok(image)
    }
}

#[cfg(feature = "cuda")]
mod cuda {
    use std::sync::Arc;

    use once_cell::sync::Lazy;

    use warpcall_device::{CudaDriver, PtxasCompiler};

    use super::Runtime;

    static RUNTIME: Lazy<Runtime> =
        Lazy::new(|| Runtime::new(Arc::new(CudaDriver), Arc::new(PtxasCompiler::from_env())));

    /// The process-wide runtime serving the exported custom-call entry
    /// point.
    pub fn global() -> &'static Runtime {
        &RUNTIME
    }
}

#[cfg(feature = "cuda")]
pub use cuda::global;
