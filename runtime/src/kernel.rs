//! Kernels, parameters, and single kernel calls.

use std::ffi::c_void;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use smallvec::SmallVec;

use warpcall_device::Stream;
use warpcall_wire as wire;

use crate::error::{InvalidArgumentSnafu, Result};
use crate::image::ModuleImage;
use crate::registry::Runtime;

const THREADS_PER_WARP: u32 = 32;

/// An immutable description of one device function.
///
/// The compiled image is resolved from the registry's image cache on first
/// launch and memoized for the life of the kernel.
pub struct Kernel {
    kernel_name: String,
    block_dim_x: u32,
    shared_mem_bytes: u32,
    ptx: String,
    ttir: String,
    compute_capability: i32,
    module_image: OnceCell<Arc<ModuleImage>>,
}

impl Kernel {
    pub fn new(
        kernel_name: impl Into<String>,
        num_warps: u32,
        shared_mem_bytes: u32,
        ptx: impl Into<String>,
        ttir: impl Into<String>,
        compute_capability: i32,
    ) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            block_dim_x: num_warps * THREADS_PER_WARP,
            shared_mem_bytes,
            ptx: ptx.into(),
            ttir: ttir.into(),
            compute_capability,
            module_image: OnceCell::new(),
        }
    }

    pub fn kernel_name(&self) -> &str {
        &self.kernel_name
    }

    /// Launch block: one row of `num_warps` warps.
    pub fn block_dim(&self) -> [u32; 3] {
        [self.block_dim_x, 1, 1]
    }

    /// Launch with already-marshalled argument pointers.
    ///
    /// # Safety
    ///
    /// `params` must match the device function's positional ABI, with every
    /// pointer valid until the call returns, and `stream` must be live.
    pub unsafe fn launch(
        &self,
        runtime: &Runtime,
        stream: Stream,
        grid: [u32; 3],
        params: &[*mut c_void],
    ) -> Result<()> {
        let image = self.module_image.get_or_try_init(|| {
            runtime.module_image(&self.kernel_name, self.shared_mem_bytes, &self.ptx, self.compute_capability)
        })?;
        let driver = runtime.driver();
        let context = driver.stream_context(stream)?;
        let function = image.function_for_context(driver, context)?;
        unsafe { driver.launch(function, grid, self.block_dim(), self.shared_mem_bytes, stream, params)? };
        Ok(())
    }

    pub fn from_wire(kernel: wire::Kernel) -> Self {
        Self::new(
            kernel.kernel_name,
            kernel.num_warps,
            kernel.shared_mem_bytes,
            kernel.ptx,
            kernel.ttir,
            kernel.compute_capability,
        )
    }

    pub fn to_wire(&self) -> wire::Kernel {
        wire::Kernel {
            kernel_name: self.kernel_name.clone(),
            num_warps: self.block_dim_x / THREADS_PER_WARP,
            shared_mem_bytes: self.shared_mem_bytes,
            ptx: self.ptx.clone(),
            ttir: self.ttir.clone(),
            compute_capability: self.compute_capability,
        }
    }
}

/// One kernel parameter.
///
/// `Array` values arrive through the caller's buffers array at launch time;
/// scalars are stored inline and passed by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Array { bytes_to_zero: u64, ptr_divisibility: u64 },
    Bool(bool),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
}

impl From<wire::Parameter> for Parameter {
    fn from(parameter: wire::Parameter) -> Self {
        match parameter {
            wire::Parameter::Array { bytes_to_zero, ptr_divisibility } => {
                Self::Array { bytes_to_zero, ptr_divisibility }
            }
            wire::Parameter::Bool(value) => Self::Bool(value),
            wire::Parameter::I32(value) => Self::I32(value),
            wire::Parameter::U32(value) => Self::U32(value),
            wire::Parameter::I64(value) => Self::I64(value),
            wire::Parameter::U64(value) => Self::U64(value),
        }
    }
}

impl From<Parameter> for wire::Parameter {
    fn from(parameter: Parameter) -> Self {
        match parameter {
            Parameter::Array { bytes_to_zero, ptr_divisibility } => {
                Self::Array { bytes_to_zero, ptr_divisibility }
            }
            Parameter::Bool(value) => Self::Bool(value),
            Parameter::I32(value) => Self::I32(value),
            Parameter::U32(value) => Self::U32(value),
            Parameter::I64(value) => Self::I64(value),
            Parameter::U64(value) => Self::U64(value),
        }
    }
}

/// A kernel bound to a launch grid and parameter list.
pub struct KernelCall {
    kernel: Kernel,
    grid: [u32; 3],
    parameters: Vec<Parameter>,
}

impl KernelCall {
    pub fn new(kernel: Kernel, grid: [u32; 3], parameters: Vec<Parameter>) -> Self {
        Self { kernel, grid, parameters }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Marshal `buffers` against the declared parameters and launch.
    ///
    /// Each `Array` parameter consumes the next buffer slot in declaration
    /// order: the pointer value is checked against `ptr_divisibility`, up to
    /// `bytes_to_zero` leading bytes are zeroed asynchronously on `stream`,
    /// and the slot's address becomes the kernel argument. Scalars pass the
    /// address of their inline storage, which outlives the launch call.
    ///
    /// # Safety
    ///
    /// `buffers` must hold one valid device-pointer slot per `Array`
    /// parameter, in declaration order, and `stream` must be a live stream.
    pub unsafe fn launch(&self, runtime: &Runtime, stream: Stream, buffers: *const *mut c_void) -> Result<()> {
        let driver = runtime.driver();
        let mut params: SmallVec<[*mut c_void; 16]> = SmallVec::with_capacity(self.parameters.len());
        let mut next_buffer = buffers;

        for (index, parameter) in self.parameters.iter().enumerate() {
            match parameter {
                Parameter::Array { bytes_to_zero, ptr_divisibility } => {
                    let slot = next_buffer;
                    next_buffer = unsafe { next_buffer.add(1) };
                    let pointer = unsafe { *slot } as u64;

                    if *ptr_divisibility != 0 && pointer % *ptr_divisibility != 0 {
                        return InvalidArgumentSnafu {
                            message: format!(
                                "Parameter {index} ({pointer:#x}) is not divisible by {ptr_divisibility}."
                            ),
                        }
                        .fail();
                    }

                    if *bytes_to_zero > 0 {
                        unsafe { driver.memset_d8_async(pointer, 0, *bytes_to_zero, stream)? };
                    }
                    params.push(slot as *mut c_void);
                }
                Parameter::Bool(value) => params.push(value as *const bool as *mut c_void),
                Parameter::I32(value) => params.push(value as *const i32 as *mut c_void),
                Parameter::U32(value) => params.push(value as *const u32 as *mut c_void),
                Parameter::I64(value) => params.push(value as *const i64 as *mut c_void),
                Parameter::U64(value) => params.push(value as *const u64 as *mut c_void),
            }
        }

        unsafe { self.kernel.launch(runtime, stream, self.grid, &params) }
    }

    pub fn from_wire(call: wire::KernelCall) -> Self {
        Self::new(
            Kernel::from_wire(call.kernel),
            [call.grid_0, call.grid_1, call.grid_2],
            call.parameters.into_iter().map(Parameter::from).collect(),
        )
    }

    pub fn to_wire(&self) -> wire::KernelCall {
        wire::KernelCall {
            kernel: self.kernel.to_wire(),
            grid_0: self.grid[0],
            grid_1: self.grid[1],
            grid_2: self.grid[2],
            parameters: self.parameters.iter().copied().map(wire::Parameter::from).collect(),
        }
    }
}
