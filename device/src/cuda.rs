//! CUDA driver implementation over `cudarc`'s raw bindings.

use std::ffi::{CString, c_void};

use cudarc::driver::sys;

use crate::driver::{Context, DeviceAttribute, Event, Function, GpuDriver, Module, Stream};
use crate::error::{DriverSnafu, Result};

/// [`GpuDriver`] backed by the system CUDA driver.
///
/// The driver is never initialized here: every context reaches the runtime
/// through a host-framework stream, which implies the host already called
/// `cuInit` and created the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaDriver;

fn check(call: &'static str, code: sys::CUresult) -> Result<()> {
    if code == sys::CUresult::CUDA_SUCCESS {
        Ok(())
    } else {
        DriverSnafu { call, code: format!("{code:?}") }.fail()
    }
}

impl GpuDriver for CudaDriver {
    fn stream_context(&self, stream: Stream) -> Result<Context> {
        let mut context: sys::CUcontext = std::ptr::null_mut();
        unsafe {
            check("cuStreamGetCtx", sys::lib().cuStreamGetCtx(stream.0 as sys::CUstream, &mut context))?;
        }
        Ok(Context(context as *mut c_void))
    }

    fn push_context(&self, context: Context) -> Result<()> {
        unsafe { check("cuCtxPushCurrent", sys::lib().cuCtxPushCurrent_v2(context.0 as sys::CUcontext)) }
    }

    fn pop_context(&self) -> Result<()> {
        let mut popped: sys::CUcontext = std::ptr::null_mut();
        unsafe { check("cuCtxPopCurrent", sys::lib().cuCtxPopCurrent_v2(&mut popped)) }
    }

    fn load_module(&self, image: &[u8]) -> Result<Module> {
        let mut module: sys::CUmodule = std::ptr::null_mut();
        unsafe {
            check("cuModuleLoadData", sys::lib().cuModuleLoadData(&mut module, image.as_ptr() as *const c_void))?;
        }
        Ok(Module(module as *mut c_void))
    }

    fn unload_module(&self, module: Module) -> Result<()> {
        unsafe { check("cuModuleUnload", sys::lib().cuModuleUnload(module.0 as sys::CUmodule)) }
    }

    fn get_function(&self, module: Module, name: &str) -> Result<Function> {
        let name = CString::new(name)
            .map_err(|_| DriverSnafu { call: "cuModuleGetFunction", code: "kernel name contains NUL" }.build())?;
        let mut function: sys::CUfunction = std::ptr::null_mut();
        unsafe {
            check(
                "cuModuleGetFunction",
                sys::lib().cuModuleGetFunction(&mut function, module.0 as sys::CUmodule, name.as_ptr()),
            )?;
        }
        Ok(Function(function as *mut c_void))
    }

    fn current_device_attribute(&self, attribute: DeviceAttribute) -> Result<i32> {
        let attribute = match attribute {
            DeviceAttribute::MaxSharedMemoryPerBlockOptin => {
                sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK_OPTIN
            }
            DeviceAttribute::MaxSharedMemoryPerMultiprocessor => {
                sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_MULTIPROCESSOR
            }
        };
        let mut device: sys::CUdevice = 0;
        let mut value = 0i32;
        unsafe {
            check("cuCtxGetDevice", sys::lib().cuCtxGetDevice(&mut device))?;
            check("cuDeviceGetAttribute", sys::lib().cuDeviceGetAttribute(&mut value, attribute, device))?;
        }
        Ok(value)
    }

    fn function_shared_size(&self, function: Function) -> Result<i32> {
        let mut value = 0i32;
        unsafe {
            check(
                "cuFuncGetAttribute",
                sys::lib().cuFuncGetAttribute(
                    &mut value,
                    sys::CUfunction_attribute::CU_FUNC_ATTRIBUTE_SHARED_SIZE_BYTES,
                    function.0 as sys::CUfunction,
                ),
            )?;
        }
        Ok(value)
    }

    fn set_max_dynamic_shared_size(&self, function: Function, bytes: i32) -> Result<()> {
        unsafe {
            check(
                "cuFuncSetAttribute",
                sys::lib().cuFuncSetAttribute(
                    function.0 as sys::CUfunction,
                    sys::CUfunction_attribute::CU_FUNC_ATTRIBUTE_MAX_DYNAMIC_SHARED_SIZE_BYTES,
                    bytes,
                ),
            )
        }
    }

    fn set_cache_prefer_shared(&self, function: Function) -> Result<()> {
        unsafe {
            check(
                "cuFuncSetCacheConfig",
                sys::lib().cuFuncSetCacheConfig(
                    function.0 as sys::CUfunction,
                    sys::CUfunc_cache::CU_FUNC_CACHE_PREFER_SHARED,
                ),
            )
        }
    }

    unsafe fn launch(
        &self,
        function: Function,
        grid: [u32; 3],
        block: [u32; 3],
        shared_mem_bytes: u32,
        stream: Stream,
        params: &[*mut c_void],
    ) -> Result<()> {
        unsafe {
            check(
                "cuLaunchKernel",
                sys::lib().cuLaunchKernel(
                    function.0 as sys::CUfunction,
                    grid[0],
                    grid[1],
                    grid[2],
                    block[0],
                    block[1],
                    block[2],
                    shared_mem_bytes,
                    stream.0 as sys::CUstream,
                    params.as_ptr() as *mut *mut c_void,
                    std::ptr::null_mut(),
                ),
            )
        }
    }

    unsafe fn memset_d8_async(&self, dst: u64, value: u8, bytes: u64, stream: Stream) -> Result<()> {
        unsafe {
            check(
                "cuMemsetD8Async",
                sys::lib().cuMemsetD8Async(dst as sys::CUdeviceptr, value, bytes as usize, stream.0 as sys::CUstream),
            )
        }
    }

    unsafe fn memcpy_dtoh_async(&self, dst: &mut [u8], src: u64, stream: Stream) -> Result<()> {
        unsafe {
            check(
                "cuMemcpyDtoHAsync",
                sys::lib().cuMemcpyDtoHAsync_v2(
                    dst.as_mut_ptr() as *mut c_void,
                    src as sys::CUdeviceptr,
                    dst.len(),
                    stream.0 as sys::CUstream,
                ),
            )
        }
    }

    unsafe fn memcpy_htod_async(&self, dst: u64, src: &[u8], stream: Stream) -> Result<()> {
        unsafe {
            check(
                "cuMemcpyHtoDAsync",
                sys::lib().cuMemcpyHtoDAsync_v2(
                    dst as sys::CUdeviceptr,
                    src.as_ptr() as *const c_void,
                    src.len(),
                    stream.0 as sys::CUstream,
                ),
            )
        }
    }

    fn synchronize_stream(&self, stream: Stream) -> Result<()> {
        unsafe { check("cuStreamSynchronize", sys::lib().cuStreamSynchronize(stream.0 as sys::CUstream)) }
    }

    fn create_event(&self) -> Result<Event> {
        let mut event: sys::CUevent = std::ptr::null_mut();
        unsafe {
            check("cuEventCreate", sys::lib().cuEventCreate(&mut event, 0))?;
        }
        Ok(Event(event as *mut c_void))
    }

    fn record_event(&self, event: Event, stream: Stream) -> Result<()> {
        unsafe {
            check("cuEventRecord", sys::lib().cuEventRecord(event.0 as sys::CUevent, stream.0 as sys::CUstream))
        }
    }

    fn synchronize_event(&self, event: Event) -> Result<()> {
        unsafe { check("cuEventSynchronize", sys::lib().cuEventSynchronize(event.0 as sys::CUevent)) }
    }

    fn elapsed_millis(&self, start: Event, stop: Event) -> Result<f32> {
        let mut elapsed = 0f32;
        unsafe {
            check(
                "cuEventElapsedTime",
                sys::lib().cuEventElapsedTime(&mut elapsed, start.0 as sys::CUevent, stop.0 as sys::CUevent),
            )?;
        }
        Ok(elapsed)
    }

    fn destroy_event(&self, event: Event) -> Result<()> {
        unsafe { check("cuEventDestroy", sys::lib().cuEventDestroy_v2(event.0 as sys::CUevent)) }
    }
}
