//! Shared test fixtures: fake driver/assembler seams and builders.

mod unit;

use std::sync::Arc;

use warpcall_device::{AsmCompiler, GpuDriver};

use crate::kernel::{Kernel, KernelCall, Parameter};
use crate::registry::Runtime;
use crate::test::fake::{FakeAsmCompiler, FakeDriver};

/// A runtime wired to fresh fakes, returned alongside them for inspection.
pub fn fake_runtime() -> (Arc<FakeDriver>, Arc<FakeAsmCompiler>, Runtime) {
    let driver = FakeDriver::new();
    let compiler = FakeAsmCompiler::new();
    let runtime =
        Runtime::new(Arc::clone(&driver) as Arc<dyn GpuDriver>, Arc::clone(&compiler) as Arc<dyn AsmCompiler>);
    (driver, compiler, runtime)
}

/// A kernel with a synthetic PTX body derived from its name.
pub fn test_kernel(name: &str, num_warps: u32, shared_mem_bytes: u32) -> Kernel {
    Kernel::new(name, num_warps, shared_mem_bytes, format!(".visible .entry {name}()"), "", 86)
}

/// A one-array-one-scalar call matching the common fixture in these tests.
pub fn array_call(name: &str, bytes_to_zero: u64, ptr_divisibility: u64) -> KernelCall {
    KernelCall::new(
        test_kernel(name, 4, 0),
        [1, 1, 1],
        vec![Parameter::Array { bytes_to_zero, ptr_divisibility }, Parameter::I32(7)],
    )
}
