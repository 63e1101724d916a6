//! Marshalling and single-call launch behavior.

use std::ffi::c_void;

use warpcall_wire as wire;

use crate::error::Error;
use crate::kernel::{Kernel, KernelCall, Parameter};
use crate::test::fake::{ctx, stream};
use crate::test::{array_call, fake_runtime, test_kernel};

#[test]
fn test_block_dim_derives_from_num_warps() {
    let kernel = test_kernel("k", 4, 0);
    assert_eq!(kernel.block_dim(), [128, 1, 1]);
    assert_eq!(kernel.to_wire().num_warps, 4);
}

#[test]
fn test_misaligned_pointer_is_rejected() {
    let (driver, _compiler, runtime) = fake_runtime();
    driver.bind_stream(stream(1), ctx(1));

    let call = array_call("k", 16, 16);
    let buffers = [0x1008usize as *mut c_void];
    let error = unsafe { call.launch(&runtime, stream(1), buffers.as_ptr()) }.unwrap_err();

    assert_eq!(error.to_string(), "Parameter 0 (0x1008) is not divisible by 16.");
    assert!(matches!(error, Error::InvalidArgument { .. }));
    assert!(driver.launch_records().is_empty());
}

#[test]
fn test_aligned_pointer_zeroes_and_launches() {
    let (driver, _compiler, runtime) = fake_runtime();
    driver.bind_stream(stream(1), ctx(1));

    let call = array_call("k", 16, 16);
    let buffers = [0x1000usize as *mut c_void];
    unsafe { call.launch(&runtime, stream(1), buffers.as_ptr()) }.unwrap();

    let memsets = driver.memset_records();
    assert_eq!(memsets.len(), 1);
    assert_eq!((memsets[0].dst, memsets[0].value, memsets[0].bytes), (0x1000, 0, 16));
    assert_eq!(memsets[0].stream, stream(1));

    let launches = driver.launch_records();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].kernel, "k");
    assert_eq!(launches[0].grid, [1, 1, 1]);
    assert_eq!(launches[0].block, [128, 1, 1]);
    assert_eq!(launches[0].shared_mem_bytes, 0);
}

#[test]
fn test_zero_bytes_to_zero_skips_memset() {
    let (driver, _compiler, runtime) = fake_runtime();
    driver.bind_stream(stream(1), ctx(1));

    let call = array_call("k", 0, 16);
    let buffers = [0x1000usize as *mut c_void];
    unsafe { call.launch(&runtime, stream(1), buffers.as_ptr()) }.unwrap();

    assert!(driver.memset_records().is_empty());
    assert_eq!(driver.launch_records().len(), 1);
}

#[test]
fn test_zero_divisibility_accepts_any_pointer() {
    let (driver, _compiler, runtime) = fake_runtime();
    driver.bind_stream(stream(1), ctx(1));

    let call = array_call("k", 0, 0);
    let buffers = [0x3usize as *mut c_void];
    unsafe { call.launch(&runtime, stream(1), buffers.as_ptr()) }.unwrap();
    assert_eq!(driver.launch_records().len(), 1);
}

#[test]
fn test_scalars_consume_no_buffer_slots() {
    let (driver, _compiler, runtime) = fake_runtime();
    driver.bind_stream(stream(1), ctx(1));

    let call = KernelCall::new(
        test_kernel("k", 1, 0),
        [2, 3, 4],
        vec![
            Parameter::I32(-5),
            Parameter::U64(u64::MAX),
            Parameter::Bool(true),
            Parameter::Array { bytes_to_zero: 0, ptr_divisibility: 8 },
        ],
    );
    // Only the one array parameter reads a buffer slot.
    let buffers = [0x8usize as *mut c_void];
    unsafe { call.launch(&runtime, stream(1), buffers.as_ptr()) }.unwrap();

    let launches = driver.launch_records();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].grid, [2, 3, 4]);
    assert_eq!(launches[0].block, [32, 1, 1]);
}

#[test]
fn test_repeat_launches_reuse_the_compiled_image() {
    let (driver, compiler, runtime) = fake_runtime();
    driver.bind_stream(stream(1), ctx(1));

    let call = array_call("k", 0, 0);
    let buffers = [0x1000usize as *mut c_void];
    unsafe { call.launch(&runtime, stream(1), buffers.as_ptr()) }.unwrap();
    unsafe { call.launch(&runtime, stream(1), buffers.as_ptr()) }.unwrap();

    assert_eq!(compiler.compiles(), 1);
    assert_eq!(driver.module_loads(), 1);
    assert_eq!(driver.launch_records().len(), 2);
}

#[test]
fn test_kernel_call_wire_roundtrip() {
    let call = wire::KernelCall {
        kernel: wire::Kernel {
            kernel_name: "k".to_owned(),
            num_warps: 8,
            shared_mem_bytes: 1024,
            ptx: "ptx".to_owned(),
            ttir: "ttir".to_owned(),
            compute_capability: 90,
        },
        grid_0: 7,
        grid_1: 8,
        grid_2: 9,
        parameters: vec![
            wire::Parameter::Array { bytes_to_zero: 4, ptr_divisibility: 2 },
            wire::Parameter::Bool(false),
            wire::Parameter::U32(11),
        ],
    };
    assert_eq!(KernelCall::from_wire(call.clone()).to_wire(), call);
}

#[test]
fn test_kernel_wire_roundtrip() {
    let kernel = wire::Kernel {
        kernel_name: "k".to_owned(),
        num_warps: 2,
        shared_mem_bytes: 0,
        ptx: "body".to_owned(),
        ttir: String::new(),
        compute_capability: 75,
    };
    assert_eq!(Kernel::from_wire(kernel.clone()).to_wire(), kernel);
}
