//! Device-image cache identity, per-context resolution, and the
//! shared-memory policy.

use std::sync::Arc;

use warpcall_device::GpuDriver;

use crate::error::Error;
use crate::test::fake::{FakeDriver, ctx};
use crate::test::fake_runtime;

fn as_dyn(driver: &Arc<FakeDriver>) -> Arc<dyn GpuDriver> {
    Arc::clone(driver) as Arc<dyn GpuDriver>
}

#[test]
fn test_identical_keys_share_one_image() {
    let (_driver, compiler, runtime) = fake_runtime();

    let first = runtime.module_image("k", 0, "ptx", 86).unwrap();
    let second = runtime.module_image("k", 0, "ptx", 86).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(compiler.compiles(), 1);
}

#[test]
fn test_each_key_field_distinguishes_images() {
    let (_driver, compiler, runtime) = fake_runtime();

    let base = runtime.module_image("k", 0, "ptx", 86).unwrap();
    let by_name = runtime.module_image("other", 0, "ptx", 86).unwrap();
    let by_shared = runtime.module_image("k", 4096, "ptx", 86).unwrap();
    let by_ptx = runtime.module_image("k", 0, "other ptx", 86).unwrap();
    let by_cc = runtime.module_image("k", 0, "ptx", 90).unwrap();

    for other in [&by_name, &by_shared, &by_ptx, &by_cc] {
        assert!(!Arc::ptr_eq(&base, other));
    }
    assert_eq!(compiler.compiles(), 5);
}

#[test]
fn test_function_is_memoized_per_context() {
    let (driver, compiler, runtime) = fake_runtime();
    let image = runtime.module_image("k", 0, "ptx", 86).unwrap();

    let first = image.function_for_context(&as_dyn(&driver), ctx(1)).unwrap();
    let again = image.function_for_context(&as_dyn(&driver), ctx(1)).unwrap();
    assert_eq!(first, again);
    assert_eq!(driver.module_loads(), 1);

    // A new context loads its own module and yields a distinct handle.
    let other = image.function_for_context(&as_dyn(&driver), ctx(2)).unwrap();
    assert_ne!(first, other);
    assert_eq!(driver.module_loads(), 2);
    assert_eq!(compiler.compiles(), 1);
}

#[test]
fn test_context_is_restored_after_resolution() {
    let (driver, _compiler, runtime) = fake_runtime();
    let image = runtime.module_image("k", 0, "ptx", 86).unwrap();

    image.function_for_context(&as_dyn(&driver), ctx(1)).unwrap();
    image.function_for_context(&as_dyn(&driver), ctx(2)).unwrap();
    assert_eq!(driver.context_stack_depth(), 0);
}

#[test]
fn test_static_shared_mem_needs_no_configuration() {
    let (driver, _compiler, runtime) = fake_runtime();
    let image = runtime.module_image("k", 49152, "ptx", 86).unwrap();

    image.function_for_context(&as_dyn(&driver), ctx(1)).unwrap();
    assert_eq!(driver.prefer_shared_calls(), 0);
    assert!(driver.dynamic_shared_limit_calls().is_empty());
}

#[test]
fn test_dynamic_shared_mem_is_configured_above_static_limit() {
    let (driver, _compiler, runtime) = fake_runtime();
    driver.set_shared_mem_optin(101_376);
    driver.set_static_shared_size(1024);
    let image = runtime.module_image("k", 49153, "ptx", 86).unwrap();

    let function = image.function_for_context(&as_dyn(&driver), ctx(1)).unwrap();

    assert_eq!(driver.prefer_shared_calls(), 1);
    assert_eq!(driver.dynamic_shared_limit_calls(), vec![(function, 101_376 - 1024)]);
}

#[test]
fn test_shared_mem_above_optin_fails() {
    let (driver, _compiler, runtime) = fake_runtime();
    driver.set_shared_mem_optin(65536);
    let image = runtime.module_image("k", 100_000, "ptx", 86).unwrap();

    let error = image.function_for_context(&as_dyn(&driver), ctx(1)).unwrap_err();
    assert_eq!(error.to_string(), "Shared memory requested exceeds device resources.");
    assert!(matches!(error, Error::InvalidArgument { .. }));
    assert_eq!(driver.context_stack_depth(), 0);

    // The failure left no binding behind: raising the limit lets the same
    // context resolve cleanly.
    driver.set_shared_mem_optin(131_072);
    image.function_for_context(&as_dyn(&driver), ctx(1)).unwrap();
    assert_eq!(driver.prefer_shared_calls(), 1);
}
