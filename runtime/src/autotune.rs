//! Autotuned kernel calls: benchmark the candidates once, keep the winner.

use std::collections::HashMap;
use std::ffi::c_void;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use warpcall_device::{ScopedContext, Stream};
use warpcall_wire as wire;

use crate::benchmark::benchmark;
use crate::error::Result;
use crate::kernel::KernelCall;
use crate::registry::Runtime;

/// Target total measurement time per candidate.
const BENCHMARK_TIME_MILLIS: f32 = 10.0;
/// Upper bound on timed iterations per candidate.
const MAX_TIMED_ITERS: u32 = 100;

/// One autotuning candidate.
pub struct Config {
    pub kernel_call: KernelCall,
    /// Human-readable label carried into the autotuning logs.
    pub description: String,
}

/// `(input index, output index, size in bytes)` marking a buffer passed as
/// both input and output of the call.
pub type InputOutputAlias = (usize, usize, usize);

/// A family of candidate calls benchmarked at the first launch site.
///
/// The winner moves to position 0 and the losers are dropped; afterwards the
/// call behaves exactly like a single [`KernelCall`]. Selection runs at most
/// once per process, serialized by a once-guard whose outcome (including a
/// failure) is replayed on every later launch.
pub struct AutotunedKernelCall {
    name: String,
    configs: Mutex<Vec<Config>>,
    input_output_aliases: Vec<InputOutputAlias>,
    autotune_status: OnceCell<Result<()>>,
}

impl AutotunedKernelCall {
    pub fn new(
        name: impl Into<String>,
        configs: Vec<Config>,
        input_output_aliases: Vec<InputOutputAlias>,
    ) -> Self {
        Self {
            name: name.into(),
            configs: Mutex::new(configs),
            input_output_aliases,
            autotune_status: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Candidate labels, in current preference order. One entry once
    /// autotuning has completed.
    pub fn config_descriptions(&self) -> Vec<String> {
        self.configs.lock().iter().map(|config| config.description.clone()).collect()
    }

    /// Launch the winning candidate, selecting it first if this is the
    /// first launch and more than one candidate exists.
    ///
    /// # Safety
    ///
    /// Same requirements as [`KernelCall::launch`] for every candidate;
    /// additionally every alias index must be in bounds for `buffers`.
    pub unsafe fn launch(&self, runtime: &Runtime, stream: Stream, buffers: *const *mut c_void) -> Result<()> {
        let status = self.autotune_status.get_or_init(|| {
            if self.configs.lock().len() > 1 {
                unsafe { self.autotune(runtime, stream, buffers) }
            } else {
                Ok(())
            }
        });
        status.clone()?;

        let configs = self.configs.lock();
        unsafe { configs[0].kernel_call.launch(runtime, stream, buffers) }
    }

    /// Benchmark every candidate and collapse `configs` to the fastest.
    ///
    /// Aliased inputs are overwritten on every launch, so the repeated
    /// launches here would leave junk in them; their contents are staged to
    /// host memory first and restored before returning.
    unsafe fn autotune(&self, runtime: &Runtime, stream: Stream, buffers: *const *mut c_void) -> Result<()> {
        let driver = runtime.driver();
        let context = driver.stream_context(stream)?;
        let _current = ScopedContext::push(driver.as_ref(), context)?;

        let mut input_copies: HashMap<usize, Vec<u8>> = HashMap::new();
        for &(input_idx, output_idx, size) in &self.input_output_aliases {
            let input = unsafe { *buffers.add(input_idx) };
            let output = unsafe { *buffers.add(output_idx) };
            if input == output {
                let mut copy = vec![0u8; size];
                unsafe { driver.memcpy_dtoh_async(&mut copy, input as u64, stream)? };
                input_copies.insert(input_idx, copy);
            }
        }

        tracing::info!(kernel.name = %self.name, "autotuning kernel call");
        let mut configs = self.configs.lock();

        // One iteration of every candidate decides how many iterations the
        // timed pass runs.
        let mut best = f32::INFINITY;
        for config in configs.iter() {
            let elapsed = unsafe { benchmark(runtime, stream, &config.kernel_call, buffers, 1)? };
            tracing::debug!(config = %config.description, elapsed_ms = elapsed, "ran calibration iteration");
            best = best.min(elapsed);
        }

        let timed_iters = ((BENCHMARK_TIME_MILLIS / best) as u32).clamp(1, MAX_TIMED_ITERS);
        if timed_iters == MAX_TIMED_ITERS {
            tracing::info!(iters = timed_iters, "benchmarking with capped iteration count");
        } else {
            tracing::info!(iters = timed_iters, target_ms = BENCHMARK_TIME_MILLIS, "benchmarking");
        }

        let mut best = f32::INFINITY;
        for index in 0..configs.len() {
            let elapsed = unsafe { benchmark(runtime, stream, &configs[index].kernel_call, buffers, timed_iters)? };
            tracing::debug!(
                config = %configs[index].description,
                iters = timed_iters,
                elapsed_ms = elapsed,
                "measured candidate"
            );
            if elapsed < best {
                best = elapsed;
                configs.swap(0, index);
            }
        }

        configs.truncate(1);
        tracing::info!(kernel.name = %self.name, config = %configs[0].description, "autotuning finished");
        drop(configs);

        // Put the staged inputs back; the synchronize keeps the staging
        // buffers alive until the copies have landed.
        for (input_idx, copy) in &input_copies {
            let input = unsafe { *buffers.add(*input_idx) };
            unsafe { driver.memcpy_htod_async(input as u64, copy, stream)? };
        }
        driver.synchronize_stream(stream)?;
        Ok(())
    }

    pub fn from_wire(call: wire::AutotunedKernelCall) -> Self {
        Self::new(
            call.name,
            call.configs
                .into_iter()
                .map(|config| Config {
                    kernel_call: KernelCall::from_wire(config.kernel_call),
                    description: config.description,
                })
                .collect(),
            call.input_output_aliases
                .into_iter()
                .map(|alias| {
                    (
                        alias.input_buffer_idx as usize,
                        alias.output_buffer_idx as usize,
                        alias.buffer_size_bytes as usize,
                    )
                })
                .collect(),
        )
    }

    pub fn to_wire(&self) -> wire::AutotunedKernelCall {
        wire::AutotunedKernelCall {
            name: self.name.clone(),
            configs: self
                .configs
                .lock()
                .iter()
                .map(|config| wire::Config {
                    kernel_call: config.kernel_call.to_wire(),
                    description: config.description.clone(),
                })
                .collect(),
            input_output_aliases: self
                .input_output_aliases
                .iter()
                .map(|&(input_idx, output_idx, size)| wire::InputOutputAlias {
                    input_buffer_idx: input_idx as u64,
                    output_buffer_idx: output_idx as u64,
                    buffer_size_bytes: size as u64,
                })
                .collect(),
        }
    }
}
