//! The external assembler seam.
//!
//! Production lowering shells out to `ptxas` from the CUDA toolkit, writing
//! the assembly to a temp directory and reading back the compiled image.

use std::path::PathBuf;
use std::process::Command;

use crate::error::{CompileError, CompileSnafu};

/// Lowers textual GPU assembly to a loadable binary image.
pub trait AsmCompiler: Send + Sync + std::fmt::Debug {
    fn compile(&self, cc_major: i32, cc_minor: i32, asm: &str) -> Result<Vec<u8>, CompileError>;
}

/// Compiles PTX with the `ptxas` binary.
#[derive(Debug, Clone)]
pub struct PtxasCompiler {
    ptxas: PathBuf,
}

impl PtxasCompiler {
    /// Use the binary named by `WARPCALL_PTXAS_PATH`, falling back to
    /// `ptxas` on `$PATH`.
    pub fn from_env() -> Self {
        let ptxas =
            std::env::var_os("WARPCALL_PTXAS_PATH").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("ptxas"));
        Self { ptxas }
    }

    pub fn with_binary(ptxas: impl Into<PathBuf>) -> Self {
        Self { ptxas: ptxas.into() }
    }
}

impl Default for PtxasCompiler {
    fn default() -> Self {
        Self::from_env()
    }
}

impl AsmCompiler for PtxasCompiler {
    fn compile(&self, cc_major: i32, cc_minor: i32, asm: &str) -> Result<Vec<u8>, CompileError> {
        let dir = tempfile::tempdir()
            .map_err(|error| CompileSnafu { reason: format!("failed to create temp directory: {error}") }.build())?;
        let src_path = dir.path().join("kernel.ptx");
        let out_path = dir.path().join("kernel.cubin");

        std::fs::write(&src_path, asm)
            .map_err(|error| CompileSnafu { reason: format!("failed to write PTX source: {error}") }.build())?;

        let output = Command::new(&self.ptxas)
            .arg(format!("--gpu-name=sm_{cc_major}{cc_minor}"))
            .arg("-o")
            .arg(&out_path)
            .arg(&src_path)
            .output()
            .map_err(|error| {
                CompileSnafu {
                    reason: format!(
                        "failed to run {}: {error}. Is the CUDA toolkit installed?",
                        self.ptxas.display()
                    ),
                }
                .build()
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return CompileSnafu { reason: format!("ptxas failed:\n{stderr}") }.fail();
        }

        tracing::debug!(cc_major, cc_minor, "compiled PTX with ptxas");
        std::fs::read(&out_path)
            .map_err(|error| CompileSnafu { reason: format!("failed to read compiled image: {error}") }.build())
    }
}
