use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Blob encoding and decoding failures.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The payload is not a complete zlib stream.
    #[snafu(display("failed to uncompress opaque data: {reason}"))]
    Decompress { reason: String },

    /// The inflated bytes do not form a kernel-call record.
    #[snafu(display("failed to parse serialized kernel call: {reason}"))]
    Parse { reason: String },

    #[snafu(display("failed to serialize kernel call: {reason}"))]
    Serialize { reason: String },
}
