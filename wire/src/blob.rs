//! Compressed-blob codec.
//!
//! A blob is a bincode-encoded [`AnyKernelCall`] wrapped in an RFC 1950 zlib
//! envelope. The envelope does not record the inflated size, so decoding
//! guesses a capacity and grows it until the whole stream fits.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::AnyKernelCall;
use crate::error::{DecompressSnafu, ParseSnafu, Result, SerializeSnafu};

/// Inflate a zlib-compressed payload.
///
/// Output capacity starts at five times the compressed size and doubles as
/// long as the previous attempt filled the buffer without reaching the end
/// of the stream. A stream that stalls with spare output capacity is
/// truncated or not zlib at all.
pub fn inflate(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut capacity = 5 * compressed.len();
    loop {
        let mut output = vec![0u8; capacity];
        let mut stream = Decompress::new(true);
        let status = stream
            .decompress(compressed, &mut output, FlushDecompress::Finish)
            .map_err(|error| DecompressSnafu { reason: error.to_string() }.build())?;
        match status {
            Status::StreamEnd => {
                output.truncate(stream.total_out() as usize);
                return Ok(output);
            }
            _ if capacity > 0 && stream.total_out() as usize == capacity => capacity *= 2,
            _ => return DecompressSnafu { reason: "incomplete zlib stream" }.fail(),
        }
    }
}

/// Deflate raw bytes into the zlib envelope expected by [`inflate`].
pub fn deflate(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(raw)
        .and_then(|()| encoder.finish())
        .map_err(|error| SerializeSnafu { reason: error.to_string() }.build())
}

/// Decode the opaque bytes of one custom-call site.
pub fn decode_blob(opaque: &[u8]) -> Result<AnyKernelCall> {
    let serialized = inflate(opaque)?;
    bincode::deserialize(&serialized).map_err(|error| ParseSnafu { reason: error.to_string() }.build())
}

/// Encode a call into the opaque form handed to the runtime.
pub fn encode_blob(call: &AnyKernelCall) -> Result<Vec<u8>> {
    let serialized =
        bincode::serialize(call).map_err(|error| SerializeSnafu { reason: error.to_string() }.build())?;
    deflate(&serialized)
}
