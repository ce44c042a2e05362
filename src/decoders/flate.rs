//! FlateDecode (zlib) filter.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// Zlib/deflate decoder. Partial output is never returned; an inflate error
/// fails the whole decode.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        if ZlibDecoder::new(input).read_to_end(&mut output).is_ok() {
            return Ok(output);
        }

        // Some writers omit the zlib header
        log::debug!("zlib header rejected, retrying as raw deflate");
        output.clear();
        DeflateDecoder::new(input)
            .read_to_end(&mut output)
            .map_err(|e| Error::Decode(format!("FlateDecode: {}", e)))?;
        Ok(output)
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}
