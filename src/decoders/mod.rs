//! Stream filters.
//!
//! Only what cross-reference streams and object streams need: FlateDecode
//! with optional PNG/TIFF predictors. Content streams are never decoded
//! because signing carries them through byte-for-byte.

use crate::error::{Error, Result};
use crate::object::Object;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Upper bound on decoded size, guards against decompression bombs.
const MAX_DECODED_SIZE: usize = 64 * 1024 * 1024;

/// Trait for stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in /Filter.
    fn name(&self) -> &str;
}

/// Run `data` through the named filters in order, then undo any predictor.
pub fn decode_stream(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            other => return Err(Error::Unsupported(format!("stream filter /{}", other))),
        };
        current = decoder.decode(&current)?;
        log::debug!("{} produced {} bytes", decoder.name(), current.len());

        if current.len() > MAX_DECODED_SIZE {
            return Err(Error::Decode(format!(
                "decoded stream exceeds {} bytes",
                MAX_DECODED_SIZE
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

impl DecodeParams {
    /// Read predictor parameters from a /DecodeParms entry (dictionary, or
    /// array whose first dictionary applies).
    pub fn from_object(params_obj: Option<&Object>) -> Option<Self> {
        let dict = match params_obj? {
            Object::Dictionary(d) => d,
            Object::Array(arr) => arr.iter().find_map(|obj| obj.as_dict())?,
            _ => return None,
        };
        let int = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|obj| obj.as_integer())
                .unwrap_or(default)
        };
        Some(DecodeParams {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1) as usize,
            colors: int("Colors", 1) as usize,
            bits_per_component: int("BitsPerComponent", 8) as usize,
        })
    }
}
