//! Object streams (`/Type /ObjStm`, PDF 1.5+).
//!
//! The decoded stream starts with `N` pairs of `objnum offset` followed, at
//! byte `/First`, by the objects themselves without `obj`/`endobj` wrappers.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Decode an object stream into `object number -> object`.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "ObjStm stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    let header_int = |key: &str| -> Result<usize> {
        dict.get(key)
            .and_then(|o| o.as_integer())
            .filter(|v| (0..=10_000_000).contains(v))
            .map(|v| v as usize)
            .ok_or_else(|| Error::DocumentCorrupt(format!("object stream has no usable /{}", key)))
    };
    let count = header_int("N")?;
    let first = header_int("First")?;

    let decoded = stream_obj.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::DocumentCorrupt(format!(
            "object stream is {} bytes but /First is {}",
            decoded.len(),
            first
        )));
    }

    let mut header = &decoded[..first];
    let body = &decoded[first..];
    let mut objects = HashMap::with_capacity(count);

    for _ in 0..count {
        let (rest, id) = read_int(header)?;
        let (rest, offset) = read_int(rest)?;
        header = rest;

        let Some(slice) = body.get(offset as usize..) else {
            log::warn!("object {} points past the end of its object stream", id);
            continue;
        };
        match parse_object(slice) {
            Ok((_, obj)) => {
                objects.insert(id as u32, obj);
            },
            Err(e) => log::warn!("object {} in object stream failed to parse: {:?}", id, e),
        }
    }

    Ok(objects)
}

fn read_int(input: &[u8]) -> Result<(&[u8], i64)> {
    match token(input) {
        Ok((rest, Token::Integer(v))) if v >= 0 => Ok((rest, v)),
        _ => Err(Error::DocumentCorrupt("malformed object stream header".to_string())),
    }
}
