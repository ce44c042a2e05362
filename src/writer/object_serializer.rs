//! Object-to-bytes writer (ISO 32000-1 §7.3).
//!
//! Dictionary keys are written in sorted order, so the same object always
//! produces the same bytes. Signature placeholders are found again after
//! writing by searching for that exact text.

use crate::lexer::{is_delimiter, is_whitespace};
use crate::object::{Dict, Object};

/// Writes [`Object`]s as PDF syntax.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Omit optional whitespace
    compact: bool,
}

impl ObjectSerializer {
    /// Serializer with readable spacing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializer with no optional whitespace.
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Bytes of `obj`.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// `obj` as lossy UTF-8, for logs and tests.
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).to_string()
    }

    /// `{id} {gen} obj`, the object, `endobj`, each on its own line.
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    fn write_object(&self, w: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => w.extend_from_slice(b"null"),
            Object::Boolean(b) => w.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => w.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(w, *r),
            Object::String(s) => write_string(w, s),
            Object::Name(n) => write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => self.write_stream(w, dict, data),
            Object::Reference(r) => w.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_array(&self, w: &mut Vec<u8>, arr: &[Object]) {
        w.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                w.push(b' ');
            }
            self.write_object(w, obj);
        }
        w.push(b']');
    }

    fn write_dictionary(&self, w: &mut Vec<u8>, dict: &Dict) {
        w.extend_from_slice(b"<<");

        let mut keys: Vec<_> = dict.keys().collect();
        keys.sort();

        for key in keys {
            if let Some(value) = dict.get(key) {
                if !self.compact {
                    w.extend_from_slice(b"\n  ");
                }
                write_name(w, key);
                w.push(b' ');
                self.write_object(w, value);
            }
        }

        if !self.compact && !dict.is_empty() {
            w.push(b'\n');
        }
        w.extend_from_slice(b">>");
    }

    /// Streams always get a /Length matching the bytes actually written.
    fn write_stream(&self, w: &mut Vec<u8>, dict: &Dict, data: &[u8]) {
        let mut dict_with_length = dict.clone();
        dict_with_length.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(w, &dict_with_length);
        w.extend_from_slice(b"\nstream\n");
        w.extend_from_slice(data);
        w.extend_from_slice(b"\nendstream");
    }
}

/// Reals get at most five decimals with trailing zeros trimmed.
fn write_real(w: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        w.push(b'0');
    } else if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        w.extend_from_slice((value as i64).to_string().as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        w.extend_from_slice(trimmed.as_bytes());
    }
}

/// Literal syntax for printable text, hex syntax for anything binary.
fn write_string(w: &mut Vec<u8>, data: &[u8]) {
    let is_printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if is_printable {
        w.push(b'(');
        for &byte in data {
            match byte {
                b'(' => w.extend_from_slice(b"\\("),
                b')' => w.extend_from_slice(b"\\)"),
                b'\\' => w.extend_from_slice(b"\\\\"),
                b'\n' => w.extend_from_slice(b"\\n"),
                b'\r' => w.extend_from_slice(b"\\r"),
                b'\t' => w.extend_from_slice(b"\\t"),
                _ => w.push(byte),
            }
        }
        w.push(b')');
    } else {
        w.push(b'<');
        w.extend_from_slice(hex_upper(data).as_bytes());
        w.push(b'>');
    }
}

fn write_name(w: &mut Vec<u8>, name: &str) {
    w.push(b'/');
    for byte in name.bytes() {
        let regular =
            (0x21..=0x7E).contains(&byte) && byte != b'#' && !is_delimiter(byte) && !is_whitespace(byte);
        if regular {
            w.push(byte);
        } else {
            w.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

/// Uppercase hex encoding, as used for `/Contents` and `/ID`.
pub fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    #[test]
    fn test_serialize_scalars() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Null), "null");
        assert_eq!(s.serialize_to_string(&Object::Boolean(false)), "false");
        assert_eq!(s.serialize_to_string(&Object::Integer(-123)), "-123");
        assert_eq!(s.serialize_to_string(&Object::Integer(9_999_999_999)), "9999999999");
    }

    #[test]
    fn test_serialize_real() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Real(3.14258)), "3.14258");
        assert_eq!(s.serialize_to_string(&Object::Real(220.0)), "220");
        assert_eq!(s.serialize_to_string(&Object::Real(0.5)), "0.5");
    }

    #[test]
    fn test_serialize_strings() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::text("Signer A")), "(Signer A)");
        assert_eq!(
            s.serialize_to_string(&Object::String(b"Test (parens)".to_vec())),
            "(Test \\(parens\\))"
        );
        assert_eq!(s.serialize_to_string(&Object::String(vec![0x00, 0xFF, 0x80])), "<00FF80>");
    }

    #[test]
    fn test_contents_placeholder_is_hex_zeros() {
        let s = ObjectSerializer::compact();
        let placeholder = Object::String(vec![0; 4]);
        assert_eq!(s.serialize_to_string(&placeholder), "<00000000>");
    }

    #[test]
    fn test_serialize_name_escapes_delimiters() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::name("Adobe.PPKLite")), "/Adobe.PPKLite");
        assert_eq!(s.serialize_to_string(&Object::name("A B")), "/A#20B");
        assert_eq!(s.serialize_to_string(&Object::name("a(b)")), "/a#28b#29");
        assert_eq!(s.serialize_to_string(&Object::name("x#y")), "/x#23y");
    }

    #[test]
    fn test_dictionary_keys_sorted() {
        let s = ObjectSerializer::compact();
        let dict = Object::dict([
            ("Type", Object::name("Sig")),
            ("Filter", Object::name("Adobe.PPKLite")),
            ("ByteRange", Object::Array(vec![Object::Integer(0)])),
            ("V", Object::Reference(ObjectRef::new(10, 0))),
        ]);
        assert_eq!(
            s.serialize_to_string(&dict),
            "<</ByteRange [0]/Filter /Adobe.PPKLite/Type /Sig/V 10 0 R>>"
        );
    }

    #[test]
    fn test_serialize_indirect() {
        let s = ObjectSerializer::compact();
        let bytes = s.serialize_indirect(7, 0, &Object::Integer(42));
        assert_eq!(bytes, b"7 0 obj\n42\nendobj\n".to_vec());
    }

    #[test]
    fn test_stream_length_is_rewritten() {
        let s = ObjectSerializer::compact();
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), Object::Integer(999));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"stream data"),
        };
        let result = s.serialize_to_string(&stream);
        assert!(result.contains("/Length 11"));
        assert!(result.ends_with("stream\nstream data\nendstream"));
    }

    #[test]
    fn test_output_parses_back() {
        let s = ObjectSerializer::compact();
        let original = Object::dict([
            ("T", Object::text("email")),
            ("Rect", Object::rect(20.0, 20.0, 220.5, 70.0)),
            ("Ff", Object::Integer(1)),
        ]);
        let bytes = s.serialize(&original);
        let (_, parsed) = crate::parser::parse_object(&bytes).unwrap();
        let parsed = parsed.as_dict().unwrap();

        assert_eq!(parsed["T"].as_text().as_deref(), Some("email"));
        assert_eq!(parsed["Ff"], Object::Integer(1));
        // Whole reals come back as integers; the values are what matter.
        let rect: Vec<f64> = parsed["Rect"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n.as_number().unwrap())
            .collect();
        assert_eq!(rect, vec![20.0, 20.0, 220.5, 70.0]);
    }
}
