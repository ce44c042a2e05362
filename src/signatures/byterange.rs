//! Signed-byte layout of a signature revision.
//!
//! A signature covers the whole revision except its own `/Contents` hex
//! string. `/ByteRange [0 a b c]` names the two covered spans: bytes
//! `0..a` run up to the `<` of the hex string and bytes `b..b+c` start
//! right after its `>`.
//!
//! The dictionary is serialized with a wide dummy ByteRange (see
//! [`byte_range_placeholder`]) and an all-zero `/Contents`. After layout the
//! real ByteRange is patched over the dummy at the same width and the DER
//! signature over the zeros, so no offset moves.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::writer::hex_upper;

/// Width-reserving value used in each dummy ByteRange slot.
const PLACEHOLDER_SLOT: i64 = 9_999_999_999;

/// Dummy ByteRange written before offsets are known.
pub fn byte_range_placeholder() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(PLACEHOLDER_SLOT),
        Object::Integer(PLACEHOLDER_SLOT),
        Object::Integer(PLACEHOLDER_SLOT),
    ])
}

fn placeholder_text() -> String {
    format!("[0 {0} {0} {0}]", PLACEHOLDER_SLOT)
}

/// Location of the patchable parts of a written signature dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureGap {
    /// Offset of the dummy ByteRange array (its `[`)
    pub byte_range_offset: usize,
    /// Width of the dummy ByteRange array text
    pub byte_range_len: usize,
    /// Offset of the `/Contents` hex string (its `<`)
    pub contents_offset: usize,
}

/// Offsets and sizes of one `/Contents` reservation.
#[derive(Debug)]
pub struct ByteRangeCalculator {
    /// Bytes reserved for the DER signature
    reserved: usize,
    /// Text width of the hex string, delimiters included
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Calculator for a `/Contents` gap holding `reserved` DER bytes, that
    /// is `2 * reserved + 2` bytes of text.
    pub fn new(reserved: usize) -> Self {
        Self {
            reserved,
            placeholder_size: reserved * 2 + 2,
        }
    }

    /// Bytes reserved for the DER signature.
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Width of the `/Contents` hex string in the file.
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// The `/Contents` placeholder object: `reserved` zero bytes, which the
    /// serializer writes as a hex string of zeros.
    pub fn contents_placeholder(&self) -> Object {
        Object::String(vec![0; self.reserved])
    }

    /// Find the dummy ByteRange and the `/Contents` value inside the
    /// indirect object that starts at `object_offset`.
    pub fn locate(&self, pdf_data: &[u8], object_offset: usize) -> Result<SignatureGap> {
        let region = pdf_data.get(object_offset..).ok_or_else(|| {
            Error::DocumentCorrupt("signature object offset beyond end of file".to_string())
        })?;
        let end = find(region, b"endobj").unwrap_or(region.len());
        let region = &region[..end];

        let placeholder = placeholder_text();
        let byte_range_rel = find(region, b"/ByteRange")
            .and_then(|key| {
                find(&region[key..], placeholder.as_bytes()).map(|rel| key + rel)
            })
            .ok_or_else(|| {
                Error::DocumentCorrupt("signature dictionary has no ByteRange placeholder".to_string())
            })?;

        let contents_key = find(region, b"/Contents").ok_or_else(|| {
            Error::DocumentCorrupt("signature dictionary has no /Contents".to_string())
        })?;
        let contents_rel = region[contents_key + b"/Contents".len()..]
            .iter()
            .position(|&b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
            .map(|skip| contents_key + b"/Contents".len() + skip)
            .filter(|&pos| region[pos] == b'<')
            .ok_or_else(|| {
                Error::DocumentCorrupt("signature /Contents is not a hex string".to_string())
            })?;

        if contents_rel + self.placeholder_size > region.len()
            || region[contents_rel + self.placeholder_size - 1] != b'>'
        {
            return Err(Error::DocumentCorrupt(format!(
                "signature /Contents is not a {}-byte placeholder",
                self.reserved
            )));
        }

        Ok(SignatureGap {
            byte_range_offset: object_offset + byte_range_rel,
            byte_range_len: placeholder.len(),
            contents_offset: object_offset + contents_rel,
        })
    }

    /// ByteRange for a revision of `file_size` bytes whose hex string
    /// starts at `contents_offset`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// `[a b c d]`, as written into the file.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Overwrite the dummy ByteRange with the real one, padded with spaces
    /// to the same width.
    pub fn write_byte_range(
        &self,
        pdf_data: &mut [u8],
        gap: &SignatureGap,
        byte_range: &[i64; 4],
    ) -> Result<()> {
        let text = Self::format_byte_range(byte_range);
        if text.len() > gap.byte_range_len {
            return Err(Error::DocumentCorrupt(format!(
                "ByteRange {} does not fit its {}-byte placeholder",
                text, gap.byte_range_len
            )));
        }
        let slot = pdf_data
            .get_mut(gap.byte_range_offset..gap.byte_range_offset + gap.byte_range_len)
            .ok_or_else(|| Error::DocumentCorrupt("ByteRange placeholder out of bounds".to_string()))?;
        slot.fill(b' ');
        slot[..text.len()].copy_from_slice(text.as_bytes());
        Ok(())
    }

    /// The two covered spans, concatenated.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        let span = |start: i64, len: i64| -> Result<&[u8]> {
            let start = usize::try_from(start).ok();
            let len = usize::try_from(len).ok();
            start
                .zip(len)
                .and_then(|(s, l)| pdf_data.get(s..s.checked_add(l)?))
                .ok_or_else(|| {
                    Error::DocumentCorrupt(format!(
                        "ByteRange {:?} does not fit a file of {} bytes",
                        byte_range,
                        pdf_data.len()
                    ))
                })
        };

        let head = span(byte_range[0], byte_range[1])?;
        let tail = span(byte_range[2], byte_range[3])?;
        let mut signed = Vec::with_capacity(head.len() + tail.len());
        signed.extend_from_slice(head);
        signed.extend_from_slice(tail);
        Ok(signed)
    }

    /// Check the shape of a ByteRange read back from a file.
    ///
    /// The first range must start at 0, the gap between the ranges must be
    /// exactly one hex string, and the second range may end before the end
    /// of the file when later revisions were appended.
    pub fn validate_byte_range(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::DocumentCorrupt(format!("ByteRange must start at 0, got {}", offset1)));
        }
        if length1 < 0 || length2 < 0 || length1 >= offset2 {
            return Err(Error::DocumentCorrupt(format!(
                "ByteRange ranges overlap or are negative: {:?}",
                byte_range
            )));
        }
        let end = offset2
            .checked_add(length2)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or_else(|| {
                Error::DocumentCorrupt(format!("ByteRange overflows: {:?}", byte_range))
            })?;
        if end > pdf_data.len() {
            return Err(Error::DocumentCorrupt(format!(
                "ByteRange ends at {} but the file has {} bytes",
                end,
                pdf_data.len()
            )));
        }
        let gap = &pdf_data[length1 as usize..offset2 as usize];
        let is_hex_string = gap.first() == Some(&b'<')
            && gap.last() == Some(&b'>')
            && gap[1..gap.len() - 1].iter().all(|b| b.is_ascii_hexdigit());
        if gap.len() < 2 || !is_hex_string {
            return Err(Error::DocumentCorrupt(
                "ByteRange gap is not exactly the signature hex string".to_string(),
            ));
        }
        Ok(())
    }

    /// Write `der` as hex over the zeros of the `/Contents` placeholder.
    ///
    /// A signature larger than the reservation fails with
    /// [`Error::CapacityExceeded`]; it is never truncated.
    pub fn insert_signature(
        &self,
        pdf_data: &mut [u8],
        contents_offset: usize,
        signature_der: &[u8],
    ) -> Result<()> {
        if signature_der.len() > self.reserved {
            return Err(Error::CapacityExceeded {
                required: signature_der.len(),
                reserved: self.reserved,
            });
        }

        let hex = hex_upper(signature_der);
        let sig_value = format!("<{:0<width$}>", hex, width = self.reserved * 2);

        let slot = pdf_data
            .get_mut(contents_offset..contents_offset + self.placeholder_size)
            .ok_or_else(|| {
                Error::DocumentCorrupt("Signature insertion would exceed file bounds".to_string())
            })?;
        slot.copy_from_slice(sig_value.as_bytes());

        Ok(())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;
    use crate::writer::ObjectSerializer;

    fn written_sig_object(calc: &ByteRangeCalculator) -> Vec<u8> {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("ByteRange".to_string(), byte_range_placeholder());
        dict.insert("Contents".to_string(), calc.contents_placeholder());
        let mut data = b"%PDF-1.7\nfiller\n".to_vec();
        data.extend_from_slice(
            &ObjectSerializer::compact().serialize_indirect(9, 0, &Object::Dictionary(dict)),
        );
        data.extend_from_slice(b"trailer stuff\n%%EOF\n");
        data
    }

    #[test]
    fn test_placeholder_size() {
        let calc = ByteRangeCalculator::new(1024);
        assert_eq!(calc.placeholder_size(), 2050);
        assert_eq!(calc.reserved(), 1024);
    }

    #[test]
    fn test_locate_and_patch() {
        let calc = ByteRangeCalculator::new(8);
        let mut data = written_sig_object(&calc);
        let gap = calc.locate(&data, 16).unwrap();
        assert_eq!(data[gap.contents_offset], b'<');
        assert_eq!(data[gap.contents_offset + calc.placeholder_size() - 1], b'>');

        let range = calc.calculate_byte_range(data.len(), gap.contents_offset);
        calc.write_byte_range(&mut data, &gap, &range).unwrap();
        calc.insert_signature(&mut data, gap.contents_offset, &[0xAB, 0xCD]).unwrap();

        let text = String::from_utf8_lossy(&data).to_string();
        assert!(text.contains(&ByteRangeCalculator::format_byte_range(&range)));
        assert!(text.contains("<ABCD000000000000>"));
        ByteRangeCalculator::validate_byte_range(&data, &range).unwrap();

        let signed = ByteRangeCalculator::extract_signed_bytes(&data, &range).unwrap();
        assert_eq!(signed.len(), data.len() - calc.placeholder_size());
    }

    #[test]
    fn test_locate_requires_placeholder() {
        let calc = ByteRangeCalculator::new(8);
        let data = b"1 0 obj\n<</ByteRange [0 1 2 3]/Contents <00>>>\nendobj\n";
        assert!(calc.locate(data, 0).is_err());
    }

    #[test]
    fn test_calculate_byte_range() {
        let calc = ByteRangeCalculator::new(49);
        let byte_range = calc.calculate_byte_range(1000, 400);
        assert_eq!(byte_range, [0, 400, 500, 500]);
    }

    #[test]
    fn test_extract_signed_bytes() {
        let signed = ByteRangeCalculator::extract_signed_bytes(b"AAABBBCCC", &[0, 3, 6, 3]).unwrap();
        assert_eq!(signed, b"AAACCC");
        assert!(ByteRangeCalculator::extract_signed_bytes(b"AAA", &[0, 3, 6, 3]).is_err());
    }

    #[test]
    fn test_validate_byte_range() {
        let data = b"AAA<0F>CCCDDD";
        assert!(ByteRangeCalculator::validate_byte_range(data, &[0, 3, 7, 3]).is_ok());
        // Earlier revision: ends before EOF
        assert!(ByteRangeCalculator::validate_byte_range(data, &[0, 3, 7, 1]).is_ok());
        assert!(ByteRangeCalculator::validate_byte_range(data, &[1, 3, 7, 3]).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(data, &[0, 2, 7, 3]).is_err());
        assert!(ByteRangeCalculator::validate_byte_range(data, &[0, 3, 7, 30]).is_err());
        let overflow = ByteRangeCalculator::validate_byte_range(data, &[0, 1, i64::MAX, 1]);
        assert!(matches!(overflow, Err(Error::DocumentCorrupt(_))));
    }

    #[test]
    fn test_insert_signature_too_large() {
        let calc = ByteRangeCalculator::new(4);
        let mut data = b"XX<00000000>YY".to_vec();
        match calc.insert_signature(&mut data, 2, &[1, 2, 3, 4, 5]) {
            Err(Error::CapacityExceeded { required, reserved }) => {
                assert_eq!(required, 5);
                assert_eq!(reserved, 4);
            },
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }
        assert_eq!(&data, b"XX<00000000>YY");
    }
}
