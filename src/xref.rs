//! Cross-reference table parsing.
//!
//! Reads classic `xref` tables and cross-reference streams (PDF 1.5+),
//! following `/Prev` and hybrid `/XRefStm` links. Newer sections win over
//! older ones, which is exactly the incremental-update rule.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object_at, parse_object};
use std::collections::{HashMap, HashSet};

/// Type of a cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free entry
    Free,
    /// Object stored at a byte offset
    Uncompressed {
        /// Byte offset of `id gen obj`
        offset: u64,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing /ObjStm
        stream_id: u32,
        /// Index inside that stream
        index: u32,
    },
}

impl XRefEntry {
    /// Whether the entry points at a live object.
    pub fn in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free)
    }
}

/// Merged cross-reference information for the whole file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dict,
}

impl CrossRefTable {
    /// Look up an object number.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// The newest trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Object numbers of all live objects, ascending.
    pub fn in_use_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| e.in_use())
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Highest object number mentioned anywhere.
    pub fn max_id(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fill in entries from an older section; existing entries are newer and kept.
    fn merge_older(&mut self, older: HashMap<u32, XRefEntry>) {
        for (id, entry) in older {
            self.entries.entry(id).or_insert(entry);
        }
    }
}

/// Find the offset stored after the last `startxref`.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let window_start = data.len().saturating_sub(2048);
    let window = &data[window_start..];
    let keyword = b"startxref";
    let pos = window
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits: String = window[pos + keyword.len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits.parse().map_err(|_| Error::InvalidXref)
}

/// Read every cross-reference section reachable from `startxref`.
pub fn parse_xref(data: &[u8]) -> Result<CrossRefTable> {
    let start = find_startxref(data)?;
    let mut table = CrossRefTable::default();
    let mut visited = HashSet::new();
    let mut next = Some(start);
    let mut newest = true;

    while let Some(offset) = next {
        if !visited.insert(offset) || visited.len() > 100 {
            return Err(Error::DocumentCorrupt(format!(
                "xref /Prev chain loops or is too long (at offset {})",
                offset
            )));
        }

        let (entries, trailer) = parse_section(data, offset)?;
        log::debug!("xref section at {}: {} entries", offset, entries.len());
        table.merge_older(entries);

        // Hybrid files: the table's /XRefStm fills in compressed objects
        if let Some(stm_offset) = trailer.get("XRefStm").and_then(|o| o.as_integer()) {
            if visited.insert(stm_offset as u64) {
                let (stm_entries, _) = parse_xref_stream(data, stm_offset as u64)?;
                table.merge_older(stm_entries);
            }
        }

        next = trailer
            .get("Prev")
            .and_then(|p| p.as_integer())
            .map(|p| p as u64);
        if newest {
            table.trailer = trailer;
            newest = false;
        }
    }

    if table.is_empty() {
        return Err(Error::InvalidXref);
    }
    Ok(table)
}

fn parse_section(data: &[u8], offset: u64) -> Result<(HashMap<u32, XRefEntry>, Dict)> {
    let at = data.get(offset as usize..).ok_or(Error::InvalidXref)?;
    let trimmed_at = at
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(at.len());
    if at[trimmed_at..].starts_with(b"xref") {
        parse_classic_table(data, offset as usize + trimmed_at)
    } else {
        parse_xref_stream(data, offset)
    }
}

/// Next non-blank line at or after `pos`, as (start offset, line bytes).
fn next_line<'a>(data: &'a [u8], pos: &mut usize) -> Option<(usize, &'a [u8])> {
    while *pos < data.len() && data[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    if *pos >= data.len() {
        return None;
    }
    let start = *pos;
    while *pos < data.len() && data[*pos] != b'\n' && data[*pos] != b'\r' {
        *pos += 1;
    }
    Some((start, &data[start..*pos]))
}

fn parse_classic_table(data: &[u8], offset: usize) -> Result<(HashMap<u32, XRefEntry>, Dict)> {
    let mut entries = HashMap::new();
    let mut pos = offset + b"xref".len();

    loop {
        let (line_start, line) = next_line(data, &mut pos).ok_or(Error::InvalidXref)?;
        if line.starts_with(b"trailer") {
            let after = line_start + b"trailer".len();
            return match parse_object(&data[after..]) {
                Ok((_, Object::Dictionary(trailer))) => Ok((entries, trailer)),
                _ => Err(Error::InvalidXref),
            };
        }

        let header = std::str::from_utf8(line).map_err(|_| Error::InvalidXref)?;
        let mut parts = header.split_whitespace();
        let first: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or(Error::InvalidXref)?;
        let count: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or(Error::InvalidXref)?;

        for i in 0..count {
            let (_, row) = next_line(data, &mut pos).ok_or(Error::InvalidXref)?;
            let row = std::str::from_utf8(row).map_err(|_| Error::InvalidXref)?;
            let fields: Vec<&str> = row.split_whitespace().collect();
            if fields.len() < 3 {
                return Err(Error::InvalidXref);
            }
            let offset: u64 = fields[0].parse().map_err(|_| Error::InvalidXref)?;
            let generation: u16 = fields[1].parse().map_err(|_| Error::InvalidXref)?;
            let entry = if fields[2] == "n" {
                XRefEntry::Uncompressed { offset, generation }
            } else {
                XRefEntry::Free
            };
            entries.entry(first + i).or_insert(entry);
        }
    }
}

fn parse_xref_stream(data: &[u8], offset: u64) -> Result<(HashMap<u32, XRefEntry>, Dict)> {
    let (_, stream) = parse_indirect_object_at(data, offset as usize)?;
    let dict = stream
        .as_dict()
        .ok_or(Error::InvalidXref)?
        .clone();
    if dict.get("Type").and_then(|t| t.as_name()) != Some("XRef") {
        return Err(Error::InvalidXref);
    }

    let decoded = stream.decode_stream_data()?;
    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|w| w.as_array())
        .ok_or(Error::InvalidXref)?
        .iter()
        .map(|w| w.as_integer().unwrap_or(0).max(0) as usize)
        .collect();
    if widths.len() != 3 {
        return Err(Error::InvalidXref);
    }
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidXref);
    }

    let size = dict
        .get("Size")
        .and_then(|s| s.as_integer())
        .ok_or(Error::InvalidXref)?;
    let index: Vec<i64> = match dict.get("Index").and_then(|i| i.as_array()) {
        Some(arr) => arr.iter().filter_map(|o| o.as_integer()).collect(),
        None => vec![0, size],
    };

    let mut entries = HashMap::new();
    let mut rows = decoded.chunks_exact(row_len);
    for range in index.chunks(2) {
        let (first, count) = match range {
            [first, count] => (*first as u32, *count as u32),
            _ => return Err(Error::InvalidXref),
        };
        for i in 0..count {
            let row = rows.next().ok_or(Error::InvalidXref)?;
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // Type defaults to 1 when its width is zero
            let kind = if widths[0] == 0 { 1 } else { read_int(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: read_int(f2),
                    generation: read_int(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: read_int(f2) as u32,
                    index: read_int(f3) as u32,
                },
                // Unknown types are treated as null references
                _ => XRefEntry::Free,
            };
            entries.entry(first + i).or_insert(entry);
        }
    }

    Ok((entries, dict))
}

fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
