//! Definitions of the TrueType table directory used by the font index.

use std::collections::HashMap;

use crate::binary_reader::{read_tag, read_u16_be, read_u32_be};
use crate::error::FontError;

pub const TAG_CMAP: [u8; 4] = *b"cmap";
pub const TAG_GLYF: [u8; 4] = *b"glyf";
pub const TAG_HEAD: [u8; 4] = *b"head";
pub const TAG_HHEA: [u8; 4] = *b"hhea";
pub const TAG_HMTX: [u8; 4] = *b"hmtx";
pub const TAG_KERN: [u8; 4] = *b"kern";
pub const TAG_LOCA: [u8; 4] = *b"loca";
pub const TAG_MAXP: [u8; 4] = *b"maxp";

/// Offset table is 12 bytes: sfnt version, numTables, searchRange,
/// entrySelector, rangeShift. Directory entries follow, 16 bytes each.
const OFFSET_TABLE_SIZE: usize = 12;
const DIRECTORY_ENTRY_SIZE: usize = 16;

/// A directory entry in the font file's table directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: [u8; 4],
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// Every table record in the directory, keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct TableDirectory {
    tables: HashMap<[u8; 4], TableRecord>,
}

impl TableDirectory {
    pub fn read(data: &[u8]) -> Result<Self, FontError> {
        let num_tables = read_u16_be(data, 4)? as usize;
        let mut tables = HashMap::with_capacity(num_tables);
        for i in 0..num_tables {
            let entry = OFFSET_TABLE_SIZE + DIRECTORY_ENTRY_SIZE * i;
            let record = TableRecord {
                tag: read_tag(data, entry)?,
                checksum: read_u32_be(data, entry + 4)?,
                offset: read_u32_be(data, entry + 8)?,
                length: read_u32_be(data, entry + 12)?,
            };
            tables.insert(record.tag, record);
        }
        Ok(Self { tables })
    }

    pub fn get(&self, tag: &[u8; 4]) -> Option<&TableRecord> {
        self.tables.get(tag)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Byte offset of a table that must be present.
    pub fn require(&self, tag: &'static [u8; 4]) -> Result<usize, FontError> {
        self.tables
            .get(tag)
            .map(|rec| rec.offset as usize)
            .ok_or_else(|| FontError::MissingTable(tag_name(tag)))
    }
}

fn tag_name(tag: &'static [u8; 4]) -> &'static str {
    std::str::from_utf8(tag).unwrap_or("????")
}
