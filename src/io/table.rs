//! Binary LTC table files.
//!
//! Layout (little endian):
//!
//! ```text
//! magic   b"LTC1"
//! u32     table size N
//! u32     number of fitted entries
//! N*N x { u8 flag, 14 x f32 }      index = alpha + theta * N
//! ```
//!
//! Entries carry the 3x3 matrix (row major), magnitude, fresnel and the
//! `m11, m22, m13` lobe parameters. Unfitted entries are stored as zeros with
//! flag 0, which is what makes a partially computed table resumable. Flag 1
//! marks a fitted entry and flag 2 an entry that fell back to the identity
//! lobe, so that warnings survive a resumed run.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::FitError;

const MAGIC: &[u8; 4] = b"LTC1";
const FLOATS_PER_ENTRY: usize = 14;

/// Largest table side a file may declare.
pub const MAX_TABLE_SIZE: usize = 4096;

/// One fitted table cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LtcEntry {
    pub matrix: [f32; 9],
    pub magnitude: f32,
    pub fresnel: f32,
    pub m11: f32,
    pub m22: f32,
    pub m13: f32,
    /// The fit failed and the identity lobe was stored instead.
    pub fallback: bool,
}

impl LtcEntry {
    fn to_floats(self) -> [f32; FLOATS_PER_ENTRY] {
        let mut out = [0.0; FLOATS_PER_ENTRY];
        out[..9].copy_from_slice(&self.matrix);
        out[9] = self.magnitude;
        out[10] = self.fresnel;
        out[11] = self.m11;
        out[12] = self.m22;
        out[13] = self.m13;
        out
    }

    fn from_floats(v: &[f32; FLOATS_PER_ENTRY]) -> Self {
        let mut matrix = [0.0; 9];
        matrix.copy_from_slice(&v[..9]);
        Self {
            matrix,
            magnitude: v[9],
            fresnel: v[10],
            m11: v[11],
            m22: v[12],
            m13: v[13],
            fallback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LtcTable {
    size: usize,
    entries: Vec<Option<LtcEntry>>,
}

impl LtcTable {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            entries: vec![None; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index(&self, alpha: usize, theta: usize) -> usize {
        alpha + theta * self.size
    }

    pub fn get(&self, alpha: usize, theta: usize) -> Option<&LtcEntry> {
        self.entries.get(self.index(alpha, theta)).and_then(Option::as_ref)
    }

    pub fn set(&mut self, alpha: usize, theta: usize, entry: LtcEntry) {
        let idx = self.index(alpha, theta);
        self.entries[idx] = Some(entry);
    }

    pub fn fitted_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }

    pub fn read_from<R: Read>(reader: &mut R, path: &Path) -> Result<Self, FitError> {
        let invalid = |reason: String| FitError::InvalidTable {
            path: path.to_path_buf(),
            reason,
        };

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| invalid(format!("missing header: {e}")))?;
        if &magic != MAGIC {
            return Err(invalid("bad magic number".to_string()));
        }
        let size = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| invalid(format!("missing table size: {e}")))? as usize;
        let declared = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| invalid(format!("missing entry count: {e}")))? as usize;
        if size == 0 || size > MAX_TABLE_SIZE {
            return Err(invalid(format!("unsupported table size {size}")));
        }

        let mut table = LtcTable::new(size);
        let mut floats = [0.0f32; FLOATS_PER_ENTRY];
        for idx in 0..size * size {
            let fitted = reader
                .read_u8()
                .map_err(|e| invalid(format!("truncated at entry {idx}: {e}")))?;
            reader
                .read_f32_into::<LittleEndian>(&mut floats)
                .map_err(|e| invalid(format!("truncated at entry {idx}: {e}")))?;
            match fitted {
                0 => {}
                1 | 2 => {
                    let mut entry = LtcEntry::from_floats(&floats);
                    entry.fallback = fitted == 2;
                    table.entries[idx] = Some(entry);
                }
                other => return Err(invalid(format!("bad flag {other} at entry {idx}"))),
            }
        }

        if table.fitted_count() != declared {
            return Err(invalid(format!(
                "header declares {declared} fitted entries, found {}",
                table.fitted_count()
            )));
        }
        Ok(table)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.size as u32)?;
        writer.write_u32::<LittleEndian>(self.fitted_count() as u32)?;
        for entry in &self.entries {
            let (flag, floats) = match entry {
                Some(e) => (if e.fallback { 2u8 } else { 1u8 }, e.to_floats()),
                None => (0u8, [0.0; FLOATS_PER_ENTRY]),
            };
            writer.write_u8(flag)?;
            for v in floats {
                writer.write_f32::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }

    /// Read a table file.
    pub fn read(path: &Path) -> Result<Self, FitError> {
        let file = File::open(path).map_err(|e| FitError::io(path, e))?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, path)
    }

    /// Write the table, replacing `path` only once the new content is complete.
    pub fn write(&self, path: &Path) -> Result<(), FitError> {
        let tmp = temp_path(path);
        {
            let file = File::create(&tmp).map_err(|e| FitError::io(&tmp, e))?;
            let mut writer = BufWriter::new(file);
            self.write_to(&mut writer)
                .and_then(|_| writer.flush())
                .map_err(|e| FitError::io(&tmp, e))?;
        }
        fs::rename(&tmp, path).map_err(|e| FitError::io(path, e))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
