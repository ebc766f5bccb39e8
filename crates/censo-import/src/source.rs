//! Census file discovery and CSV reading.
//!
//! Census files are Latin-1 encoded and `;`-delimited. Records are read as
//! raw bytes and decoded byte-for-byte, since every Latin-1 byte maps to the
//! Unicode scalar of the same value.

use std::{
  collections::HashMap,
  fs,
  path::{Path, PathBuf},
};

use csv::{ByteRecord, ReaderBuilder};

use crate::{Error, Result};

pub const FILE_PREFIX: &str = "censo_";
pub const FILE_EXTENSION: &str = ".csv";

// ─── Discovery ───────────────────────────────────────────────────────────────

/// Paths of every `censo_*.csv` file directly inside `dir`, unordered.
pub fn census_files(dir: &Path) -> Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    let name = entry.file_name();
    let Some(name) = name.to_str() else { continue };
    if name.starts_with(FILE_PREFIX)
      && name.ends_with(FILE_EXTENSION)
      && entry.file_type()?.is_file()
    {
      files.push(entry.path());
    }
  }
  Ok(files)
}

/// The census year carried by a file name: the second `_`-separated segment
/// of the stem, so `censo_2022.csv` and `censo_2022_sp.csv` both yield 2022.
pub fn year_from_file_name(name: &str) -> Result<i32> {
  let stem = name.strip_suffix(FILE_EXTENSION).unwrap_or(name);
  stem
    .split('_')
    .nth(1)
    .and_then(|segment| segment.trim().parse().ok())
    .ok_or_else(|| Error::InvalidFileName(name.to_owned()))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Column positions of a census file, by header name.
#[derive(Debug, Clone, Default)]
pub struct Header {
  index: HashMap<String, usize>,
}

impl Header {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut index = HashMap::new();
    for (position, name) in names.into_iter().enumerate() {
      // A repeated header keeps its first position.
      index.entry(name.into()).or_insert(position);
    }
    Self { index }
  }

  pub fn len(&self) -> usize { self.index.len() }

  pub fn is_empty(&self) -> bool { self.index.is_empty() }

  pub fn row<'a>(&'a self, values: &'a [String]) -> RawRow<'a> {
    RawRow { header: self, values }
  }
}

/// One undecoded record viewed through its file's [`Header`].
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
  header: &'a Header,
  values: &'a [String],
}

impl<'a> RawRow<'a> {
  /// The raw value of `column`; `None` when the file lacks the column or the
  /// record is short.
  pub fn get(&self, column: &str) -> Option<&'a str> {
    let position = *self.header.index.get(column)?;
    self.values.get(position).map(String::as_str)
  }
}

/// Decode a Latin-1 field.
pub fn latin1(bytes: &[u8]) -> String { bytes.iter().map(|&b| char::from(b)).collect() }

/// Read a census file and hand each record to `f`.
///
/// Returns the number of records read. Any read error aborts the file.
pub fn read_rows<F>(path: &Path, mut f: F) -> Result<usize>
where
  F: FnMut(RawRow<'_>),
{
  let mut reader = ReaderBuilder::new()
    .delimiter(b';')
    .has_headers(true)
    .flexible(true)
    .from_path(path)?;

  let header = Header::new(reader.byte_headers()?.iter().map(|h| latin1(h).trim().to_owned()));

  let mut record = ByteRecord::new();
  let mut values = Vec::with_capacity(header.len());
  let mut read = 0;
  while reader.read_byte_record(&mut record)? {
    values.clear();
    values.extend(record.iter().map(latin1));
    f(header.row(&values));
    read += 1;
  }
  Ok(read)
}
