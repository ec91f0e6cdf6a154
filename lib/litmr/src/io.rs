use crate::constants::SUCCESS_MARKER;
use anyhow::{Context, Result};
use memchr::memchr;
use memmap2::Mmap;
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::Hasher;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    fs::create_dir_all(path.as_ref()).with_context(|| format!("create_dir_all {}", path.as_ref().display()))
}

/// Hidden files and `_`-prefixed markers (`_SUCCESS`, `_STATS.json`) are not data.
fn is_data_file(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => !name.starts_with('.') && !name.starts_with('_'),
        None => false,
    }
}

/// Data files under `path` (or `path` itself when it is a file), sorted for a stable split plan.
pub fn list_input_files(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.with_context(|| format!("walk {}", path.display()))?;
        if entry.file_type().is_file() && is_data_file(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// A byte range of one input file. The split owns every line whose first byte lies in `[start, end)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSplit {
    pub path: PathBuf,
    pub start: u64,
    pub end: u64,
}

pub fn plan_splits(files: &[PathBuf], split_bytes: u64) -> Result<Vec<InputSplit>> {
    let split_bytes = split_bytes.max(1);
    let mut splits = Vec::new();
    for path in files {
        let len = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?.len();
        let mut start = 0u64;
        while start < len {
            let end = (start + split_bytes).min(len);
            splits.push(InputSplit { path: path.clone(), start, end });
            start = end;
        }
    }
    Ok(splits)
}

/// Calls `f` for every line owned by `split`, without the trailing `\n` / `\r\n`.
/// Returns the number of lines visited.
pub fn for_each_line_in_split<F>(split: &InputSplit, mut f: F) -> Result<u64>
where
    F: FnMut(&str) -> Result<()>,
{
    let file = File::open(&split.path).with_context(|| format!("open {}", split.path.display()))?;
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", split.path.display()))?;
    let bytes = &map[..];
    let len = bytes.len();
    let start = (split.start as usize).min(len);
    let end = (split.end as usize).min(len);

    let mut pos = if start == 0 {
        0
    } else {
        match memchr(b'\n', &bytes[start - 1..]) {
            Some(i) => start + i,
            None => return Ok(0),
        }
    };

    let mut lines = 0u64;
    while pos < end {
        let line_end = memchr(b'\n', &bytes[pos..]).map(|i| pos + i).unwrap_or(len);
        let mut line = &bytes[pos..line_end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        f(&String::from_utf8_lossy(line))?;
        lines += 1;
        pos = line_end + 1;
    }
    Ok(lines)
}

pub fn read_lines(path: impl AsRef<Path>) -> Result<impl Iterator<Item = Result<String>>> {
    let file = File::open(path.as_ref()).with_context(|| format!("open {}", path.as_ref().display()))?;
    let reader = BufReader::new(file);
    Ok(reader.lines().map(|l| l.map_err(anyhow::Error::from)))
}

/// Routes an encoded key to a reducer partition. Equal key bytes always land on the same partition.
pub fn hash_to_partition(key_bytes: &[u8], num_partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    hasher.write(key_bytes);
    (hasher.finish() as usize) % num_partitions.max(1)
}

pub const RECORD_HEADER_LEN: usize = 8;

// Intermediate record layout: [klen u32 LE][vlen u32 LE][key][value]
pub fn write_bin(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
}

/// Reads the record at `off`, returning `(key, value, next_offset)`.
/// `None` at the end of the buffer or on a truncated record; callers compare
/// the final offset with the buffer length to tell the two apart.
pub fn read_bin_line(bytes: &[u8], off: usize) -> Option<(&[u8], &[u8], usize)> {
    let header = bytes.get(off..off + RECORD_HEADER_LEN)?;
    let klen = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let vlen = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let key_start = off + RECORD_HEADER_LEN;
    let key_end = key_start + klen;
    let end = key_end + vlen;
    if end > bytes.len() {
        return None;
    }
    Some((&bytes[key_start..key_end], &bytes[key_end..end], end))
}

pub fn open_writer(path: impl AsRef<Path>) -> Result<BufWriter<File>> {
    if let Some(parent) = path.as_ref().parent() {
        ensure_dir(parent)?;
    }
    let file = File::create(path.as_ref()).with_context(|| format!("create {}", path.as_ref().display()))?;
    Ok(BufWriter::new(file))
}

pub fn write_success_marker(dir: impl AsRef<Path>) -> Result<()> {
    let path = dir.as_ref().join(SUCCESS_MARKER);
    fs::write(&path, b"ok").with_context(|| format!("write {}", path.display()))
}

/// True when `dir` holds a fully written stage artifact.
pub fn is_committed(dir: impl AsRef<Path>) -> bool {
    dir.as_ref().join(SUCCESS_MARKER).is_file()
}
