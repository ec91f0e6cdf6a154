use crate::io::{read_bin_line, RECORD_HEADER_LEN};
use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Clone, Debug, Default)]
pub struct SortOutcome {
    pub lines_in: u64,
    pub bytes_in: u64,
    pub sort_only_ms: u64,
    pub io_read_ms: u64,
    pub io_write_ms: u64,
}

// Given a set of spill files, produce a single run sorted by raw key bytes at out_path.
// Records with equal keys end up adjacent, which is all the reduce phase relies on.
pub fn external_sort_by_key(input_paths: &[PathBuf], out_path: &Path) -> Result<SortOutcome> {
    // Mmap each input file and build record index: (file_idx, start, key_end, end)
    let mut file_maps: Vec<Mmap> = Vec::new();
    let mut all_records: Vec<(usize, usize, usize, usize)> = Vec::new();
    let mut bytes_in: u64 = 0;
    let mut lines_in: u64 = 0;
    let mut io_read = Duration::from_nanos(0);

    for p in input_paths {
        let file = File::open(p).with_context(|| format!("open {}", p.display()))?;
        let len = file.metadata().with_context(|| format!("stat {}", p.display()))?.len();
        if len == 0 {
            continue;
        }
        bytes_in += len;
        let read_start = Instant::now();
        let map = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", p.display()))?;
        let file_idx = file_maps.len();
        let bytes = &map[..];
        let mut off = 0usize;
        while let Some((k, _v, next)) = read_bin_line(bytes, off) {
            let key_end = off + RECORD_HEADER_LEN + k.len();
            all_records.push((file_idx, off, key_end, next));
            lines_in += 1;
            off = next;
        }
        if off != bytes.len() {
            bail!("truncated spill record in {} at byte {}", p.display(), off);
        }
        file_maps.push(map);
        io_read += read_start.elapsed();
    }

    let sort_only_start = Instant::now();
    all_records.par_sort_by(|a, b| {
        let (fia, sa, ka, _ea) = *a;
        let (fib, sb, kb, _eb) = *b;
        // Keys are at [s+8..k] because [s..s+8) holds the lengths
        file_maps[fia][(sa + RECORD_HEADER_LEN)..ka].cmp(&file_maps[fib][(sb + RECORD_HEADER_LEN)..kb])
    });
    let sort_only_ms = sort_only_start.elapsed().as_millis() as u64;

    let io_write_start = Instant::now();
    let file = File::create(out_path).with_context(|| format!("create {}", out_path.display()))?;
    let mut w = BufWriter::with_capacity(8 * 1024 * 1024, file);
    for &(fi, s, _k, e) in &all_records {
        w.write_all(&file_maps[fi][s..e]).with_context(|| format!("write {}", out_path.display()))?;
    }
    w.flush().with_context(|| format!("flush {}", out_path.display()))?;
    let io_write_ms = io_write_start.elapsed().as_millis() as u64;

    Ok(SortOutcome { lines_in, bytes_in, sort_only_ms, io_read_ms: io_read.as_millis() as u64, io_write_ms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_bin;

    #[test]
    fn equal_keys_become_adjacent_across_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = Vec::new();
        write_bin(&mut a, b"b", b"1");
        write_bin(&mut a, b"a", b"2");
        let mut b = Vec::new();
        write_bin(&mut b, b"b", b"3");
        write_bin(&mut b, b"c", b"4");
        let pa = dir.path().join("a.bin");
        let pb = dir.path().join("b.bin");
        let empty = dir.path().join("empty.bin");
        std::fs::write(&pa, a).unwrap();
        std::fs::write(&pb, b).unwrap();
        std::fs::write(&empty, b"").unwrap();

        let out = dir.path().join("sorted.bin");
        let outcome = external_sort_by_key(&[pa, pb, empty], &out).unwrap();
        assert_eq!(outcome.lines_in, 4);

        let bytes = std::fs::read(&out).unwrap();
        let mut keys = Vec::new();
        let mut off = 0;
        while let Some((k, _, next)) = read_bin_line(&bytes, off) {
            keys.push(k.to_vec());
            off = next;
        }
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn truncated_spill_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = Vec::new();
        write_bin(&mut a, b"key", b"value");
        a.truncate(a.len() - 2);
        let pa = dir.path().join("a.bin");
        std::fs::write(&pa, a).unwrap();
        assert!(external_sort_by_key(&[pa], &dir.path().join("out.bin")).is_err());
    }
}
