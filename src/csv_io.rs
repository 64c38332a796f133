//! Memory-mapped CSV snapshot I/O (§4.2, §6).
//!
//! Reads use a shared `Mmap` so concurrent range reads never contend on a
//! file descriptor's seek position. Writes go through a small append path
//! (for staged inserts) and a rewrite-to-temp-then-rename path (for staged
//! deletes), mirroring `GeoTools::modifyCSV`.

use crate::error::{GeoError, GeoResult};
use crate::model::{GeoObject, Kind};
use memmap2::Mmap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Grammar per §6: `id,kind,coords` with `coords` itself containing commas,
/// so the row is split on only the first two commas.
fn parse_row(line: &str) -> Option<GeoObject> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }
    let mut parts = line.splitn(3, ',');
    let id_str = parts.next()?;
    let kind_str = parts.next()?;
    let coord_str = parts.next().unwrap_or("");

    let id: u64 = id_str.trim().parse().ok()?;
    let kind: Kind = kind_str.trim().parse().ok()?;
    let (coords, warnings) = crate::coord::parse_coords(coord_str);
    for w in warnings {
        log::warn!("row {id}: {w}");
    }
    Some(GeoObject::new(id, kind, coords))
}

fn mmap_readonly(path: &Path) -> GeoResult<Mmap> {
    let file = File::open(path).map_err(|e| GeoError::BadSnapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    unsafe { Mmap::map(&file) }.map_err(|e| GeoError::BadSnapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Reads rows `[start_line, end_line)` (0-indexed, header-exclusive) out of
/// the CSV at `path` via a shared mmap, so concurrent callers never block
/// each other (§4.2).
pub fn read_range(path: &Path, start_line: usize, end_line: usize) -> GeoResult<Vec<GeoObject>> {
    let mmap = mmap_readonly(path)?;
    let text = std::str::from_utf8(&mmap).map_err(|e| GeoError::BadSnapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut objs = Vec::new();
    for (i, line) in text.lines().skip(1).enumerate() {
        if i < start_line {
            continue;
        }
        if i >= end_line {
            break;
        }
        match parse_row(line) {
            Some(obj) => objs.push(obj),
            None => log::warn!("skipping malformed row at line {}", i + 2),
        }
    }
    Ok(objs)
}

/// Counts data rows (excluding the header), for partitioning a parallel
/// load across workers.
pub fn count_lines(path: &Path) -> GeoResult<usize> {
    let mmap = mmap_readonly(path)?;
    let text = std::str::from_utf8(&mmap).map_err(|e| GeoError::BadSnapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(text.lines().count().saturating_sub(1))
}

/// Seeds the next-id counter from the last data row's leading id (§4.2, §9:
/// `next_id` is read exactly once at startup, never rescanned afterward).
pub fn get_init_id(path: &Path) -> GeoResult<u64> {
    let mmap = mmap_readonly(path)?;
    let text = std::str::from_utf8(&mmap).map_err(|e| GeoError::BadSnapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let last_data_line = text.lines().skip(1).filter(|l| !l.trim().is_empty()).last();
    match last_data_line {
        None => Err(GeoError::BadSnapshot {
            path: path.to_path_buf(),
            reason: "snapshot has no data rows".to_string(),
        }),
        Some(line) => {
            let id_str = line.split(',').next().ok_or_else(|| GeoError::BadSnapshot {
                path: path.to_path_buf(),
                reason: "last line has no fields".to_string(),
            })?;
            id_str.trim().parse::<u64>().map_err(|_| GeoError::BadSnapshot {
                path: path.to_path_buf(),
                reason: format!("last line id {id_str:?} did not parse as an integer"),
            })
        }
    }
}

/// Appends staged inserts, id-sorted, to the CSV (reconciler tick, §4.5).
pub fn append_rows(path: &Path, objs: &[GeoObject]) -> GeoResult<()> {
    if objs.is_empty() {
        return Ok(());
    }
    let mut file = OpenOptions::new().append(true).open(path)?;
    for obj in objs {
        writeln!(
            file,
            "{},{},\"{}\"",
            obj.id,
            obj.kind,
            crate::coord::format_coords(&obj.coords)
        )?;
    }
    file.flush()?;
    Ok(())
}

/// Rewrites the CSV to a temp file dropping rows whose id is in
/// `delete_ids`, then atomically renames it over the original (§4.5).
pub fn rewrite_dropping(path: &Path, delete_ids: &rustc_hash::FxHashSet<u64>) -> GeoResult<()> {
    if delete_ids.is_empty() {
        return Ok(());
    }

    let mmap = mmap_readonly(path)?;
    let text = std::str::from_utf8(&mmap).map_err(|e| GeoError::BadSnapshot {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let tmp_path = path.with_extension("csv.tmp");
    let mut tmp = File::create(&tmp_path)?;

    for (i, line) in text.lines().enumerate() {
        if i == 0 {
            writeln!(tmp, "{line}")?;
            continue;
        }
        let keep = match line.split(',').next().and_then(|s| s.trim().parse::<u64>().ok()) {
            Some(id) => !delete_ids.contains(&id),
            None => true,
        };
        if keep {
            writeln!(tmp, "{line}")?;
        }
    }
    tmp.flush()?;
    drop(tmp);

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
