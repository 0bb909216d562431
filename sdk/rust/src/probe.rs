//! Stream-file discovery for mounted DVD and Blu-ray layouts.

use std::io;
use std::path::{Path, PathBuf};

use crate::host::MediaProber;
use crate::types::ContainerKind;

/// Finds playable streams by walking the standard disc directory layout.
///
/// - DVD: `VIDEO_TS/VTS_<title>_<part>.VOB` with `part >= 1` (part 0 is the
///   title menu)
/// - Blu-ray: `BDMV/STREAM/*.m2ts`
///
/// Names are matched case-insensitively and returned sorted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscLayoutProber;

impl MediaProber for DiscLayoutProber {
    fn stream_files(&self, mount_point: &Path, kind: ContainerKind) -> io::Result<Vec<PathBuf>> {
        match kind {
            ContainerKind::PlainIso => Ok(Vec::new()),
            ContainerKind::DvdIso => {
                let dir = find_child_dir(mount_point, "VIDEO_TS")?;
                collect_sorted(&dir, is_title_vob)
            }
            ContainerKind::BlurayIso => {
                let bdmv = find_child_dir(mount_point, "BDMV")?;
                let stream = find_child_dir(&bdmv, "STREAM")?;
                collect_sorted(&stream, |name| has_extension(name, "m2ts"))
            }
        }
    }
}

/// ISO9660 media may present names in either case.
fn find_child_dir(parent: &Path, name: &str) -> io::Result<PathBuf> {
    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        if entry.file_type()?.is_dir()
            && entry.file_name().to_string_lossy().eq_ignore_ascii_case(name)
        {
            return Ok(entry.path());
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no {} directory under {}", name, parent.display()),
    ))
}

fn collect_sorted(dir: &Path, keep: impl Fn(&str) -> bool) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if keep(&entry.file_name().to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn is_title_vob(name: &str) -> bool {
    if !has_extension(name, "vob") {
        return false;
    }
    let stem = &name[..name.len() - 4];
    let mut parts = stem.split('_');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(title), Some(part), None) => {
            prefix.eq_ignore_ascii_case("VTS")
                && title.parse::<u32>().is_ok()
                && part.parse::<u32>().map(|p| p >= 1).unwrap_or(false)
        }
        _ => false,
    }
}
