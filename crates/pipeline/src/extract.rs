//! Archive extraction and image discovery.
//!
//! Pulls the image members out of a CBZ (ZIP) archive into the job's
//! temporary area, then scans that area and returns the discovered images in
//! natural sort order (digit runs compared numerically), which is the order
//! they will appear in the video.

use std::cmp::Ordering;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::ZipArchive;

/// Error type for extraction operations
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The archive could not be opened or read.
    #[error("invalid or corrupted archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The archive yielded no usable image files.
    #[error("no image files found in archive")]
    NoImages,

    /// IO error during extraction
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Checks if a file has one of the given extensions (case-insensitive,
/// extensions listed without a leading dot).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            extensions.iter().any(|e| e == &ext_lower)
        })
        .unwrap_or(false)
}

/// One piece of a natural sort key: either a digit run or a text run.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum NaturalPiece {
    Number(u128),
    Text(String),
}

fn natural_key(s: &str) -> Vec<NaturalPiece> {
    let mut pieces = Vec::new();
    let mut buf = String::new();
    let mut buf_digits = false;

    for ch in s.chars() {
        let digit = ch.is_ascii_digit();
        if !buf.is_empty() && digit != buf_digits {
            pieces.push(make_piece(&buf, buf_digits));
            buf.clear();
        }
        buf_digits = digit;
        buf.push(ch);
    }
    if !buf.is_empty() {
        pieces.push(make_piece(&buf, buf_digits));
    }
    pieces
}

fn make_piece(buf: &str, digits: bool) -> NaturalPiece {
    if digits {
        // Digit runs longer than a u128 fall back to text comparison.
        buf.parse::<u128>()
            .map(NaturalPiece::Number)
            .unwrap_or_else(|_| NaturalPiece::Text(buf.to_string()))
    } else {
        NaturalPiece::Text(buf.to_lowercase())
    }
}

/// Compare two strings naturally: digit runs numerically, text runs
/// case-insensitively. `page2` sorts before `page10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

/// Sort paths in place by natural order of their string form.
pub fn sort_natural(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
}

/// Extracts image files from a CBZ archive into `destination`, then scans the
/// destination and returns the discovered image paths in natural sort order.
///
/// Only archive members matching `image_extensions` are extracted; directory
/// entries and members with unsafe paths are skipped. Zero discovered images
/// is an error: the job cannot proceed without frames.
pub fn extract_archive(
    archive_path: &Path,
    destination: &Path,
    image_extensions: &[String],
) -> Result<Vec<PathBuf>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let relative = match entry.enclosed_name() {
            Some(name) => name,
            None => continue,
        };
        if !has_extension(&relative, image_extensions) {
            continue;
        }

        let out_path = destination.join(&relative);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)?;
    }

    let images = discover_images(destination, image_extensions);
    if images.is_empty() {
        return Err(ExtractError::NoImages);
    }
    Ok(images)
}

/// Recursively collect image files under `root`, naturally sorted.
pub fn discover_images(root: &Path, image_extensions: &[String]) -> Vec<PathBuf> {
    use walkdir::WalkDir;

    let mut images: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| has_extension(p, image_extensions))
        .collect();

    sort_natural(&mut images);
    images
}
