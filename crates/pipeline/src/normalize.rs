//! Normalizer pool.
//!
//! Rewrites every Pending image into a clean, compatible form by running
//! ImageMagick's resave (`magick <src> +profile * <tmp>`) and atomically
//! renaming the result over the original. Normalization is idempotent:
//! resaving an already-resaved image produces an equivalent file.

use crate::imageset::{ImageSet, ImageState};
use crate::pool::{run_stage, StageOutcome};
use crate::startup::NormalizeSupport;
use crate::tools::{ToolInvocation, ToolRunner};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Build the ImageMagick resave invocation for one image.
///
/// `+profile *` strips all embedded profiles during the rewrite.
pub fn build_normalize_invocation(source: &Path, destination: &Path) -> ToolInvocation {
    ToolInvocation::new("magick")
        .arg_path(source)
        .arg("+profile")
        .arg("*")
        .arg_path(destination)
}

/// Temp sibling used as the resave target before the atomic rename.
/// Keeps the original extension so the rewrite preserves the format.
fn resave_temp_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let name = match source.extension() {
        Some(ext) => format!("{}.norm.{}", stem, ext.to_string_lossy()),
        None => format!("{}.norm", stem),
    };
    source.with_file_name(name)
}

/// Resave one image in place. On success the original path holds the
/// normalized file; on failure the original is left untouched.
async fn normalize_one(runner: &dyn ToolRunner, source: &Path) -> Result<(), String> {
    let temp = resave_temp_path(source);
    let invocation = build_normalize_invocation(source, &temp);

    let output = runner
        .run(&invocation)
        .await
        .map_err(|e| format!("failed to run magick: {}", e))?;

    if !output.status.success() {
        let _ = std::fs::remove_file(&temp);
        return Err(format!(
            "magick exited with {:?}: {}",
            output.status.code(),
            output.stderr.trim()
        ));
    }

    // A zero exit without a usable output file is still a failed rewrite.
    match std::fs::metadata(&temp) {
        Ok(meta) if meta.len() > 0 => {}
        _ => {
            let _ = std::fs::remove_file(&temp);
            return Err("magick produced no output file".to_string());
        }
    }

    // Write-then-rename keeps the replacement atomic within the temp area.
    std::fs::rename(&temp, source).map_err(|e| {
        let _ = std::fs::remove_file(&temp);
        format!("failed to replace original: {}", e)
    })
}

/// Run the normalizer pool over all Pending records.
///
/// Each record is processed independently; a per-image failure marks only
/// that record Failed and the rest continue. When ImageMagick is unavailable
/// the stage passes records through untouched and the verifier remains the
/// decodability gate. Returns the number of Normalized records.
pub async fn run_normalizer_pool(
    runner: Arc<dyn ToolRunner>,
    images: &mut ImageSet,
    pool_size: u32,
    support: NormalizeSupport,
) -> usize {
    let items = images.items_in(ImageState::Pending);

    if support == NormalizeSupport::Unavailable {
        warn!("ImageMagick not available; skipping image normalization");
        for (index, _) in items {
            images.mark_normalized(index);
        }
        return images.count_in(ImageState::Normalized);
    }

    let outcomes = run_stage(items, pool_size, |_, path| {
        let runner = runner.clone();
        async move { normalize_one(runner.as_ref(), &path).await }
    })
    .await;

    apply_outcomes(images, outcomes);
    images.count_in(ImageState::Normalized)
}

fn apply_outcomes(images: &mut ImageSet, outcomes: Vec<StageOutcome>) {
    for outcome in outcomes {
        match outcome.result {
            Ok(()) => {
                images.mark_normalized(outcome.index);
            }
            Err(detail) => {
                warn!(index = outcome.index, detail = %detail, "image failed normalization");
                images.mark_failed(outcome.index, detail);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{failed_output, ok_output, ScriptedRunner};
    use tempfile::TempDir;

    /// Runner that plays the part of a working magick: writes a resaved file
    /// at the destination argument.
    fn working_magick() -> ScriptedRunner {
        ScriptedRunner::new(|invocation| {
            let destination = invocation.args.last().expect("magick has a destination");
            std::fs::write(destination, b"resaved image bytes")?;
            Ok(ok_output())
        })
    }

    fn populate(dir: &TempDir, n: usize) -> ImageSet {
        let paths: Vec<_> = (0..n)
            .map(|i| {
                let path = dir.path().join(format!("page{:02}.png", i));
                std::fs::write(&path, format!("original {}", i)).unwrap();
                path
            })
            .collect();
        ImageSet::from_paths(paths)
    }

    #[test]
    fn test_normalize_invocation_args() {
        let invocation =
            build_normalize_invocation(Path::new("/tmp/a.png"), Path::new("/tmp/a.norm.png"));
        assert_eq!(invocation.program, "magick");
        assert_eq!(
            invocation.args,
            vec!["/tmp/a.png", "+profile", "*", "/tmp/a.norm.png"]
        );
    }

    #[test]
    fn test_resave_temp_path_keeps_extension() {
        assert_eq!(
            resave_temp_path(Path::new("/tmp/job/page01.webp")),
            PathBuf::from("/tmp/job/page01.norm.webp")
        );
        assert_eq!(
            resave_temp_path(Path::new("/tmp/job/noext")),
            PathBuf::from("/tmp/job/noext.norm")
        );
    }

    #[tokio::test]
    async fn test_pool_normalizes_all_records() {
        let dir = TempDir::new().unwrap();
        let mut images = populate(&dir, 5);
        let runner = Arc::new(working_magick());

        let normalized = run_normalizer_pool(
            runner.clone(),
            &mut images,
            4,
            NormalizeSupport::Available,
        )
        .await;

        assert_eq!(normalized, 5);
        assert_eq!(images.count_in(ImageState::Normalized), 5);

        // The originals were replaced with the resaved content.
        for record in images.records() {
            let content = std::fs::read(&record.source_path).unwrap();
            assert_eq!(content, b"resaved image bytes");
        }
        // No temp siblings left behind.
        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".norm."))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_per_image_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let mut images = populate(&dir, 4);

        // page01 fails; everything else resaves fine.
        let runner = Arc::new(ScriptedRunner::new(|invocation| {
            if invocation.args[0].contains("page01") {
                return Ok(failed_output(1, "corrupt profile data"));
            }
            let destination = invocation.args.last().unwrap();
            std::fs::write(destination, b"resaved")?;
            Ok(ok_output())
        }));

        let normalized =
            run_normalizer_pool(runner, &mut images, 2, NormalizeSupport::Available).await;

        assert_eq!(normalized, 3);
        assert_eq!(images.count_in(ImageState::Failed), 1);
        let failed = images.record(1).unwrap();
        assert_eq!(failed.state, ImageState::Failed);
        assert!(failed
            .error
            .as_deref()
            .unwrap()
            .contains("corrupt profile data"));

        // The failed original is untouched.
        let content = std::fs::read(&failed.source_path).unwrap();
        assert_eq!(content, b"original 1");
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_file_fails_record() {
        let dir = TempDir::new().unwrap();
        let mut images = populate(&dir, 1);

        // Claims success but never writes the destination.
        let runner = Arc::new(ScriptedRunner::new(|_| Ok(ok_output())));

        let normalized =
            run_normalizer_pool(runner, &mut images, 1, NormalizeSupport::Available).await;

        assert_eq!(normalized, 0);
        assert!(images
            .record(0)
            .unwrap()
            .error
            .as_deref()
            .unwrap()
            .contains("no output file"));
    }

    #[tokio::test]
    async fn test_unavailable_magick_passes_records_through() {
        let dir = TempDir::new().unwrap();
        let mut images = populate(&dir, 3);
        let runner = Arc::new(ScriptedRunner::always_ok());

        let normalized = run_normalizer_pool(
            runner.clone(),
            &mut images,
            2,
            NormalizeSupport::Unavailable,
        )
        .await;

        assert_eq!(normalized, 3);
        // No magick invocations happened.
        assert!(runner.invocations().is_empty());
        // Content untouched.
        let content = std::fs::read(&images.record(0).unwrap().source_path).unwrap();
        assert_eq!(content, b"original 0");
    }

    #[tokio::test]
    async fn test_normalization_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"original").unwrap();
        let runner = working_magick();

        normalize_one(&runner, &path).await.unwrap();
        let first = std::fs::read(&path).unwrap();

        // A second resave of the already-normalized file succeeds and yields
        // an equivalent result.
        normalize_one(&runner, &path).await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }
}
