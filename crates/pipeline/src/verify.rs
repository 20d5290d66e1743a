//! Verifier pool.
//!
//! Decode-checks every Normalized image with a dry-run ffmpeg invocation.
//! Normalization alone does not guarantee downstream decodability; this stage
//! catches files that look fine on disk but are structurally invalid for the
//! encode step.

use crate::imageset::{ImageSet, ImageState};
use crate::pool::run_stage;
use crate::tools::{ToolInvocation, ToolRunner};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Build the decode-check invocation for one image.
///
/// The dummy scale filter forces a real decode; `-f null -` discards the
/// output.
pub fn build_verify_invocation(image: &Path) -> ToolInvocation {
    ToolInvocation::new("ffmpeg")
        .arg("-v")
        .arg("error")
        .arg("-i")
        .arg_path(image)
        .arg("-vf")
        .arg("scale=1:1")
        .arg("-f")
        .arg("null")
        .arg("-")
}

async fn verify_one(runner: &dyn ToolRunner, image: &Path) -> Result<(), String> {
    let output = runner
        .run(&build_verify_invocation(image))
        .await
        .map_err(|e| format!("failed to run ffmpeg: {}", e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "ffmpeg exited with {:?}: {}",
            output.status.code(),
            output.stderr.trim()
        ))
    }
}

/// Run the verifier pool over all Normalized records.
///
/// Same per-item independence as the normalizer: a failing decode marks only
/// that record Failed with the tool's error text. Returns the number of
/// Verified records.
pub async fn run_verifier_pool(
    runner: Arc<dyn ToolRunner>,
    images: &mut ImageSet,
    pool_size: u32,
) -> usize {
    let items = images.items_in(ImageState::Normalized);

    let outcomes = run_stage(items, pool_size, |_, path| {
        let runner = runner.clone();
        async move { verify_one(runner.as_ref(), &path).await }
    })
    .await;

    for outcome in outcomes {
        match outcome.result {
            Ok(()) => {
                images.mark_verified(outcome.index);
            }
            Err(detail) => {
                warn!(index = outcome.index, detail = %detail, "image failed verification");
                images.mark_failed(outcome.index, detail);
            }
        }
    }

    images.count_in(ImageState::Verified)
}
