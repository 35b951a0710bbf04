use std::path::{Path, PathBuf};
use std::time::Duration;
use log::info;
use tokio::process::Command;
use crate::errors::ExtractionError;
use crate::file_utils::FileManager;

// @module: Source separation boundary (opaque external model service)

/// Separation can take a long while on CPU
const SEPARATION_TIMEOUT: Duration = Duration::from_secs(1800);

/// Paths to the two separated stems
#[derive(Debug, Clone)]
pub struct SeparatedPaths {
    /// Vocal stem
    pub vocals: PathBuf,
    /// Everything that is not vocals (the mixing bed)
    pub accompaniment: PathBuf,
}

/// Separate vocals from accompaniment by invoking demucs as a subprocess.
///
/// The model is an external collaborator; this boundary only owns the
/// invocation and the expected output layout.
pub async fn separate_vocals<P: AsRef<Path>>(
    audio_path: P,
    output_dir: P,
    model: &str,
    device: &str,
) -> Result<SeparatedPaths, ExtractionError> {
    let audio_path = audio_path.as_ref();
    let output_dir = output_dir.as_ref();
    FileManager::ensure_dir(output_dir)
        .map_err(|e| ExtractionError::FfmpegFailed(e.to_string()))?;

    info!(
        "Separating vocals: {} (model: {})",
        audio_path.display(),
        model
    );

    let demucs_future = Command::new("python3")
        .args([
            "-m", "demucs",
            "--two-stems", "vocals",
            "-n", model,
            "--device", device,
            "-o", output_dir.to_str().unwrap_or_default(),
            audio_path.to_str().unwrap_or_default(),
        ])
        .output();

    let result = tokio::select! {
        result = demucs_future => {
            result.map_err(|e| ExtractionError::FfmpegFailed(format!("failed to execute demucs: {}", e)))?
        },
        _ = tokio::time::sleep(SEPARATION_TIMEOUT) => {
            return Err(ExtractionError::Timeout("demucs".to_string()));
        }
    };

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(ExtractionError::FfmpegFailed(format!(
            "demucs separation failed: {}",
            stderr
        )));
    }

    let stem = audio_path.file_stem().unwrap_or_default().to_string_lossy();
    let paths = locate_stems(output_dir, model, stem.as_ref())?;

    info!("Vocal separation complete");
    Ok(paths)
}

/// Resolve the two stem paths under the model output layout and verify both
/// exist. Either stem missing is fatal at this boundary.
pub fn locate_stems(
    output_dir: &Path,
    model: &str,
    track_stem: &str,
) -> Result<SeparatedPaths, ExtractionError> {
    let base = output_dir.join(model).join(track_stem);
    let vocals = base.join("vocals.wav");
    let accompaniment = base.join("no_vocals.wav");

    for (stem_name, path) in [("vocals", &vocals), ("accompaniment", &accompaniment)] {
        if !path.exists() {
            return Err(ExtractionError::FfmpegFailed(format!(
                "expected {} output not found: {}",
                stem_name,
                path.display()
            )));
        }
    }

    Ok(SeparatedPaths {
        vocals,
        accompaniment,
    })
}
