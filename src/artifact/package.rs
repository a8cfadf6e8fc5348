//! Artifact serialization and post-return cleanup.
//!
//! Inline mode base64-encodes the bytes straight into the envelope.
//! Reference mode PUTs each file to the configured storage URL and
//! returns the target location instead.
//!
//! Cleanup runs after packaging and is deliberately conservative: the
//! output directory is shared across invocations, so only files with a
//! recognized media extension are touched, and only when their resolved
//! path stays inside the canonicalized output root.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use tracing::{debug, warn};

use crate::artifact::{ArtifactDescriptor, ArtifactKind, Encoding, SerializedArtifact};
use crate::config::{Config, ReturnMode};
use crate::error::{FerryError, Result};
use crate::util::UPLOAD_TIMEOUT;

/// Serialize every descriptor according to the configured return mode.
pub async fn package(
    descriptors: &[ArtifactDescriptor],
    config: &Config,
) -> Result<Vec<SerializedArtifact>> {
    match config.return_mode {
        ReturnMode::Inline => package_inline(descriptors, config).await,
        ReturnMode::Reference => package_reference(descriptors, config).await,
    }
}

async fn package_inline(
    descriptors: &[ArtifactDescriptor],
    config: &Config,
) -> Result<Vec<SerializedArtifact>> {
    let mut packaged = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let path = config.output_dir.join(descriptor.relative_path());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FerryError::ArtifactRead {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        packaged.push(SerializedArtifact {
            filename: descriptor.filename.clone(),
            kind: descriptor.kind,
            encoding: Encoding::Inline,
            payload: STANDARD.encode(&bytes),
        });
    }
    Ok(packaged)
}

async fn package_reference(
    descriptors: &[ArtifactDescriptor],
    config: &Config,
) -> Result<Vec<SerializedArtifact>> {
    let base = config
        .upload_url
        .as_deref()
        .ok_or_else(|| FerryError::Config {
            reason: "FERRY_UPLOAD_URL must be set when FERRY_RETURN_MODE=reference".to_string(),
        })?;

    let client = Client::builder()
        .timeout(UPLOAD_TIMEOUT)
        .build()
        .map_err(|e| FerryError::Config {
            reason: format!("failed to build HTTP client: {e}"),
        })?;

    let mut packaged = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let path = config.output_dir.join(descriptor.relative_path());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| FerryError::ArtifactRead {
                path: path.to_string(),
                detail: e.to_string(),
            })?;

        let target = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            descriptor.relative_path()
        );
        let response = client
            .put(&target)
            .body(bytes)
            .send()
            .await
            .map_err(|e| FerryError::ArtifactUpload {
                filename: descriptor.filename.clone(),
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FerryError::ArtifactUpload {
                filename: descriptor.filename.clone(),
                detail: format!("upload target returned {}", response.status()),
            });
        }

        debug!(filename = %descriptor.filename, target = %target, "artifact uploaded");
        packaged.push(SerializedArtifact {
            filename: descriptor.filename.clone(),
            kind: descriptor.kind,
            encoding: Encoding::Reference,
            payload: target,
        });
    }
    Ok(packaged)
}

/// Delete this invocation's packaged artifacts from the output directory.
///
/// Returns the number of files removed. Never fails: every skip or
/// failure is logged and counted out, since a cleanup problem must not
/// fail a job whose results are already serialized.
pub fn cleanup_outputs(descriptors: &[ArtifactDescriptor], config: &Config) -> usize {
    if config.retain_outputs {
        debug!("output retention enabled, skipping cleanup");
        return 0;
    }

    let root = match config.output_dir.canonicalize_utf8() {
        Ok(root) => root,
        Err(e) => {
            warn!(error = %e, dir = %config.output_dir, "cannot resolve output root, skipping cleanup");
            return 0;
        }
    };

    let mut removed = 0;
    for descriptor in descriptors {
        // Unrecognized extensions are never ours to delete.
        if descriptor.kind == ArtifactKind::Other {
            debug!(filename = %descriptor.filename, "leaving unrecognized file in place");
            continue;
        }

        let path = config.output_dir.join(descriptor.relative_path());
        let resolved = match path.canonicalize_utf8() {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(error = %e, path = %path, "artifact already gone");
                continue;
            }
        };

        if !resolved.starts_with(&root) {
            warn!(path = %resolved, "refusing to delete outside the output root");
            continue;
        }

        match std::fs::remove_file(&resolved) {
            Ok(()) => removed += 1,
            Err(e) => warn!(error = %e, path = %resolved, "artifact cleanup failed"),
        }
    }

    if removed > 0 {
        debug!(removed, "transient artifacts cleaned up");
    }
    removed
}
