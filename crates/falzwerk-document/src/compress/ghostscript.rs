// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ghostscript subprocess transformation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use falzwerk_core::error::{FalzwerkError, Result};
use falzwerk_core::types::CompressionMethod;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::{CompressionPlan, RasterTransform};

/// Budget for `gs --version`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const INPUT_NAME: &str = "input.pdf";
const OUTPUT_NAME: &str = "output.pdf";

/// Runs Ghostscript in a private scratch directory per call.
#[derive(Debug, Clone)]
pub struct GhostscriptTransform {
    binary: PathBuf,
}

impl Default for GhostscriptTransform {
    fn default() -> Self {
        Self::new("gs")
    }
}

impl GhostscriptTransform {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Version string reported by `gs --version`, or `None` when the binary
    /// is missing, fails, or does not answer in time.
    pub async fn version(&self) -> Option<String> {
        let probe = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Some(version)
            }
            Ok(Ok(output)) => {
                debug!(status = %output.status, "Ghostscript probe exited unsuccessfully");
                None
            }
            Ok(Err(err)) => {
                debug!(binary = %self.binary.display(), error = %err, "Ghostscript not runnable");
                None
            }
            Err(_) => {
                warn!(binary = %self.binary.display(), "Ghostscript probe timed out");
                None
            }
        }
    }

    pub async fn is_available(&self) -> bool {
        self.version().await.is_some()
    }
}

/// Command-line arguments for one run, excluding the binary itself.
pub(crate) fn arguments(plan: CompressionPlan, input: &Path, output: &Path) -> Vec<OsString> {
    let method = plan.method;
    let mut args: Vec<OsString> = Vec::with_capacity(16);

    if plan.rasterize {
        args.push("-sDEVICE=pdfimage24".into());
        args.push(format!("-r{}", method.dpi()).into());
        args.extend(["-dNOPAUSE", "-dQUIET", "-dBATCH"].map(OsString::from));
    } else {
        args.push("-sDEVICE=pdfwrite".into());
        args.push("-dCompatibilityLevel=1.4".into());
        args.push(format!("-dPDFSETTINGS=/{}", method.ghostscript_preset()).into());
        args.extend(
            [
                "-dNOPAUSE",
                "-dQUIET",
                "-dBATCH",
                "-dColorImageDownsampleType=/Bicubic",
                "-dGrayImageDownsampleType=/Bicubic",
                "-dMonoImageDownsampleType=/Bicubic",
            ]
            .map(OsString::from),
        );
        // The screen preset alone stops at 72 DPI.
        if method == CompressionMethod::Minimum {
            let dpi = method.dpi();
            for kind in ["Color", "Gray", "Mono"] {
                args.push(format!("-d{kind}ImageResolution={dpi}").into());
            }
            for kind in ["Color", "Gray", "Mono"] {
                args.push(format!("-dDownsample{kind}Images=true").into());
            }
        }
    }

    let mut output_arg = OsString::from("-sOutputFile=");
    output_arg.push(output);
    args.push(output_arg);
    args.push(input.as_os_str().to_os_string());
    args
}

impl RasterTransform for GhostscriptTransform {
    #[instrument(skip_all, fields(method = %plan.method, rasterize = plan.rasterize))]
    async fn transform(&self, input: &[u8], plan: CompressionPlan) -> Result<Vec<u8>> {
        // Removed when dropped, including when the caller times out.
        let workdir = tempfile::Builder::new().prefix("falzwerk-gs-").tempdir()?;
        let input_path = workdir.path().join(INPUT_NAME);
        let output_path = workdir.path().join(OUTPUT_NAME);
        tokio::fs::write(&input_path, input).await?;

        let output = Command::new(&self.binary)
            .args(arguments(plan, &input_path, &output_path))
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    FalzwerkError::ProcessingFailed(format!(
                        "Ghostscript is not installed ({} not found)",
                        self.binary.display()
                    ))
                } else {
                    FalzwerkError::ProcessingFailed(format!("failed to start Ghostscript: {}", err))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FalzwerkError::ProcessingFailed(format!(
                "Ghostscript failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        match tokio::fs::read(&output_path).await {
            Ok(bytes) => {
                debug!(output_bytes = bytes.len(), "Ghostscript finished");
                Ok(bytes)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(
                FalzwerkError::ProcessingFailed("compression output file was not created".to_string()),
            ),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn rendered(plan: CompressionPlan) -> Vec<String> {
        arguments(plan, Path::new("/tmp/in.pdf"), Path::new("/tmp/out.pdf"))
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn pdfwrite_uses_method_preset() {
        let args = rendered(CompressionPlan {
            method: CompressionMethod::Ebook,
            rasterize: false,
        });
        assert_eq!(args[0], "-sDEVICE=pdfwrite");
        assert!(args.contains(&"-dCompatibilityLevel=1.4".to_string()));
        assert!(args.contains(&"-dPDFSETTINGS=/ebook".to_string()));
        assert!(args.contains(&"-dGrayImageDownsampleType=/Bicubic".to_string()));
        assert!(!args.iter().any(|a| a.contains("ImageResolution")));
        assert_eq!(args[args.len() - 2], "-sOutputFile=/tmp/out.pdf");
        assert_eq!(args[args.len() - 1], "/tmp/in.pdf");
    }

    #[test]
    fn minimum_forces_36_dpi_downsampling() {
        let args = rendered(CompressionPlan {
            method: CompressionMethod::Minimum,
            rasterize: false,
        });
        assert!(args.contains(&"-dPDFSETTINGS=/screen".to_string()));
        for kind in ["Color", "Gray", "Mono"] {
            assert!(args.contains(&format!("-d{kind}ImageResolution=36")));
            assert!(args.contains(&format!("-dDownsample{kind}Images=true")));
        }
    }

    #[test]
    fn rasterize_switches_device_and_resolution() {
        let args = rendered(CompressionPlan {
            method: CompressionMethod::Printer,
            rasterize: true,
        });
        assert_eq!(args[0], "-sDEVICE=pdfimage24");
        assert_eq!(args[1], "-r300");
        assert!(!args.iter().any(|a| a.starts_with("-dPDFSETTINGS")));
    }

    #[tokio::test]
    async fn missing_binary_is_a_processing_failure() {
        let gs = GhostscriptTransform::new("/nonexistent/falzwerk-gs");
        assert!(!gs.is_available().await);
        assert!(gs.version().await.is_none());

        let err = gs
            .transform(
                b"%PDF-1.4",
                CompressionPlan {
                    method: CompressionMethod::Screen,
                    rasterize: false,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), falzwerk_core::ErrorKind::ProcessingFailed);
        assert!(err.to_string().contains("not installed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_ghostscript_is_killed_and_its_scratch_dir_removed() {
        use std::os::unix::fs::PermissionsExt;

        use falzwerk_core::config::EngineConfig;

        use crate::compress::Compressor;

        // Stands in for gs: records its working directory, then hangs.
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("workdir");
        let script = dir.path().join("gs");
        std::fs::write(
            &script,
            format!("#!/bin/sh\npwd > \"{}\"\nexec sleep 30\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = EngineConfig {
            compression_timeout_secs: 1,
            ..EngineConfig::default()
        };
        let compressor = Compressor::new(GhostscriptTransform::new(&script), &config);
        let started = std::time::Instant::now();
        let err = compressor
            .compress(&fixtures::numbered_pdf(1), CompressionMethod::Screen, false)
            .await
            .unwrap_err();
        assert!(matches!(err, FalzwerkError::Timeout { seconds: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));

        let workdir = std::fs::read_to_string(&marker).unwrap();
        let workdir = Path::new(workdir.trim());
        let name = workdir.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("falzwerk-gs-"), "unexpected workdir {name}");
        assert!(!workdir.exists());
    }

    #[tokio::test]
    async fn real_ghostscript_produces_a_pdf() {
        let gs = GhostscriptTransform::default();
        if !gs.is_available().await {
            eprintln!("Ghostscript not installed; skipping");
            return;
        }
        let output = gs
            .transform(
                &fixtures::numbered_pdf(2),
                CompressionPlan {
                    method: CompressionMethod::Screen,
                    rasterize: false,
                },
            )
            .await
            .unwrap();
        assert!(output.starts_with(b"%PDF-"));
    }
}
