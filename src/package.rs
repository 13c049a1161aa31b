//! Package writer
//!
//! Produces `<package>.lpk`, a zip holding `manifest.yml`, `icon.png` and,
//! when any volume ships host files, `content.tar`. Everything is staged
//! in a scratch directory next to the output and the package is written
//! under a `.partial` name first; the scratch directory and any partial
//! file are removed whether packaging succeeds or not.

use crate::error::{DtlError, DtlResult};
use crate::manifest::{Manifest, MANIFEST_FILE_NAME};
use crate::resolve::volume::ContentPlan;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Package file extension
pub const PACKAGE_EXTENSION: &str = "lpk";
pub const ICON_FILE_NAME: &str = "icon.png";
pub const CONTENT_FILE_NAME: &str = "content.tar";

/// Everything that goes into a package
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub manifest: Manifest,
    pub icon: PathBuf,
    pub content: ContentPlan,
    pub output_dir: PathBuf,
}

/// A written package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutput {
    pub path: PathBuf,
    pub sha256: String,
    pub size: u64,
}

/// Removes its paths when dropped
struct CleanupGuard {
    paths: Vec<PathBuf>,
}

impl CleanupGuard {
    fn new() -> Self {
        Self { paths: Vec::new() }
    }

    fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        for path in self.paths.iter().rev() {
            let result = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else {
                std::fs::remove_file(path)
            };
            match result {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

/// Write the package. Runs the archive work on the blocking pool.
pub async fn write_package(request: PackageRequest) -> DtlResult<PackageOutput> {
    tokio::task::spawn_blocking(move || write_package_blocking(&request))
        .await
        .map_err(|e| DtlError::Internal(format!("packaging task failed: {e}")))?
}

fn write_package_blocking(request: &PackageRequest) -> DtlResult<PackageOutput> {
    let mut guard = CleanupGuard::new();

    std::fs::create_dir_all(&request.output_dir).map_err(|e| {
        DtlError::io(
            format!("creating output directory {}", request.output_dir.display()),
            e,
        )
    })?;

    let staging = request
        .output_dir
        .join(format!(".lzc-dtl-staging-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir(&staging)
        .map_err(|e| DtlError::io(format!("creating {}", staging.display()), e))?;
    guard.track(&staging);

    let manifest_path = staging.join(MANIFEST_FILE_NAME);
    std::fs::write(&manifest_path, request.manifest.to_yaml()?)
        .map_err(|e| DtlError::io(format!("writing {}", manifest_path.display()), e))?;

    let icon_path = staging.join(ICON_FILE_NAME);
    std::fs::copy(&request.icon, &icon_path)
        .map_err(|e| DtlError::io(format!("copying icon {}", request.icon.display()), e))?;

    let mut members = vec![
        (MANIFEST_FILE_NAME, manifest_path),
        (ICON_FILE_NAME, icon_path),
    ];

    if !request.content.is_empty() {
        let content_path = staging.join(CONTENT_FILE_NAME);
        write_content_archive(&request.content, &content_path)?;
        members.push((CONTENT_FILE_NAME, content_path));
    }

    let file_name = format!("{}.{}", request.manifest.package, PACKAGE_EXTENSION);
    let final_path = request.output_dir.join(&file_name);
    let partial_path = request.output_dir.join(format!("{file_name}.partial"));
    guard.track(&partial_path);

    write_zip(&members, &partial_path)?;
    std::fs::rename(&partial_path, &final_path)
        .map_err(|e| DtlError::io(format!("moving package to {}", final_path.display()), e))?;

    let (sha256, size) = sha256_file(&final_path)?;
    info!("Wrote {} ({} bytes)", final_path.display(), size);

    Ok(PackageOutput {
        path: final_path,
        sha256,
        size,
    })
}

/// Tar every content entry under its archive path, in sorted walk order
fn write_content_archive(content: &ContentPlan, path: &Path) -> DtlResult<()> {
    let file = File::create(path).map_err(|e| DtlError::io(format!("creating {}", path.display()), e))?;
    let mut builder = tar::Builder::new(BufWriter::new(file));
    builder.mode(tar::HeaderMode::Deterministic);

    for entry in content.entries() {
        let io_err = |e: std::io::Error| {
            DtlError::io(format!("packaging {}", entry.source.display()), e)
        };

        if entry.source.is_file() {
            builder
                .append_path_with_name(&entry.source, &entry.relative_path)
                .map_err(io_err)?;
            continue;
        }

        for item in WalkDir::new(&entry.source).sort_by_file_name() {
            let item = item.map_err(|e| {
                DtlError::io(
                    format!("walking {}", entry.source.display()),
                    std::io::Error::other(e),
                )
            })?;
            let relative = item
                .path()
                .strip_prefix(&entry.source)
                .map_err(|e| DtlError::Internal(e.to_string()))?;
            let name = Path::new(&entry.relative_path).join(relative);

            if item.file_type().is_dir() {
                builder.append_dir(&name, item.path()).map_err(io_err)?;
            } else {
                builder
                    .append_path_with_name(item.path(), &name)
                    .map_err(io_err)?;
            }
        }
    }

    let mut writer = builder
        .into_inner()
        .map_err(|e| DtlError::io(format!("finishing {}", path.display()), e))?;
    writer
        .flush()
        .map_err(|e| DtlError::io(format!("finishing {}", path.display()), e))?;
    Ok(())
}

fn write_zip(members: &[(&str, PathBuf)], path: &Path) -> DtlResult<()> {
    let file = File::create(path).map_err(|e| DtlError::io(format!("creating {}", path.display()), e))?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for (name, source) in members {
        zip.start_file(*name, options)?;
        let mut input = File::open(source)
            .map_err(|e| DtlError::io(format!("reading {}", source.display()), e))?;
        std::io::copy(&mut input, &mut zip)
            .map_err(|e| DtlError::io(format!("adding {name} to package"), e))?;
    }

    let mut writer = zip.finish()?;
    writer
        .flush()
        .map_err(|e| DtlError::io(format!("finishing {}", path.display()), e))?;
    Ok(())
}

fn sha256_file(path: &Path) -> DtlResult<(String, u64)> {
    let mut file = File::open(path).map_err(|e| DtlError::io(format!("reading {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| DtlError::io(format!("reading {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AppAnswers;
    use crate::resolve::route::RouteTable;
    use crate::resolve::volume::ContentEntry;
    use tempfile::TempDir;

    fn manifest() -> Manifest {
        let app = AppAnswers {
            name: "Demo".to_string(),
            package: "com.acme.demo".to_string(),
            version: "0.0.1".to_string(),
            description: String::new(),
            homepage: String::new(),
            author: String::new(),
            subdomain: "demo".to_string(),
            background_task: false,
            multi_instance: false,
            gpu_accel: false,
            kvm_accel: false,
            usb_accel: false,
            public_path: vec!["/".to_string()],
            file_handler: None,
        };
        Manifest::assemble(&app, &[], &RouteTable::new())
    }

    fn zip_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[tokio::test]
    async fn package_without_content() {
        let temp = TempDir::new().unwrap();
        let icon = temp.path().join("logo.png");
        std::fs::write(&icon, b"png").unwrap();
        let out = temp.path().join("dist");

        let output = write_package(PackageRequest {
            manifest: manifest(),
            icon,
            content: ContentPlan::new(),
            output_dir: out.clone(),
        })
        .await
        .unwrap();

        assert_eq!(output.path, out.join("com.acme.demo.lpk"));
        assert_eq!(output.sha256.len(), 64);
        let mut names = zip_names(&output.path);
        names.sort();
        assert_eq!(names, vec!["icon.png", "manifest.yml"]);

        // Only the package is left behind
        let left: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(left.len(), 1);
    }

    #[tokio::test]
    async fn content_is_tarred_under_its_archive_path() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data");
        std::fs::create_dir_all(data.join("nested")).unwrap();
        std::fs::write(data.join("a.txt"), b"a").unwrap();
        std::fs::write(data.join("nested").join("b.txt"), b"b").unwrap();
        let icon = temp.path().join("logo.png");
        std::fs::write(&icon, b"png").unwrap();

        let mut content = ContentPlan::new();
        content
            .add(&ContentEntry {
                relative_path: "data".to_string(),
                source: data,
            })
            .unwrap();

        let output = write_package(PackageRequest {
            manifest: manifest(),
            icon,
            content,
            output_dir: temp.path().join("dist"),
        })
        .await
        .unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&output.path).unwrap()).unwrap();
        let mut tar_bytes = Vec::new();
        archive
            .by_name(CONTENT_FILE_NAME)
            .unwrap()
            .read_to_end(&mut tar_bytes)
            .unwrap();

        let mut tar = tar::Archive::new(tar_bytes.as_slice());
        let paths: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .map(|p| p.trim_end_matches('/').to_string())
            .collect();
        assert_eq!(paths, vec!["data", "data/a.txt", "data/nested", "data/nested/b.txt"]);
    }

    #[tokio::test]
    async fn failure_leaves_no_artifacts() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");

        let err = write_package(PackageRequest {
            manifest: manifest(),
            icon: temp.path().join("missing.png"),
            content: ContentPlan::new(),
            output_dir: out.clone(),
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DtlError::Io { .. }));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn same_inputs_same_package() {
        let temp = TempDir::new().unwrap();
        let icon = temp.path().join("logo.png");
        std::fs::write(&icon, b"png").unwrap();

        let mut hashes = Vec::new();
        for dir in ["a", "b"] {
            let output = write_package(PackageRequest {
                manifest: manifest(),
                icon: icon.clone(),
                content: ContentPlan::new(),
                output_dir: temp.path().join(dir),
            })
            .await
            .unwrap();
            hashes.push(output.sha256);
        }
        assert_eq!(hashes[0], hashes[1]);
    }
}
