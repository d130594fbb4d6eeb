use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model not found at {} (also checked {}); set a model URL to download it", .path.display(), .cached.display())]
    NotFound { path: PathBuf, cached: PathBuf },
    #[error("model path has no file name: {}", .0.display())]
    NoFileName(PathBuf),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve the detection model file.
///
/// Resolution order:
/// 1. `model_path` as given
/// 2. A file with the same name in the user model cache
/// 3. Download from `url` into the cache
pub fn resolve(
    model_path: &Path,
    url: Option<&str>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if model_path.is_file() {
        return Ok(model_path.to_path_buf());
    }
    let cache_dir = model_cache_dir()?;
    resolve_with_cache(model_path, &cache_dir, url, progress)
}

fn resolve_with_cache(
    model_path: &Path,
    cache_dir: &Path,
    url: Option<&str>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if model_path.is_file() {
        return Ok(model_path.to_path_buf());
    }

    let name = model_path
        .file_name()
        .ok_or_else(|| ModelResolveError::NoFileName(model_path.to_path_buf()))?;
    let cached_path = cache_dir.join(name);
    if cached_path.is_file() {
        log::info!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    let Some(url) = url else {
        return Err(ModelResolveError::NotFound {
            path: model_path.to_path_buf(),
            cached: cached_path,
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading model from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/RoadScan/models/`
/// - Linux: `$XDG_CACHE_HOME/RoadScan/models/` or `~/.cache/RoadScan/models/`
/// - Windows: `%LOCALAPPDATA%/RoadScan/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };

    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_existing_path_wins() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("rdd.onnx");
        fs::write(&model, b"model").unwrap();

        let resolved = resolve_with_cache(&model, &tmp.path().join("cache"), None, None).unwrap();
        assert_eq!(resolved, model);
    }

    #[test]
    fn test_falls_back_to_cache_by_file_name() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("rdd.onnx"), b"cached").unwrap();

        let resolved = resolve_with_cache(
            &tmp.path().join("models/rdd.onnx"),
            &cache,
            None,
            None,
        )
        .unwrap();
        assert_eq!(resolved, cache.join("rdd.onnx"));
    }

    #[test]
    fn test_missing_without_url_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let result = resolve_with_cache(&tmp.path().join("rdd.onnx"), &cache, None, None);
        assert!(matches!(result, Err(ModelResolveError::NotFound { .. })));
        // Nothing is created when there is nothing to download
        assert!(!cache.exists());
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("RoadScan"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_download_invalid_url_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
