use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub const DEFAULT_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const DEFAULT_MODEL_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file {0} does not exist")]
    Missing(PathBuf),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Resolves the emotion model, downloading it into the user cache on first use.
///
/// An explicit path always wins and must exist.
pub fn resolve(
    name: &str,
    url: &str,
    explicit: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return explicit_path(path);
    }
    resolve_in(&model_cache_dir()?, name, url, None)
}

/// Same as [`resolve`] with the cache rooted at `cache_dir`.
pub fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: &str,
    explicit: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return explicit_path(path);
    }

    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    info!("Downloading model weights from {url}. This may take a few minutes");
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path)?;
    info!(path = %cached_path.display(), "Model weights saved");
    Ok(cached_path)
}

/// File name a model downloaded from `url` is cached under.
pub fn model_name_from_url(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_MODEL_NAME)
}

pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::cache_dir()
        .map(|d| d.join("emotion-overlay").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn explicit_path(path: &Path) -> Result<PathBuf, ModelResolveError> {
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(ModelResolveError::Missing(path.to_path_buf()))
    }
}

fn download(url: &str, dest: &Path) -> Result<(), ModelResolveError> {
    let download_error = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };
    let bytes = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(download_error)?;

    // written next to the destination and renamed once complete
    let temp_path = dest.with_extension("part");
    let write_error = |source| ModelResolveError::Write {
        path: temp_path.clone(),
        source,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_error)?;
    file.write_all(&bytes).map_err(write_error)?;
    file.flush().map_err(write_error)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNREACHABLE_URL: &str = "http://invalid.invalid/model.onnx";

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("mine.onnx");
        fs::write(&model, b"model").unwrap();

        let resolved = resolve_in(tmp.path(), "other.onnx", UNREACHABLE_URL, Some(&model)).unwrap();

        assert_eq!(resolved, model);
    }

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let model = tmp.path().join("missing.onnx");

        let result = resolve_in(tmp.path(), "other.onnx", UNREACHABLE_URL, Some(&model));

        assert!(matches!(result, Err(ModelResolveError::Missing(path)) if path == model));
    }

    #[test]
    fn test_cached_model_is_not_downloaded() {
        let tmp = TempDir::new().unwrap();
        let cached = tmp.path().join(DEFAULT_MODEL_NAME);
        fs::write(&cached, b"cached model").unwrap();

        let resolved = resolve_in(tmp.path(), DEFAULT_MODEL_NAME, UNREACHABLE_URL, None).unwrap();

        assert_eq!(resolved, cached);
    }

    #[test]
    fn test_failed_download_leaves_no_model() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");

        let result = resolve_in(&cache, DEFAULT_MODEL_NAME, UNREACHABLE_URL, None);

        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        assert!(!cache.join(DEFAULT_MODEL_NAME).exists());
    }

    #[test]
    fn test_model_name_from_url() {
        assert_eq!(model_name_from_url(DEFAULT_MODEL_URL), DEFAULT_MODEL_NAME);
        assert_eq!(model_name_from_url("https://example.com/"), DEFAULT_MODEL_NAME);
    }

    #[test]
    fn test_model_cache_dir_is_app_specific() {
        if let Ok(path) = model_cache_dir() {
            assert!(path.ends_with("emotion-overlay/models"));
        }
    }
}
