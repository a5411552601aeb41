use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{BUNDLED_MODEL_DIR, MODEL_FILE_NAME, MODEL_PATH_ENV, MODEL_URL_ENV};

#[derive(Error, Debug)]
pub enum ModelResolveError {
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
    #[error("model file does not exist: {0}")]
    MissingFile(PathBuf),
    #[error("no model weights found (searched {searched}); pass --model, or set LOOKOUT_MODEL or LOOKOUT_MODEL_URL")]
    NotFound { searched: String },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for the detector weights, in priority order.
#[derive(Clone, Debug, Default)]
pub struct ModelLocations {
    /// Path given on the command line or through `LOOKOUT_MODEL`.
    pub explicit: Option<PathBuf>,
    pub bundled_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    /// Download source used when no local copy exists.
    pub url: Option<String>,
}

impl ModelLocations {
    /// Standard search locations, with command-line values taking precedence
    /// over the environment.
    pub fn from_env(explicit: Option<PathBuf>, url: Option<String>) -> Self {
        let explicit = explicit.or_else(|| non_empty_env(MODEL_PATH_ENV).map(PathBuf::from));
        let url = url.or_else(|| non_empty_env(MODEL_URL_ENV));
        Self {
            explicit,
            bundled_dir: Some(PathBuf::from(BUNDLED_MODEL_DIR)),
            cache_dir: model_cache_dir().ok(),
            url,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Find the detector weights, downloading them into the cache if needed.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. Bundled `weights/` directory
/// 3. User cache directory (platform-specific)
/// 4. Download from URL to cache
pub fn resolve(
    locations: &ModelLocations,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = &locations.explicit {
        return if path.is_file() {
            Ok(path.clone())
        } else {
            Err(ModelResolveError::MissingFile(path.clone()))
        };
    }

    let mut searched = Vec::new();
    for dir in [&locations.bundled_dir, &locations.cache_dir].into_iter().flatten() {
        let candidate = dir.join(MODEL_FILE_NAME);
        if candidate.is_file() {
            log::debug!("Using model at {}", candidate.display());
            return Ok(candidate);
        }
        searched.push(candidate);
    }

    let Some(url) = &locations.url else {
        return Err(ModelResolveError::NotFound {
            searched: searched
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    };

    let cache_dir = locations
        .cache_dir
        .as_ref()
        .ok_or(ModelResolveError::NoCacheDir)?;
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    let cached_path = cache_dir.join(MODEL_FILE_NAME);
    log::info!("Downloading model from {url}");
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Lookout/models/`
/// - Linux: `$XDG_CACHE_HOME/Lookout/models/` or `~/.cache/Lookout/models/`
/// - Windows: `%LOCALAPPDATA%/Lookout/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Lookout").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Lookout").join("models"))
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
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ModelResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))?;

    Ok(())
}
