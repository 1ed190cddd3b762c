use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("invalid GITHUB_TOKEN format")]
    InvalidToken,
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

async fn download_file(url: &str, path: &Path, token: Option<&str>) -> Result<(), FetchError> {
    tracing::info!(url, path = %path.display(), "downloading model artifact");

    let mut header_map = HeaderMap::new();
    if let Some(token) = token {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| FetchError::InvalidToken)?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let request_err = |source| FetchError::Request {
        url: url.to_string(),
        source,
    };

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .headers(header_map)
        .send()
        .await
        .map_err(request_err)?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let bytes = response.bytes().await.map_err(request_err)?;

    let write_err = |source| FetchError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(write_err)?;

    tracing::info!(path = %path.display(), "model artifact downloaded");
    Ok(())
}

/// Downloads the model artifact when it is not on disk and a source URL is
/// configured. Returns whether the artifact is present afterwards.
pub async fn ensure_model_file(
    model_path: &Path,
    model_url: Option<&str>,
    token: Option<&str>,
) -> Result<bool, FetchError> {
    if model_path.exists() {
        return Ok(true);
    }

    match model_url {
        Some(url) => {
            download_file(url, model_path, token).await?;
            Ok(true)
        }
        None => {
            tracing::warn!(
                path = %model_path.display(),
                "model artifact not found and MODEL_URL is not set"
            );
            Ok(false)
        }
    }
}

/// Creates the working directories the service writes into.
pub async fn ensure_dirs(dirs: &[&Path]) -> std::io::Result<()> {
    for dir in dirs {
        if dir.as_os_str().is_empty() {
            continue;
        }
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
