//! HTTP client for a lanshare server
//!
//! `ShareClient` performs the raw requests; `download_file` and `upload_files`
//! drive them through a `SessionController` so they can be paused, resumed
//! and cancelled while reporting progress.

mod download;
mod transfer;
mod upload;

pub use download::download_file;
pub use transfer::{ControlCommand, TransferOutcome, TransferUpdate};
pub use upload::upload_files;

use crate::auth::AUTH_HEADER;
use crate::error::ShareError;
use crate::http_share::{CHUNK_SIZE, UPLOAD_FIELD};
use crate::storage::validate_file_name;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use url::Url;

/// Response body of a download, with its advertised size
pub struct RemoteFile {
    pub total_bytes: Option<u64>,
    pub body: BoxStream<'static, reqwest::Result<Bytes>>,
}

/// A local file ready to be uploaded
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// Check local paths and collect their names and sizes
pub async fn prepare_uploads(paths: &[PathBuf]) -> Result<Vec<UploadItem>, ShareError> {
    if paths.is_empty() {
        return Err(ShareError::InvalidInput("No files uploaded.".to_string()));
    }

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let name = upload_name(path)?;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ShareError::Storage(format!("{}: {}", path.display(), e)))?;
        if !metadata.is_file() {
            return Err(ShareError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        items.push(UploadItem {
            path: path.clone(),
            name,
            size: metadata.len(),
        });
    }
    Ok(items)
}

fn upload_name(path: &Path) -> Result<String, ShareError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ShareError::InvalidInput(format!("Invalid filename: {}", path.display())))?;
    Ok(validate_file_name(name)?.to_string())
}

/// Map an error status to the matching `ShareError`
async fn check_status(response: Response) -> Result<Response, ShareError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED => ShareError::Unauthorized,
        StatusCode::BAD_REQUEST => ShareError::InvalidInput(message),
        StatusCode::NOT_FOUND => ShareError::NotFound(message),
        s if s.is_server_error() => ShareError::Storage(
            message
                .strip_prefix("Storage error: ")
                .unwrap_or(&message)
                .to_string(),
        ),
        s => ShareError::Transport(format!("Unexpected status {}: {}", s, message)),
    })
}

/// Connection to one server, authenticated with its password
#[derive(Clone)]
pub struct ShareClient {
    http: reqwest::Client,
    base: Url,
    password: String,
}

impl ShareClient {
    /// `base_url` is what the server prints at startup, e.g. `http://192.168.1.42:6969`
    pub fn new(base_url: &str, password: impl Into<String>) -> Result<Self, ShareError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| ShareError::InvalidInput(format!("Invalid server URL {}: {}", base_url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(ShareError::transport)?;

        Ok(Self {
            http,
            base,
            password: password.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ShareError> {
        self.base
            .join(path)
            .map_err(|e| ShareError::InvalidInput(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// GET /files
    pub async fn list_files(&self) -> Result<Vec<String>, ShareError> {
        let response = self
            .http
            .get(self.endpoint("files")?)
            .header(AUTH_HEADER, &self.password)
            .send()
            .await
            .map_err(ShareError::transport)?;

        check_status(response)
            .await?
            .json::<Vec<String>>()
            .await
            .map_err(ShareError::transport)
    }

    /// GET /download/{name}, returning the body as a stream without reading it
    pub async fn open_download(&self, file_name: &str) -> Result<RemoteFile, ShareError> {
        validate_file_name(file_name)?;

        let mut url = self.endpoint("download")?;
        url.path_segments_mut()
            .map_err(|_| ShareError::InvalidInput(format!("Cannot build URL for {}", file_name)))?
            .pop_if_empty()
            .push(file_name);

        let response = self
            .http
            .get(url)
            .header(AUTH_HEADER, &self.password)
            .send()
            .await
            .map_err(ShareError::transport)?;
        let response = check_status(response).await?;

        Ok(RemoteFile {
            total_bytes: response.content_length(),
            body: response.bytes_stream().boxed(),
        })
    }

    /// POST /upload with every item as a `files` part.
    ///
    /// The size of each chunk read from disk is sent on `chunk_tx` as the
    /// request body consumes it.
    pub async fn upload(
        &self,
        items: &[UploadItem],
        chunk_tx: mpsc::UnboundedSender<u64>,
    ) -> Result<String, ShareError> {
        // Names are already validated; send them as typed rather than percent-encoded
        let mut form = Form::new().percent_encode_noop();
        for item in items {
            let file = File::open(&item.path)
                .await
                .map_err(|e| ShareError::Storage(format!("{}: {}", item.path.display(), e)))?;

            let tx = chunk_tx.clone();
            let stream = ReaderStream::with_capacity(file, CHUNK_SIZE).inspect(move |chunk| {
                if let Ok(bytes) = chunk {
                    let _ = tx.send(bytes.len() as u64);
                }
            });

            let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), item.size)
                .file_name(item.name.clone());
            form = form.part(UPLOAD_FIELD, part);
        }
        drop(chunk_tx);

        let response = self
            .http
            .post(self.endpoint("upload")?)
            .header(AUTH_HEADER, &self.password)
            .multipart(form)
            .send()
            .await
            .map_err(ShareError::transport)?;

        check_status(response)
            .await?
            .text()
            .await
            .map_err(ShareError::transport)
    }
}
