use std::{io, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{
    multipart::{Form, Part},
    Body, Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{PostId, VoteDirection, VoteTarget},
    error::ErrorBody,
    protocol::{
        RealGrant, ShareTally, SignatureResponse, StorageUploadResponse, UploadCredentials,
        UploadGrant, UploadedMedia, VoteRequest, VoteTally,
    },
};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use crate::{config::ClientSettings, error::RemoteFailure, upload::MediaFile};

const TRANSFER_CHUNK_BYTES: usize = 64 * 1024;

#[async_trait]
pub trait VoteRemote: Send + Sync {
    async fn submit_vote(
        &self,
        target: VoteTarget,
        direction: VoteDirection,
    ) -> Result<VoteTally, RemoteFailure>;
}

#[async_trait]
pub trait ShareRemote: Send + Sync {
    async fn submit_share(&self, post_id: PostId) -> Result<ShareTally, RemoteFailure>;
}

#[async_trait]
pub trait UploadRemote: Send + Sync {
    async fn request_grant(&self) -> Result<UploadGrant, RemoteFailure>;
    /// Sends `file` using `grant`. `on_progress` receives whole percentages.
    async fn transfer(
        &self,
        grant: &RealGrant,
        file: &MediaFile,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<UploadedMedia, RemoteFailure>;
}

pub struct MissingRemote;

#[async_trait]
impl VoteRemote for MissingRemote {
    async fn submit_vote(
        &self,
        _target: VoteTarget,
        _direction: VoteDirection,
    ) -> Result<VoteTally, RemoteFailure> {
        Err(RemoteFailure::unavailable("vote"))
    }
}

#[async_trait]
impl ShareRemote for MissingRemote {
    async fn submit_share(&self, _post_id: PostId) -> Result<ShareTally, RemoteFailure> {
        Err(RemoteFailure::unavailable("share"))
    }
}

#[async_trait]
impl UploadRemote for MissingRemote {
    async fn request_grant(&self) -> Result<UploadGrant, RemoteFailure> {
        Err(RemoteFailure::unavailable("media"))
    }

    async fn transfer(
        &self,
        _grant: &RealGrant,
        _file: &MediaFile,
        _on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<UploadedMedia, RemoteFailure> {
        Err(RemoteFailure::unavailable("media"))
    }
}

/// Feed API and media storage over HTTP.
pub struct HttpRemote {
    http: Client,
    api_base: String,
    upload_api_base: String,
    auth_token: Option<String>,
}

impl HttpRemote {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let api_base = normalize_base(&settings.api_base_url)
            .with_context(|| format!("invalid api base url '{}'", settings.api_base_url))?;
        let upload_api_base = normalize_base(&settings.upload_api_base).with_context(|| {
            format!("invalid upload api base '{}'", settings.upload_api_base)
        })?;
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            http,
            api_base,
            upload_api_base,
            auth_token: settings.auth_token.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn grant_from_signature(&self, body: SignatureResponse) -> Result<UploadGrant, RemoteFailure> {
        if body.mock {
            return Ok(UploadGrant::Mock {
                message: body.message,
            });
        }

        let (Some(signature), Some(timestamp), Some(api_key), Some(cloud_name)) =
            (body.signature, body.timestamp, body.api_key, body.cloud_name)
        else {
            return Err(RemoteFailure::malformed(
                "upload signature response is missing credentials",
            ));
        };

        Ok(UploadGrant::Real(RealGrant {
            endpoint: format!("{}/{cloud_name}/upload", self.upload_api_base),
            credentials: UploadCredentials {
                api_key,
                timestamp,
                signature,
            },
            folder: body.folder.unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl VoteRemote for HttpRemote {
    async fn submit_vote(
        &self,
        target: VoteTarget,
        direction: VoteDirection,
    ) -> Result<VoteTally, RemoteFailure> {
        let response = self
            .authorized(self.http.post(format!("{}/votes/", self.api_base)))
            .json(&VoteRequest::new(target, direction))
            .send()
            .await?;
        read_json_or_default(response).await
    }
}

#[async_trait]
impl ShareRemote for HttpRemote {
    async fn submit_share(&self, post_id: PostId) -> Result<ShareTally, RemoteFailure> {
        let response = self
            .authorized(
                self.http
                    .post(format!("{}/posts/{}/share", self.api_base, post_id.0)),
            )
            .send()
            .await?;
        read_json_or_default(response).await
    }
}

#[async_trait]
impl UploadRemote for HttpRemote {
    async fn request_grant(&self) -> Result<UploadGrant, RemoteFailure> {
        let response = self
            .authorized(self.http.get(format!("{}/media/signature", self.api_base)))
            .send()
            .await?;
        let body: SignatureResponse = read_json(response).await?;
        self.grant_from_signature(body)
    }

    async fn transfer(
        &self,
        grant: &RealGrant,
        file: &MediaFile,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<UploadedMedia, RemoteFailure> {
        let total = file.bytes.len() as u64;
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u64>();

        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(TRANSFER_CHUNK_BYTES)
            .map(<[u8]>::to_vec)
            .collect();
        let mut sent = 0u64;
        let body = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len() as u64;
            let _ = progress_tx.send(sent);
            Ok::<_, io::Error>(chunk)
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file.filename.clone())
            .mime_str(&file.mime_type)
            .map_err(|err| RemoteFailure::malformed(err.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("api_key", grant.credentials.api_key.clone())
            .text("timestamp", grant.credentials.timestamp.to_string())
            .text("signature", grant.credentials.signature.clone())
            .text("folder", grant.folder.clone());

        let request = self.http.post(&grant.endpoint).multipart(form).send();
        tokio::pin!(request);

        let response = loop {
            tokio::select! {
                Some(sent) = progress_rx.recv() => on_progress(percent_of(sent, total)),
                result = &mut request => break result?,
            }
        };
        while let Ok(sent) = progress_rx.try_recv() {
            on_progress(percent_of(sent, total));
        }
        debug!(endpoint = %grant.endpoint, bytes = total, "media transfer finished");

        let body: StorageUploadResponse = read_json(response).await?;
        Ok(body.into())
    }
}

fn normalize_base(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim())?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "unsupported scheme '{}'",
        url.scheme()
    );
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Rounded share of `sent` over `total`, clamped to 100.
pub(crate) fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (sent.saturating_mul(100) + total / 2) / total;
    percent.min(100) as u8
}

async fn failure_from_response(response: Response) -> RemoteFailure {
    let status = response.status().as_u16();
    let detail = match response.text().await {
        Ok(text) => serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.detail_text())
            .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string())),
        Err(err) => Some(err.to_string()),
    };
    warn!(status, detail = ?detail, "remote operation rejected");
    RemoteFailure::rejected(status, detail)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteFailure> {
    if !response.status().is_success() {
        return Err(failure_from_response(response).await);
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| RemoteFailure::malformed(err.to_string()))
}

/// Like [`read_json`], but an empty success body means "no counts returned".
async fn read_json_or_default<T: DeserializeOwned + Default>(
    response: Response,
) -> Result<T, RemoteFailure> {
    if !response.status().is_success() {
        return Err(failure_from_response(response).await);
    }
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|err| RemoteFailure::malformed(err.to_string()))
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
