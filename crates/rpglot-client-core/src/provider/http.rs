//! HTTP transport for both providers (reqwest).

use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    EventSource, FrameStream, ProviderError, SnapshotFetcher, SnapshotQuery, SseDecoder,
};
use crate::model::Snapshot;
use crate::schema::ApiSchema;
use crate::session::{AuthConfig, Credential, SessionContext};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    ctx: SessionContext,
}

impl HttpTransport {
    pub fn new(ctx: SessionContext) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("rpglot-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { client, ctx })
    }

    pub fn session(&self) -> &SessionContext {
        &self.ctx
    }

    /// Replaces the session, e.g. after the auth config was fetched.
    pub fn with_session(mut self, ctx: SessionContext) -> Self {
        self.ctx = ctx;
        self
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let req = self.client.get(self.ctx.endpoint(path));
        match self.ctx.credential() {
            Some(Credential::Bearer(token)) => req.bearer_auth(token),
            Some(Credential::Basic { user, password }) => req.basic_auth(user, Some(password)),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ProviderError> {
        let resp = req
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;
        let resp = check_status(resp)?;
        let body = resp.bytes().await.map_err(transport_error)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// `GET /api/v1/schema`
    pub async fn fetch_schema(&self) -> Result<ApiSchema, ProviderError> {
        self.get_json(self.get("/api/v1/schema")).await
    }

    /// `GET /api/v1/auth/config`. Public endpoint, sent without credentials.
    pub async fn fetch_auth_config(&self) -> Result<AuthConfig, ProviderError> {
        let req = self.client.get(self.ctx.endpoint("/api/v1/auth/config"));
        self.get_json(req).await
    }

    async fn fetch_snapshot(&self, query: SnapshotQuery) -> Result<Snapshot, ProviderError> {
        let mut req = self.get("/api/v1/snapshot");
        if let Some(ts) = query.timestamp {
            req = req.query(&[("timestamp", ts.to_string())]);
        }
        if let Some(direction) = query.direction {
            req = req.query(&[("direction", direction.as_str())]);
        }
        debug!(?query, "GET /api/v1/snapshot");
        self.get_json(req).await
    }

    async fn open_stream(&self) -> Result<FrameStream, ProviderError> {
        let resp = self
            .get("/api/v1/stream")
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport_error)?;
        let resp = check_status(resp)?;
        let mut body = resp.bytes_stream();

        let frames = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(transport_error)?;
                for frame in decoder.feed(&chunk) {
                    yield frame;
                }
            }
        };
        Ok(frames.boxed())
    }
}

impl SnapshotFetcher for HttpTransport {
    fn fetch(&self, query: SnapshotQuery) -> BoxFuture<'_, Result<Snapshot, ProviderError>> {
        self.fetch_snapshot(query).boxed()
    }
}

impl EventSource for HttpTransport {
    fn connect(&self) -> BoxFuture<'_, Result<FrameStream, ProviderError>> {
        self.open_stream().boxed()
    }
}

fn check_status(resp: Response) -> Result<Response, ProviderError> {
    match resp.status() {
        StatusCode::UNAUTHORIZED => Err(ProviderError::Unauthorized),
        s if s.is_success() => Ok(resp),
        s => Err(ProviderError::Http(s.as_u16())),
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    ProviderError::Transport(e.to_string())
}
