//! Transport to the sync server: JSON over HTTP plus a WebSocket event stream.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::{ConnectionProvider, ServerConfig};
use crate::error::{Error, Result};
use crate::util::compact_text;

/// Text frames from the live channel, in delivery order.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Abstract transport interface.
///
/// Base URL and token are resolved on every call, so a reconfigured server
/// takes effect on the next request.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// `GET route?query`, returning the decoded JSON body
    async fn get(&self, route: &str, query: &[(&str, String)]) -> Result<Value>;

    /// `POST route` with a JSON body, returning the decoded JSON body
    async fn post(&self, route: &str, body: &Value) -> Result<Value>;

    /// Open the live event channel
    async fn open_socket(&self, route: &str) -> Result<FrameStream>;
}

/// `reqwest` + `tokio-tungstenite` implementation of [`Transport`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    connection: ConnectionProvider,
}

impl HttpTransport {
    pub fn new(connection: ConnectionProvider) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            connection,
        })
    }

    fn server(&self) -> Result<ServerConfig> {
        (self.connection)().ok_or_else(|| {
            Error::InvalidInput("no sync server is configured".to_string())
        })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: parse_api_error(status, &body),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).or_else(|_| Ok(Value::String(body)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, route: &str, query: &[(&str, String)]) -> Result<Value> {
        let server = self.server()?;
        let response = self
            .client
            .get(server.route_url(route))
            .bearer_auth(&server.auth_token)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn post(&self, route: &str, body: &Value) -> Result<Value> {
        let server = self.server()?;
        let response = self
            .client
            .post(server.route_url(route))
            .bearer_auth(&server.auth_token)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn open_socket(&self, route: &str) -> Result<FrameStream> {
        let server = self.server()?;
        let url = server.socket_url(route);

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::WebSocket(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", server.auth_token))
            .map_err(|e| Error::InvalidInput(format!("invalid auth token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| Error::WebSocket(format!("failed to connect to {url}: {e}")))?;
        tracing::info!("Live event channel connected to {url}");

        let (_write, read) = socket.split();
        let frames = read.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(_) => None,
                Err(e) => Some(Err(Error::WebSocket(e.to_string()))),
            }
        });
        Ok(frames.boxed())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
    } else {
        trimmed
    }
}
