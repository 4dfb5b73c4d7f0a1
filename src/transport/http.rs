//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! HTTP transport: one POST per request, the reply riding the response body.
//!
//! The dispatcher opens a fresh request to the configured URI for every
//! call: `POST /` with the encoded [`ServiceRequest`] as the body, a 2xx
//! status carrying the encoded [`ServiceResponse`] back. Application
//! failures are *inside* the response (still status 200); only framing-level
//! failures (an unreadable body, bytes that do not decode) surface as
//! status 500.
//!
//! The receiver runs a minimal embedded server recognizing exactly two
//! routes: `POST /` for invocations and `GET /ping` for external health
//! checks. Everything else, wrong methods on known paths included, is 404.
//!
//! The URI scheme selects plaintext or TLS. An `https://` receiver
//! terminates TLS with the configured keystore (a PEM bundle holding the
//! certificate chain and private key); an `https://` dispatcher may opt in
//! to self-signed certificates for deployments without a CA.

use crate::codec::Codec;
use crate::config::BusConfig;
use crate::envelope::{ServiceRequest, ServiceResponse};
use crate::error::BusError;
use crate::receiver::InboundService;
use crate::transport::{BusDispatcher, BusReceiver, TransportBindings};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use url::Url;

/// Every boson dispatcher identifies itself with this agent string.
pub const USER_AGENT: &str = "Boson-Service-Transport";

/// Bindings that use point-to-point HTTP between dispatcher and receiver.
pub struct HttpBindings<C: Codec> {
    codec: Arc<C>,
}

impl<C: Codec> HttpBindings<C> {
    /// Creates HTTP bindings framing envelopes with the given codec.
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
        }
    }
}

impl<C: Codec> TransportBindings for HttpBindings<C> {
    type Codec = C;

    fn codec(&self) -> Arc<C> {
        self.codec.clone()
    }

    fn dispatcher(&self, contract: &str, config: BusConfig) -> Arc<dyn BusDispatcher> {
        Arc::new(HttpDispatcher {
            contract: contract.to_string(),
            config,
            codec: self.codec.clone(),
            connected: AtomicBool::new(false),
            client: parking_lot::Mutex::new(None),
        })
    }

    fn receiver(
        &self,
        service: Arc<dyn InboundService>,
        config: BusConfig,
    ) -> Arc<dyn BusReceiver> {
        Arc::new(HttpReceiver {
            service,
            config,
            codec: self.codec.clone(),
            server: Mutex::new(None),
        })
    }
}

/// Client end: POSTs each request to the configured endpoint.
struct HttpDispatcher<C: Codec> {
    contract: String,
    config: BusConfig,
    codec: Arc<C>,
    connected: AtomicBool,
    client: parking_lot::Mutex<Option<reqwest::Client>>,
}

#[async_trait]
impl<C: Codec> BusDispatcher for HttpDispatcher<C> {
    fn contract(&self) -> &str {
        &self.contract
    }

    /// Connections are opened at invocation time, so this builds the client
    /// and marks the dispatcher connected.
    async fn connect(&self) -> Result<(), BusError> {
        // Several rustls providers are compiled in; pin one before any TLS
        // config gets built underneath the client.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.config.request_ttl);
        if self.config.accept_self_signed {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| BusError::Transport(format!("cannot build HTTP client: {e}")))?;
        *self.client.lock() = Some(client);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// No persistent connection to tear down; just stop dispatching.
    async fn disconnect(&self) -> Result<(), BusError> {
        self.connected.store(false, Ordering::SeqCst);
        *self.client.lock() = None;
        Ok(())
    }

    async fn apply(&self, request: ServiceRequest) -> Result<ServiceResponse, BusError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected(format!(
                "HTTP dispatcher for [{}] is not connected",
                self.contract
            )));
        }
        let client = self
            .client
            .lock()
            .clone()
            .ok_or_else(|| BusError::NotConnected(format!("[{}] has no client", self.contract)))?;

        let body = self.codec.encode(&request)?;
        let outcome = client
            .post(&self.config.uri)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!(
                        service = %self.contract,
                        "request connection timeout, giving up on response for {request}"
                    );
                    BusError::Timeout {
                        service: self.contract.clone(),
                        request_id: request.id,
                    }
                } else {
                    BusError::Transport(format!("HTTP dispatch failed: {e}"))
                }
            })?;

        let status = outcome.status();
        if !status.is_success() {
            return Err(BusError::Transport(format!(
                "HTTP transport error w/ status code {}",
                status.as_u16()
            )));
        }
        let bytes = outcome
            .bytes()
            .await
            .map_err(|e| BusError::Transport(format!("cannot read HTTP response body: {e}")))?;
        self.codec.decode(&bytes)
    }
}

/// What the request handlers need: the connected service and the codec.
struct HttpEndpoint<C: Codec> {
    service: Arc<dyn InboundService>,
    codec: Arc<C>,
}

/// `POST /`: the invocation route. Framing failures are 500; everything the
/// service itself produces, success or error, is a 200 with an encoded
/// response body.
async fn invoke<C: Codec>(
    State(endpoint): State<Arc<HttpEndpoint<C>>>,
    body: Bytes,
) -> Response {
    let request: ServiceRequest = match endpoint.codec.decode(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("undecodable request body: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let response = endpoint.service.apply(request).await;
    match endpoint.codec.encode(&response) {
        Ok(bytes) => (StatusCode::OK, bytes).into_response(),
        Err(e) => {
            error!("cannot encode {response}: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /ping`: health checks.
async fn ping() -> StatusCode {
    StatusCode::OK
}

/// Everything that is not `POST /` or `GET /ping`.
async fn unrecognized() -> StatusCode {
    StatusCode::NOT_FOUND
}

struct RunningServer {
    handle: axum_server::Handle,
    task: JoinHandle<()>,
}

/// Server end: a minimal embedded HTTP server feeding the service.
struct HttpReceiver<C: Codec> {
    service: Arc<dyn InboundService>,
    config: BusConfig,
    codec: Arc<C>,
    server: Mutex<Option<RunningServer>>,
}

impl<C: Codec> HttpReceiver<C> {
    fn router(&self) -> Router {
        let endpoint = Arc::new(HttpEndpoint {
            service: self.service.clone(),
            codec: self.codec.clone(),
        });
        Router::new()
            .route("/", post(invoke::<C>))
            .route("/ping", get(ping))
            .fallback(unrecognized)
            .method_not_allowed_fallback(unrecognized)
            .with_state(endpoint)
    }
}

#[async_trait]
impl<C: Codec> BusReceiver for HttpReceiver<C> {
    fn contract(&self) -> &str {
        self.service.contract()
    }

    async fn connect(&self) -> Result<(), BusError> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Err(BusError::Transport(
                "HTTP server is already connected".into(),
            ));
        }

        let url = Url::parse(&self.config.uri)
            .map_err(|e| BusError::Transport(format!("bad uri [{}]: {e}", self.config.uri)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| BusError::Transport(format!("no port in uri [{}]", self.config.uri)))?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let secure = url.scheme() == "https";

        info!(
            service = %self.service.contract(),
            %addr, secure, "starting embedded http server"
        );

        let app = self.router();
        let handle = axum_server::Handle::new();
        let task = if secure {
            let keystore = self.config.keystore_path.as_deref().ok_or_else(|| {
                BusError::Transport("https uri configured without a keystore".into())
            })?;
            let tls = keystore_tls_config(keystore).await?;
            let serve = axum_server::bind_rustls(addr, tls)
                .handle(handle.clone())
                .serve(app.into_make_service());
            self.config.spawner().spawn(async move {
                if let Err(e) = serve.await {
                    error!("https server stopped: {e}");
                }
            })
        } else {
            let serve = axum_server::bind(addr)
                .handle(handle.clone())
                .serve(app.into_make_service());
            self.config.spawner().spawn(async move {
                if let Err(e) = serve.await {
                    error!("http server stopped: {e}");
                }
            })
        };

        // listening() resolves with None when the bind failed and the serve
        // task already exited.
        if handle.listening().await.is_none() {
            task.abort();
            return Err(BusError::Transport(format!(
                "cannot listen on {addr} for [{}]",
                self.service.contract()
            )));
        }

        *server = Some(RunningServer { handle, task });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        if let Some(running) = self.server.lock().await.take() {
            running.handle.shutdown();
            running.task.abort();
        }
        Ok(())
    }
}

/// Loads the PEM keystore bundle into a rustls server configuration.
///
/// The bundle must contain the certificate chain and the private key; a
/// missing half is reported before rustls gets a chance to be cryptic about
/// it.
async fn keystore_tls_config(path: &Path) -> Result<RustlsConfig, BusError> {
    // Pin the provider before any rustls config is built; with several
    // compiled in, the process-level default would otherwise be ambiguous.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let pem = tokio::fs::read(path)
        .await
        .map_err(|e| BusError::Transport(format!("cannot read keystore {}: {e}", path.display())))?;

    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BusError::Transport(format!("keystore has bad certificate: {e}")))?;
    if certs.is_empty() {
        return Err(BusError::Transport(format!(
            "keystore {} contains no certificate",
            path.display()
        )));
    }
    let key = rustls_pemfile::private_key(&mut &pem[..])
        .map_err(|e| BusError::Transport(format!("keystore has bad private key: {e}")))?
        .ok_or_else(|| {
            BusError::Transport(format!("keystore {} contains no private key", path.display()))
        })?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| BusError::Transport(format!("keystore rejected: {e}")))?;
    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keystore_loads_pem_bundle() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let bundle = format!(
            "{}\n{}",
            cert.cert.pem(),
            cert.key_pair.serialize_pem()
        );
        let path = std::env::temp_dir().join(format!("boson-keystore-{}.pem", std::process::id()));
        tokio::fs::write(&path, bundle).await.unwrap();

        let loaded = keystore_tls_config(&path).await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(loaded.is_ok());
    }

    #[tokio::test]
    async fn test_keystore_without_key_is_rejected() {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let path = std::env::temp_dir().join(format!("boson-certonly-{}.pem", std::process::id()));
        tokio::fs::write(&path, cert.cert.pem()).await.unwrap();

        let loaded = keystore_tls_config(&path).await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(loaded, Err(BusError::Transport(m)) if m.contains("no private key")));
    }

    #[tokio::test]
    async fn test_missing_keystore_is_reported() {
        let loaded = keystore_tls_config(Path::new("/nonexistent/keys.pem")).await;
        assert!(matches!(loaded, Err(BusError::Transport(_))));
    }
}
