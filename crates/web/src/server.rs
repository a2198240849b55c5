use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rill_http::codec::{ContentCoding, ContentDecoders};
use rill_http::config::{ConnectionConfig, Limits};
use rill_http::connection::HttpConnection;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::encoding::{Deflate, Gzip};
use crate::router::Router;

/// Configures a [`Server`].
///
/// Content decoders for `gzip` and `deflate` are registered from the start; more can be added
/// with [`content_coding`](ServerBuilder::content_coding).
pub struct ServerBuilder {
    router: Option<Router>,
    address: Option<io::Result<Vec<SocketAddr>>>,
    config: ConnectionConfig,
    decoders: ContentDecoders,
}

impl ServerBuilder {
    fn new() -> Self {
        let mut decoders = ContentDecoders::new();
        decoders.register("gzip", Gzip);
        decoders.register("deflate", Deflate);
        Self { router: None, address: None, config: ConnectionConfig::default(), decoders }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(Iterator::collect));
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.config.limits = limits;
        self
    }

    /// How long an idle or slow client may keep a read pending. `None` disables the deadline.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Adds a header to every response that does not set it. Replaces an earlier default of
    /// the same name, `Server` included.
    pub fn default_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.set(key, value);
        self
    }

    /// Registers a request body decoder for `Content-Encoding: <token>`.
    pub fn content_coding(mut self, token: &str, coding: impl ContentCoding + 'static) -> Self {
        self.decoders.register(token, coding);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(ServerBuildError::InvalidAddress)?;
        if address.is_empty() {
            return Err(ServerBuildError::MissingAddress);
        }

        Ok(Server { router: Arc::new(router), address, config: self.config, decoders: Arc::new(self.decoders) })
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("router", &self.router)
            .field("address", &self.address)
            .field("config", &self.config)
            .field("decoders", &self.decoders)
            .finish()
    }
}

/// Accepts TCP connections and serves each one on its own task.
#[derive(Debug)]
pub struct Server {
    router: Arc<Router>,
    address: Vec<SocketAddr>,
    config: ConnectionConfig,
    decoders: Arc<ContentDecoders>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("address must be set")]
    MissingAddress,
    #[error("address can't be resolved: {0}")]
    InvalidAddress(#[source] io::Error),
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Installs an `INFO` level fmt subscriber (unless one is set already), binds the
    /// configured address and serves until the task is dropped.
    pub async fn start(self) -> io::Result<()> {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            warn!("a global tracing subscriber is already set, keeping it");
        }

        info!("start listening at {:?}", self.address);
        let listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return Err(e);
            }
        };

        self.run(listener).await;
        Ok(())
    }

    /// Serves connections accepted from `listener`, ignoring the configured address.
    pub async fn run(self, listener: TcpListener) {
        loop {
            let (tcp_stream, remote_addr) = match listener.accept().await {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let router = Arc::clone(&self.router);
            let config = self.config.clone();
            let decoders = Arc::clone(&self.decoders);

            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::with_config(reader, writer, config, decoders);
                match connection.process(router).await {
                    Ok(()) => {
                        info!(%remote_addr, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(%remote_addr, "service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;
    use crate::router::{get, post};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use futures::FutureExt;
    use indoc::indoc;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn router() -> Router {
        Router::builder()
            .route("/hello/{name}", get(handler_fn(|req| async move { format!("hello {}", req.params().get("name").unwrap_or_default()) }.boxed())))
            .route("/upload", post(handler_fn(|req| async move { req.body_mut().bytes().await.map_err(|e| e.to_string()) }.boxed())))
            .build()
            .unwrap()
    }

    async fn exchange(server: Server, request: &[u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serving = tokio::spawn(server.run(listener));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();

        serving.abort();
        String::from_utf8(response).unwrap()
    }

    #[test]
    fn build_requires_router_and_address() {
        let err = Server::builder().address("127.0.0.1:0").build().unwrap_err();
        assert!(matches!(err, ServerBuildError::MissingRouter));

        let err = Server::builder().router(router()).build().unwrap_err();
        assert!(matches!(err, ServerBuildError::MissingAddress));

        let err = Server::builder().router(router()).address("not an address").build().unwrap_err();
        assert!(matches!(err, ServerBuildError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn serves_routed_requests_over_tcp() {
        let server = Server::builder()
            .address("127.0.0.1:0")
            .router(router())
            .default_header("Server", "test")
            .build()
            .unwrap();

        let request = indoc! {"
            GET /hello/rill HTTP/1.1\r
            Host: x\r
            \r
            GET /nope HTTP/1.1\r
            Connection: close\r
            \r
        "};
        let response = exchange(server, request.as_bytes()).await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("Server: test\r\n"));
        assert!(response.contains("\r\n\r\nhello rill"));
        assert!(response.contains("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("Not Found"));
    }

    #[tokio::test]
    async fn gzip_request_bodies_are_decoded() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"compressed payload").unwrap();
        let encoded = encoder.finish().unwrap();

        let mut request = format!(
            "POST /upload HTTP/1.1\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            encoded.len()
        )
        .into_bytes();
        request.extend_from_slice(&encoded);

        let server = Server::builder().address("127.0.0.1:0").router(router()).build().unwrap();
        let response = exchange(server, &request).await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.ends_with("\r\n\r\ncompressed payload"));
    }

    #[tokio::test]
    async fn unknown_content_coding_is_415() {
        let server = Server::builder().address("127.0.0.1:0").router(router()).build().unwrap();
        let response = exchange(server, b"POST /upload HTTP/1.1\r\nContent-Encoding: br\r\n\r\n").await;

        assert!(response.starts_with("HTTP/1.1 415 Unsupported Media Type\r\n"), "{response}");
        assert!(response.contains("Connection: close\r\n"));
    }
}
