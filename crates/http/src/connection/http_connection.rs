use std::mem;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio_util::codec::Encoder;
use tracing::{error, info, trace, warn};

use crate::codec::body::PayloadDecoder;
use crate::codec::{ContentDecoder, ContentDecoders, Outgoing, Renderer, RequestParser, RequestState};
use crate::config::{ConnectionConfig, Limits};
use crate::connection::transport::Transport;
use crate::handler::Handler;
use crate::protocol::body::{ReqBody, ReqBodySender};
use crate::protocol::{HttpError, Method, ParseError, PayloadItem, Protocol, Request, Response, SendError};
use crate::utils::ensure;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// An HTTP connection that manages request processing and response rendering
///
/// `HttpConnection` owns one client connection for its whole lifetime:
/// - reading and parsing request heads, pipelined requests included
/// - streaming request bodies to the handler through the body gateway
/// - answering `Expect: 100-continue`
/// - rendering responses and deciding whether the connection stays open
///
/// Protocol errors are answered with a default error response and end the connection;
/// transport failures end it without a response.
pub struct HttpConnection<R, W> {
    transport: Transport<R, W>,
    parser: RequestParser,
    renderer: Renderer,
    decoders: Arc<ContentDecoders>,
    limits: Limits,
    request: Request,
    out: BytesMut,
}

/// How a request left the connection loop.
enum Exchange {
    Continue,
    Close,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ConnectionConfig::default(), Arc::new(ContentDecoders::new()))
    }

    pub fn with_config(reader: R, writer: W, config: ConnectionConfig, decoders: Arc<ContentDecoders>) -> Self {
        let mut transport = Transport::new(reader, writer, config.read_buffer_size);
        transport.set_read_timeout(config.read_timeout);
        transport.set_write_timeout(config.write_timeout);

        Self {
            transport,
            parser: RequestParser::new(config.limits, Arc::clone(&decoders)),
            renderer: Renderer::new(config.default_headers),
            decoders,
            limits: config.limits,
            request: Request::default(),
            out: BytesMut::with_capacity(config.read_buffer_size),
        }
    }

    /// Serves requests until the client goes away, asks to close, or breaks the protocol.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + ?Sized,
    {
        loop {
            let state = match self.read_head().await {
                Ok(Some(state)) => state,
                Ok(None) => {
                    info!("client finished, closing connection");
                    return Ok(());
                }
                Err(e) => return self.fail(e).await,
            };

            let exchange = match state {
                RequestState::RequestCompleted => {
                    let response = handler.call(&mut self.request).await;
                    self.respond(&response).await?
                }
                _ => self.exchange_with_body(&*handler).await?,
            };

            self.request.reset();
            if let Exchange::Close = exchange {
                info!("connection closed after response");
                return Ok(());
            }
        }
    }

    /// Reads until the parser finished a request head; `None` when the stream ended between
    /// requests.
    async fn read_head(&mut self) -> Result<Option<RequestState>, ParseError> {
        loop {
            let data = self.transport.read().await.map_err(ParseError::io)?;
            if data.is_empty() {
                ensure!(self.parser.is_idle(), ParseError::ConnectionClosed);
                return Ok(None);
            }

            let (state, leftover) = self.parser.feed(&mut self.request, &data)?;
            if !leftover.is_empty() {
                self.transport.push_back(data.slice_ref(leftover));
            }
            if state != RequestState::Pending {
                return Ok(Some(state));
            }
        }
    }

    /// Runs the handler while the body pump feeds it, then drains what it left unread.
    async fn exchange_with_body<H>(&mut self, handler: &H) -> Result<Exchange, HttpError>
    where
        H: Handler + ?Sized,
    {
        if self.request.expects_continue() && self.request.protocol() == Protocol::Http11 {
            self.transport.write_all(CONTINUE).await.map_err(SendError::io)?;
            info!("receive expect request header, sent continue response");
        }

        let (sender, body) = ReqBody::gateway();
        self.request.set_body(body);

        let (response, pumped) = {
            let mut pump = BodyPump {
                transport: &mut self.transport,
                decoder: PayloadDecoder::new(self.request.payload_size(), self.limits.max_chunk_size),
                content: self.request.content_encoding().and_then(|token| self.decoders.decoder(token)),
                sender: Some(sender),
                buf: Bytes::new(),
            };
            let pumping = pump.run();
            tokio::pin!(pumping);

            let mut handling = handler.call(&mut self.request);
            let mut pumped = None;
            let response = loop {
                select! {
                    // the handler goes first: once it answered, the rest of the body is discarded
                    biased;
                    response = &mut handling => break response,
                    result = &mut pumping, if pumped.is_none() => pumped = Some(result),
                }
            };
            drop(handling);

            // release a pump still waiting on the handler and read the body to its end
            self.request.body_mut().finalize();
            let pumped = match pumped {
                Some(result) => result,
                None => pumping.await,
            };
            (response, pumped)
        };

        match pumped {
            Ok(()) => {
                self.parser.finish_body();
                self.respond(&response).await
            }
            Err(e) => self.fail(e).await.map(|()| Exchange::Close),
        }
    }

    /// Renders `response` and reports whether the connection stays open.
    async fn respond(&mut self, response: &Response) -> Result<Exchange, HttpError> {
        let closes = response.headers().get("connection").is_some_and(|value| value.eq_ignore_ascii_case("close"));
        let keep_alive = self.request.keep_alive() && !closes;
        let protocol = self.request.protocol();
        let head_only = self.request.method() == Method::Head;

        self.send(protocol, response, head_only, keep_alive).await?;
        Ok(if keep_alive { Exchange::Continue } else { Exchange::Close })
    }

    /// Ends the connection for `e`: protocol errors are answered first, transport errors are not.
    async fn fail(&mut self, e: ParseError) -> Result<(), HttpError> {
        match e.status() {
            Some(status) => {
                warn!(cause = %e, status = status.as_u16(), "rejecting request");
                let response = Response::error(status);
                // the parser position is undefined past the error, close in any case
                self.send(self.request.protocol(), &response, false, false).await?;
            }
            None => error!(cause = %e, "connection failed, dropping request"),
        }
        Err(e.into())
    }

    async fn send(&mut self, protocol: Protocol, response: &Response, head_only: bool, keep_alive: bool) -> Result<(), SendError> {
        let connection = match (keep_alive, protocol) {
            (false, _) => Some("close"),
            (true, Protocol::Http10) => Some("keep-alive"),
            (true, Protocol::Http11) => None,
        };

        self.out.clear();
        self.renderer.encode(Outgoing { protocol, response, head_only, connection }, &mut self.out)?;
        trace!(status = response.status().as_u16(), bytes = self.out.len(), "sending response");

        self.transport.write_all(&self.out).await.map_err(|e| {
            error!(cause = %e, "can't send response");
            SendError::io(e)
        })
    }
}

/// Parsing role of a request with a body: decodes the body off the wire and hands it to the
/// gateway, or discards it once the handler stopped listening.
struct BodyPump<'t, R, W> {
    transport: &'t mut Transport<R, W>,
    decoder: PayloadDecoder,
    content: Option<Box<dyn ContentDecoder>>,
    sender: Option<ReqBodySender>,
    buf: Bytes,
}

impl<R, W> BodyPump<'_, R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Reads the body to its end and delivers the terminal signal to the consumer.
    async fn run(&mut self) -> Result<(), ParseError> {
        let result = self.pump().await;
        if let Some(sender) = self.sender.take() {
            sender.finish(result.as_ref().err().cloned());
        }
        result
    }

    async fn pump(&mut self) -> Result<(), ParseError> {
        loop {
            match self.decoder.decode(&mut self.buf)? {
                Some(PayloadItem::Chunk(bytes)) => {
                    if self.sender.is_some() {
                        let decoded = self.decode_content(bytes)?;
                        self.forward(decoded).await;
                    }
                }
                Some(PayloadItem::Eof) => {
                    if self.sender.is_some() {
                        let tail = self.finish_content()?;
                        self.forward(tail).await;
                    }
                    // the next pipelined request
                    self.transport.push_back(mem::take(&mut self.buf));
                    return Ok(());
                }
                None => {
                    let data = self.transport.read().await.map_err(ParseError::io)?;
                    ensure!(!data.is_empty(), ParseError::ConnectionClosed);
                    self.buf = join(mem::take(&mut self.buf), data);
                }
            }
        }
    }

    async fn forward(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        if let Some(sender) = self.sender.as_mut() {
            if sender.send(bytes).await.is_err() {
                trace!("handler stopped reading the body, discarding the rest");
                self.sender = None;
            }
        }
    }

    fn decode_content(&mut self, bytes: Bytes) -> Result<Bytes, ParseError> {
        match self.content.as_mut() {
            Some(decoder) => decoder.decode(bytes).map_err(|e| ParseError::bad_request(format!("can't decode body: {e}"))),
            None => Ok(bytes),
        }
    }

    fn finish_content(&mut self) -> Result<Bytes, ParseError> {
        match self.content.as_mut() {
            Some(decoder) => decoder.finish().map_err(|e| ParseError::bad_request(format!("can't decode body: {e}"))),
            None => Ok(Bytes::new()),
        }
    }
}

fn join(head: Bytes, tail: Bytes) -> Bytes {
    if head.is_empty() {
        return tail;
    }
    let mut joined = BytesMut::with_capacity(head.len() + tail.len());
    joined.extend_from_slice(&head);
    joined.extend_from_slice(&tail);
    joined.freeze()
}
