use std::future::poll_fn;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};

use futures::channel::{mpsc, oneshot};
use futures::{SinkExt, StreamExt};

use http_body::{Body, Frame, SizeHint};
use tracing::trace;

use crate::protocol::ParseError;

/// One slot of the rendezvous: a body span with its acknowledgement, or the terminal signal.
enum BodyFrame {
    Data(Bytes, oneshot::Sender<()>),
    End(Option<ParseError>),
}

/// Consumer side of the body gateway, handed to request handlers.
///
/// The producer ([`ReqBodySender`]) cannot run more than one span ahead: every span carries a
/// oneshot acknowledgement that is fired when the consumer asks for the next span, and the
/// producer waits for it before reading further from the wire.
///
/// `ReqBody` also implements [`http_body::Body`], so the usual `http_body_util::BodyExt`
/// combinators work on it.
#[derive(Debug)]
pub struct ReqBody {
    frames: Option<mpsc::Receiver<BodyFrame>>,
    pending_ack: Option<oneshot::Sender<()>>,
}

/// Producer side of the body gateway, driven by the connection's body pump.
#[derive(Debug)]
pub struct ReqBodySender {
    frames: mpsc::Sender<BodyFrame>,
}

/// Returned by [`ReqBodySender::send`] once the consumer is gone or has been finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayClosed;

impl ReqBody {
    /// Creates a connected gateway pair for one request body.
    pub fn gateway() -> (ReqBodySender, ReqBody) {
        // a zero buffer leaves exactly one slot for the single sender
        let (tx, rx) = mpsc::channel(0);
        (ReqBodySender { frames: tx }, ReqBody { frames: Some(rx), pending_ack: None })
    }

    /// A body that has already ended, for requests without a body phase.
    pub fn empty() -> Self {
        Self { frames: None, pending_ack: None }
    }

    /// Receives the next span of the body.
    ///
    /// Acknowledges the previously received span first. Returns `Ok(None)` once the body ended
    /// cleanly; a decoding or transport failure is returned once as `Err`, after which the body
    /// reports its end.
    pub async fn receive(&mut self) -> Result<Option<Bytes>, ParseError> {
        poll_fn(|cx| self.poll_receive(cx)).await
    }

    fn poll_receive(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Bytes>, ParseError>> {
        if let Some(ack) = self.pending_ack.take() {
            let _ = ack.send(());
        }

        let Some(frames) = self.frames.as_mut() else {
            return Poll::Ready(Ok(None));
        };

        match ready!(frames.poll_next_unpin(cx)) {
            Some(BodyFrame::Data(bytes, ack)) => {
                self.pending_ack = Some(ack);
                Poll::Ready(Ok(Some(bytes)))
            }
            Some(BodyFrame::End(None)) => {
                self.frames = None;
                Poll::Ready(Ok(None))
            }
            Some(BodyFrame::End(Some(e))) => {
                self.frames = None;
                Poll::Ready(Err(e))
            }
            None => {
                self.frames = None;
                Poll::Ready(Err(ParseError::ConnectionClosed))
            }
        }
    }

    /// Releases the producer without consuming the rest of the body.
    ///
    /// Fires the outstanding acknowledgement (if any) and closes the gateway, so a producer
    /// blocked on this consumer resumes and sees [`GatewayClosed`]. Called by the connection
    /// once the handler has returned.
    pub fn finalize(&mut self) {
        if let Some(ack) = self.pending_ack.take() {
            let _ = ack.send(());
        }
        if let Some(mut frames) = self.frames.take() {
            frames.close();
            trace!("finalized request body gateway");
        }
    }

    /// Whether the terminal signal has been observed (or there never was a body).
    pub fn is_finished(&self) -> bool {
        self.frames.is_none()
    }

    /// Collects the remaining body into one buffer.
    pub async fn bytes(&mut self) -> Result<Bytes, ParseError> {
        let mut buf = BytesMut::new();
        while let Some(span) = self.receive().await? {
            buf.extend_from_slice(&span);
        }
        Ok(buf.freeze())
    }

    /// Collects the remaining body as UTF-8 text.
    pub async fn text(&mut self) -> Result<String, ParseError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.into()).map_err(|e| ParseError::bad_request(format!("body is not utf-8: {e}")))
    }
}

impl Default for ReqBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for ReqBody {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl ReqBodySender {
    /// Hands one span to the consumer and waits for its acknowledgement.
    pub async fn send(&mut self, bytes: Bytes) -> Result<(), GatewayClosed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.frames.send(BodyFrame::Data(bytes, ack_tx)).await.map_err(|_disconnected| GatewayClosed)?;
        ack_rx.await.map_err(|_canceled| GatewayClosed)
    }

    /// Delivers the terminal signal: `None` for a clean end, `Some(e)` for a failure.
    ///
    /// Does not wait for the consumer to observe it.
    pub fn finish(mut self, error: Option<ParseError>) {
        if self.frames.try_send(BodyFrame::End(error)).is_err() {
            trace!("request body consumer gone before the terminal signal");
        }
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(this.poll_receive(cx)) {
            Ok(Some(bytes)) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Ok(None) => Poll::Ready(None),
            Err(e) => Poll::Ready(Some(Err(e))),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.is_finished()
    }

    fn size_hint(&self) -> SizeHint {
        if self.is_finished() { SizeHint::with_exact(0) } else { SizeHint::default() }
    }
}

impl std::fmt::Debug for BodyFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BodyFrame::Data(bytes, _) => f.debug_tuple("Data").field(&bytes.len()).finish(),
            BodyFrame::End(error) => f.debug_tuple("End").field(error).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn spans_arrive_in_order_then_clean_end() {
        let (mut sender, mut body) = ReqBody::gateway();

        let producer = tokio::spawn(async move {
            sender.send(Bytes::from_static(b"hello ")).await.unwrap();
            sender.send(Bytes::from_static(b"world")).await.unwrap();
            sender.finish(None);
        });

        assert_eq!(body.text().await.unwrap(), "hello world");
        assert!(body.is_finished());
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn producer_waits_for_acknowledgement() {
        let (mut sender, mut body) = ReqBody::gateway();

        let producer = tokio::spawn(async move {
            sender.send(Bytes::from_static(b"a")).await.unwrap();
            sender
        });

        assert_eq!(body.receive().await.unwrap(), Some(Bytes::from_static(b"a")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        // the span was taken but not acknowledged yet
        assert!(!producer.is_finished());

        // asking for the next span acknowledges the previous one
        let (next, ()) = tokio::join!(body.receive(), async {
            let sender = producer.await.unwrap();
            sender.finish(None);
        });
        assert_eq!(next.unwrap(), None);
    }

    #[tokio::test]
    async fn terminal_error_reaches_consumer_once() {
        let (mut sender, mut body) = ReqBody::gateway();

        tokio::spawn(async move {
            sender.send(Bytes::from_static(b"partial")).await.unwrap();
            sender.finish(Some(ParseError::ConnectionClosed));
        });

        assert_eq!(body.receive().await.unwrap(), Some(Bytes::from_static(b"partial")));
        assert!(matches!(body.receive().await, Err(ParseError::ConnectionClosed)));
        assert_eq!(body.receive().await.unwrap(), None);
    }

    #[tokio::test]
    async fn finalize_releases_blocked_producer() {
        let (mut sender, mut body) = ReqBody::gateway();

        let producer = tokio::spawn(async move {
            let first = sender.send(Bytes::from_static(b"one")).await;
            let second = sender.send(Bytes::from_static(b"two")).await;
            (first, second)
        });

        assert_eq!(body.receive().await.unwrap(), Some(Bytes::from_static(b"one")));
        body.finalize();

        let (first, second) = timeout(Duration::from_secs(1), producer).await.unwrap().unwrap();
        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(GatewayClosed));
        assert!(body.is_finished());
    }

    #[tokio::test]
    async fn finalize_without_any_receive() {
        let (mut sender, mut body) = ReqBody::gateway();

        let producer = tokio::spawn(async move { sender.send(Bytes::from_static(b"ignored")).await });

        tokio::task::yield_now().await;
        body.finalize();

        assert_eq!(timeout(Duration::from_secs(1), producer).await.unwrap().unwrap(), Err(GatewayClosed));
    }

    #[tokio::test]
    async fn body_trait_collects() {
        let (mut sender, body) = ReqBody::gateway();

        tokio::spawn(async move {
            for part in ["a", "b", "c"] {
                sender.send(Bytes::from(part)).await.unwrap();
            }
            sender.finish(None);
        });

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"abc");
    }

    #[tokio::test]
    async fn empty_body_ends_immediately() {
        let mut body = ReqBody::empty();
        assert!(body.is_finished());
        assert_eq!(body.receive().await.unwrap(), None);
    }
}
