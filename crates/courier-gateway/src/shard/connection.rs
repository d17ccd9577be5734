//! Websocket connection wrapper
//!
//! Splits the socket into a write half serialised behind a lock and a
//! single-consumer read half that decompresses binary frames and decodes
//! the op-coded JSON protocol.

use std::io::Read;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{CloseCode, GatewayMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read limit; guild-member chunks for large guilds are enormous
const READ_LIMIT: usize = 512 << 20;

/// Dial the gateway, returning the serialised write half and the read half
pub async fn connect(url: &str) -> GatewayResult<(GatewayWriter, GatewayReader)> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(READ_LIMIT);
    config.max_frame_size = Some(READ_LIMIT);

    let (stream, _response) = connect_async_with_config(url, Some(config), false).await?;
    let (sink, stream) = stream.split();

    Ok((
        GatewayWriter {
            sink: Mutex::new(sink),
        },
        GatewayReader { stream },
    ))
}

/// Write half; every frame goes through one lock so concurrent writers
/// (read loop, heartbeat timer, public operations) never interleave
pub struct GatewayWriter {
    sink: Mutex<SplitSink<WsStream, Message>>,
}

impl GatewayWriter {
    /// Send a frame as JSON text
    pub async fn send(&self, message: &GatewayMessage) -> GatewayResult<()> {
        let json = message.to_json()?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Send a close frame with the given code
    pub async fn close(&self, code: u16) -> GatewayResult<()> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Close(Some(CloseFrame {
            code: WsCloseCode::from(code),
            reason: "".into(),
        })))
        .await?;
        Ok(())
    }
}

/// Read half; single consumer by construction
pub struct GatewayReader {
    stream: SplitStream<WsStream>,
}

impl GatewayReader {
    /// Read the next gateway frame
    ///
    /// Returns `Ok(None)` when the stream ends without a gateway close
    /// code. Binary frames are zlib-compressed JSON and are inflated before
    /// decoding.
    pub async fn next(&mut self) -> GatewayResult<Option<GatewayMessage>> {
        loop {
            let message = match self.stream.next().await {
                Some(message) => message?,
                None => return Ok(None),
            };

            match message {
                Message::Text(text) => {
                    return Ok(Some(GatewayMessage::from_json(text.as_bytes())?));
                }
                Message::Binary(bytes) => {
                    let inflated = inflate(&bytes)?;
                    return Ok(Some(GatewayMessage::from_json(&inflated)?));
                }
                Message::Close(frame) => {
                    if let Some(code) =
                        frame.and_then(|f| CloseCode::from_u16(f.code.into()))
                    {
                        return Err(GatewayError::Closed(code));
                    }
                    return Ok(None);
                }
                // Ping/pong are answered by the protocol layer
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

/// Inflate a zlib-compressed frame
fn inflate(bytes: &[u8]) -> GatewayResult<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(bytes);
    let mut inflated = Vec::with_capacity(bytes.len() * 4);
    decoder.read_to_end(&mut inflated)?;
    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_inflate_roundtrip() {
        let payload = br#"{"op": 11}"#;
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let inflated = inflate(&compressed).unwrap();
        assert_eq!(inflated, payload);

        let msg = GatewayMessage::from_json(&inflated).unwrap();
        assert_eq!(msg.op, crate::protocol::OpCode::HeartbeatAck);
    }

    #[test]
    fn test_inflate_rejects_garbage() {
        assert!(inflate(b"not zlib").is_err());
    }

    #[test]
    fn test_read_limit_fits_member_chunks() {
        assert_eq!(READ_LIMIT, 536_870_912);
    }
}
