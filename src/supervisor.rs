//! Connection supervisor: owns the OKX WebSocket lifecycle, the capped
//! exponential reconnect backoff, and the inactivity watchdog. Drives the
//! transaction parser on every received frame.

use std::sync::Arc;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::{SinkExt, StreamExt};
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::SupervisorError;
use crate::history::SymbolHistory;
use crate::model::{SYMBOL_COUNT, SYMBOLS};
use crate::parser::parse_and_dispatch;
use crate::queue::TradeQueue;

const HOST: &str = "ws.okx.com";
const PORT: u16 = 8443;
const PATH: &str = "/ws/v5/public";
const ORIGIN: &str = "https://www.okx.com";
const SUBPROTOCOL: &str = "okx-protocol";

const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;
const PING_INTERVAL_SECS: u64 = 60;
const INACTIVITY_TIMEOUT_SECS: u64 = 90;

const TCP_KEEPALIVE_TIME_SECS: u64 = 10;
const TCP_KEEPALIVE_INTERVAL_SECS: u64 = 5;
const TCP_KEEPALIVE_PROBES: u32 = 3;

/// Double `current`, capped at 60s. Pure so the backoff schedule (§8:
/// `2, 4, 8, 16, 32, 60, 60, …`) is unit-testable without a socket.
fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(Duration::from_secs(MAX_BACKOFF_SECS))
}

fn build_subscribe_frame() -> String {
    let args: Vec<String> = SYMBOLS
        .iter()
        .map(|s| format!(r#"{{"channel":"trades","instId":"{s}"}}"#))
        .collect();
    format!(r#"{{"op":"subscribe","args":[{}]}}"#, args.join(","))
}

fn apply_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(TCP_KEEPALIVE_TIME_SECS))
        .with_interval(Duration::from_secs(TCP_KEEPALIVE_INTERVAL_SECS))
        .with_retries(TCP_KEEPALIVE_PROBES);
    SockRef::from(stream).set_tcp_keepalive(&keepalive)
}

/// Run the supervisor until `cancel` fires: connect, subscribe, pump
/// protocol events, and reconnect with capped exponential backoff on any
/// transient failure. Returns once shutdown has been observed.
pub async fn run(queue: Arc<TradeQueue>, histories: Arc<[SymbolHistory; SYMBOL_COUNT]>, cancel: CancellationToken) {
    let mut backoff = Duration::from_secs(INITIAL_BACKOFF_SECS);

    while !cancel.is_cancelled() {
        match connect_and_pump(&queue, &histories, &cancel, &mut backoff).await {
            Ok(()) => break,
            Err(report) => {
                warn!(error = ?report, backoff_secs = backoff.as_secs(), "okx connection lost, reconnecting");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = next_backoff(backoff);
            }
        }
    }
}

/// Connect once, subscribe, and pump events until disconnection or shutdown.
/// `Ok(())` means `cancel` fired (graceful shutdown); `Err` means a
/// transient failure that should trigger a backed-off reconnect. `backoff` is
/// reset to the initial 2s as soon as the connection and subscribe succeed,
/// matching the original's "any success resets backoff" rule — a connection
/// that later drops after minutes of healthy traffic must not inherit the
/// backoff accumulated by earlier failed attempts.
async fn connect_and_pump(
    queue: &Arc<TradeQueue>,
    histories: &Arc<[SymbolHistory; SYMBOL_COUNT]>,
    cancel: &CancellationToken,
    backoff: &mut Duration,
) -> Result<(), Report<SupervisorError>> {
    let tcp = TcpStream::connect((HOST, PORT))
        .await
        .change_context(SupervisorError::Connection {
            host: HOST.into(),
            port: PORT,
        })?;

    apply_keepalive(&tcp).change_context(SupervisorError::Connection {
        host: HOST.into(),
        port: PORT,
    })?;

    // rustls-tls-native-roots loads the OS trust store, which on the target
    // deployment host resolves to exactly /etc/ssl/certs/ca-certificates.crt.
    let mut request = format!("wss://{HOST}:{PORT}{PATH}")
        .into_client_request()
        .change_context(SupervisorError::Connection {
            host: HOST.into(),
            port: PORT,
        })?;
    request
        .headers_mut()
        .insert("Origin", ORIGIN.parse().expect("static origin is valid"));
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        SUBPROTOCOL.parse().expect("static subprotocol is valid"),
    );

    let (ws_stream, _) = tokio_tungstenite::client_async_tls(request, tcp)
        .await
        .change_context(SupervisorError::Connection {
            host: HOST.into(),
            port: PORT,
        })?;

    info!(host = HOST, port = PORT, "connected to okx websocket");

    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(build_subscribe_frame().into()))
        .await
        .change_context(SupervisorError::Write)?;

    *backoff = Duration::from_secs(INITIAL_BACKOFF_SECS);

    let mut last_activity = Instant::now();
    let mut ping_timer = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping_timer.tick().await; // first tick fires immediately; skip it

    loop {
        let inactivity_deadline = last_activity + Duration::from_secs(INACTIVITY_TIMEOUT_SECS);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep_until(inactivity_deadline) => {
                return Err(Report::new(SupervisorError::Connection { host: HOST.into(), port: PORT })
                    .attach("inactivity timeout: no frame or pong in 90s"));
            }
            _ = ping_timer.tick() => {
                write.send(Message::Ping(Vec::new().into())).await
                    .change_context(SupervisorError::Write)?;
            }
            msg = read.next() => {
                match msg {
                    None => {
                        return Err(Report::new(SupervisorError::Connection { host: HOST.into(), port: PORT })
                            .attach("connection closed by peer"));
                    }
                    Some(Err(e)) => {
                        return Err(Report::new(SupervisorError::Connection { host: HOST.into(), port: PORT })
                            .attach(e.to_string()));
                    }
                    Some(Ok(Message::Text(text))) => {
                        parse_and_dispatch(&text, queue, histories).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Ok(text) = std::str::from_utf8(&bytes) {
                            parse_and_dispatch(text, queue, histories).await;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_then_resets() {
        let mut backoff = Duration::from_secs(INITIAL_BACKOFF_SECS);
        let expected = [2u64, 4, 8, 16, 32, 60, 60];
        for want in expected {
            assert_eq!(backoff, Duration::from_secs(want));
            backoff = next_backoff(backoff);
        }
        // A success resets the caller's local backoff variable to 2s, which
        // is just re-initializing; next_backoff itself is pure and stateless.
        backoff = Duration::from_secs(INITIAL_BACKOFF_SECS);
        assert_eq!(backoff, Duration::from_secs(2));
    }

    #[test]
    fn subscribe_frame_lists_all_eight_symbols() {
        let frame = build_subscribe_frame();
        assert!(frame.starts_with(r#"{"op":"subscribe","args":["#));
        for symbol in SYMBOLS {
            assert!(frame.contains(symbol), "missing {symbol} in {frame}");
        }
    }
}
