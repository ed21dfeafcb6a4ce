//! Training log streaming.
//!
//! The server pushes one text frame per log line over `ws/logs`. The client
//! keeps every line it receives in arrival order; there is no reconnection
//! and no eviction.

use std::fmt;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::client::DashboardClient;
use crate::error::{Error, Result};
use crate::model::{BenchmarkConfig, TrainingStarted};

/// Something observed on the log socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A log line.
    Line(String),
    /// The socket failed; no further events follow.
    Error(String),
    /// The socket closed, with the close code when the server sent one.
    Closed {
        /// WebSocket close code.
        code: Option<u16>,
    },
}

/// An open training log WebSocket.
pub struct LogStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    finished: bool,
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl LogStream {
    /// Connect to the log stream at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the WebSocket handshake fails.
    pub async fn connect(url: &Url) -> Result<Self> {
        debug!(%url, "Connecting to log stream");
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        info!(%url, "Log stream connected");
        Ok(Self {
            socket,
            finished: false,
        })
    }

    /// Wait for the next event. Returns `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<LogEvent> {
        if self.finished {
            return None;
        }

        loop {
            match self.socket.next().await {
                Some(Ok(Message::Text(text))) => return Some(LogEvent::Line(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    return Some(LogEvent::Line(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    self.finished = true;
                    return Some(LogEvent::Closed {
                        code: frame.map(|f| u16::from(f.code)),
                    });
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    self.finished = true;
                    warn!(error = %err, "Log stream failed");
                    return Some(LogEvent::Error(err.to_string()));
                }
                None => {
                    self.finished = true;
                    return Some(LogEvent::Closed { code: None });
                }
            }
        }
    }
}

/// Append-only list of log lines, as shown in the training console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConsole {
    lines: Vec<String>,
}

impl LogConsole {
    /// Create an empty console.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw log line.
    pub fn push(&mut self, line: impl Into<String>) -> &str {
        self.lines.push(line.into());
        self.lines.last().map_or("", String::as_str)
    }

    /// Append a client-side marker line, e.g. `--- Training Started ---`.
    pub fn marker(&mut self, text: &str) -> &str {
        self.push(format!("--- {text} ---"))
    }

    /// Record a stream event. Returns `false` once the stream has ended.
    pub fn record(&mut self, event: &LogEvent) -> bool {
        match event {
            LogEvent::Line(line) => {
                self.push(line.clone());
                true
            }
            LogEvent::Error(message) => {
                self.marker(&format!("WS Error: {message}"));
                false
            }
            LogEvent::Closed { code } => {
                let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
                self.marker(&format!("WS Closed (Code: {code})"));
                false
            }
        }
    }

    /// All lines in arrival order.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when nothing has been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A training run started from this client.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    started: TrainingStarted,
    console: LogConsole,
}

impl TrainingSession {
    /// Save `config` (when given) and start training.
    ///
    /// # Errors
    ///
    /// Returns an error if saving the configuration or starting the run
    /// fails, or [`Error::TrainingRejected`] when the server refuses because a
    /// run is already in progress.
    pub async fn start(client: &DashboardClient, config: Option<&BenchmarkConfig>) -> Result<Self> {
        if let Some(config) = config {
            client.save_config(config).await?;
        }

        let started = client.start_training().await?;
        if !started.is_started() {
            return Err(Error::TrainingRejected(
                started
                    .message
                    .unwrap_or_else(|| format!("status {}", started.status)),
            ));
        }

        info!(run_id = ?started.run_id, pid = ?started.pid, "Training started");
        let mut console = LogConsole::new();
        console.marker("Training Started");
        Ok(Self { started, console })
    }

    /// Run id assigned by the server.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.started.run_id.as_deref()
    }

    /// Process id of the training worker.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.started.pid
    }

    /// Console with every line seen so far.
    #[must_use]
    pub fn console(&self) -> &LogConsole {
        &self.console
    }

    /// Stream logs into the console until the socket closes, calling
    /// `on_line` for every line appended (markers included).
    ///
    /// Returns the close code sent by the server, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the log socket cannot be opened.
    pub async fn follow<F>(&mut self, client: &DashboardClient, mut on_line: F) -> Result<Option<u16>>
    where
        F: FnMut(&str),
    {
        let mut stream = match client.stream_logs().await {
            Ok(stream) => stream,
            Err(err) => {
                on_line(self.console.marker(&format!("Error: {err}")));
                return Err(err);
            }
        };
        on_line(self.console.marker("WS Connected"));

        while let Some(event) = stream.next_event().await {
            let open = self.console.record(&event);
            if let Some(last) = self.console.lines().last() {
                on_line(last);
            }
            if !open {
                if let LogEvent::Closed { code } = event {
                    return Ok(code);
                }
                return Ok(None);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::extract::ws::{CloseFrame, Message as AxumMessage, WebSocketUpgrade};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    async fn logs_handler(ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(|mut socket| async move {
            for line in ["Epoch 1/2 loss=0.5", "Epoch 2/2 loss=0.1"] {
                let _ = socket.send(AxumMessage::Text(line.to_string())).await;
            }
            let _ = socket
                .send(AxumMessage::Close(Some(CloseFrame {
                    code: 1000,
                    reason: "done".into(),
                })))
                .await;
        })
    }

    async fn spawn_server(train_status: &'static str) -> DashboardClient {
        let app = Router::new()
            .route("/ws/logs", get(logs_handler))
            .route("/config", post(|| async { Json(json!({"status": "success"})) }))
            .route(
                "/train",
                post(move || async move {
                    Json(json!({"status": train_status, "pid": 7, "run_id": "run_1", "message": "Training already in progress"}))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        DashboardClient::new(&format!("http://{addr}")).unwrap()
    }

    #[test]
    fn test_console_markers() {
        let mut console = LogConsole::new();
        assert!(console.is_empty());
        assert_eq!(console.marker("Training Started"), "--- Training Started ---");
        assert_eq!(console.push("epoch 1"), "epoch 1");
        assert_eq!(console.len(), 2);
    }

    #[test]
    fn test_console_record_events() {
        let mut console = LogConsole::new();
        assert!(console.record(&LogEvent::Line("a".to_string())));
        assert!(!console.record(&LogEvent::Error("reset".to_string())));
        assert!(!console.record(&LogEvent::Closed { code: Some(1006) }));
        assert!(!console.record(&LogEvent::Closed { code: None }));
        assert_eq!(
            console.lines(),
            &[
                "a".to_string(),
                "--- WS Error: reset ---".to_string(),
                "--- WS Closed (Code: 1006) ---".to_string(),
                "--- WS Closed (Code: none) ---".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_logs_in_order() {
        let client = spawn_server("started").await;
        let mut stream = client.stream_logs().await.unwrap();

        assert_eq!(
            stream.next_event().await,
            Some(LogEvent::Line("Epoch 1/2 loss=0.5".to_string()))
        );
        assert_eq!(
            stream.next_event().await,
            Some(LogEvent::Line("Epoch 2/2 loss=0.1".to_string()))
        );
        assert_eq!(
            stream.next_event().await,
            Some(LogEvent::Closed { code: Some(1000) })
        );
        assert_eq!(stream.next_event().await, None);
    }

    #[tokio::test]
    async fn test_training_session_follow() {
        let client = spawn_server("started").await;
        let config = BenchmarkConfig::default();
        let mut session = TrainingSession::start(&client, Some(&config)).await.unwrap();
        assert_eq!(session.run_id(), Some("run_1"));
        assert_eq!(session.pid(), Some(7));

        let mut seen = Vec::new();
        let code = session
            .follow(&client, |line| seen.push(line.to_string()))
            .await
            .unwrap();

        assert_eq!(code, Some(1000));
        assert_eq!(
            session.console().lines(),
            &[
                "--- Training Started ---".to_string(),
                "--- WS Connected ---".to_string(),
                "Epoch 1/2 loss=0.5".to_string(),
                "Epoch 2/2 loss=0.1".to_string(),
                "--- WS Closed (Code: 1000) ---".to_string(),
            ]
        );
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test]
    async fn test_training_session_rejected() {
        let client = spawn_server("error").await;
        let err = TrainingSession::start(&client, None).await.unwrap_err();
        assert!(matches!(err, Error::TrainingRejected(ref m) if m == "Training already in progress"));
    }
}
