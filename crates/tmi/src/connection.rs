//! WebSocket connection to the chat service.

use std::collections::VecDeque;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};

use crate::error::{Result, TmiError};
use crate::message::{ChatMessage, ServerMessage, normalize_channel, parse_line};

/// Production chat endpoint.
pub const CHAT_SERVER_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An authenticated connection to the chat service.
///
/// [`TmiConnection::connect`] performs the full handshake: capability
/// request, credentials, and waiting for the welcome numeric. Keepalive
/// probes from the server are answered internally; callers only see
/// channel traffic.
pub struct TmiConnection {
    ws: WsStream,
    login: String,
    pending: VecDeque<ServerMessage>,
}

impl TmiConnection {
    /// Connect and authenticate against the production endpoint.
    pub async fn connect(login: &str, token: &str) -> Result<Self> {
        Self::connect_to(CHAT_SERVER_URL, login, token).await
    }

    /// Connect and authenticate against an arbitrary endpoint.
    pub async fn connect_to(url: &str, login: &str, token: &str) -> Result<Self> {
        let (ws, _) = connect_async(url).await?;
        let mut conn = Self {
            ws,
            login: login.to_lowercase(),
            pending: VecDeque::new(),
        };

        // Tags carry badges and timestamps; commands carries RECONNECT.
        conn.send_line("CAP REQ :twitch.tv/tags twitch.tv/commands")
            .await?;
        conn.send_line(&format!("PASS {}", normalize_token(token)))
            .await?;
        conn.send_line(&format!("NICK {}", conn.login)).await?;

        conn.await_welcome().await?;
        debug!(login = %conn.login, "Chat login accepted");
        Ok(conn)
    }

    /// The login this connection authenticated as.
    pub fn login(&self) -> &str {
        &self.login
    }

    pub async fn join(&mut self, channel: &str) -> Result<()> {
        let channel = normalize_channel(channel);
        debug!(%channel, "Joining channel");
        self.send_line(&format!("JOIN #{channel}")).await
    }

    pub async fn part(&mut self, channel: &str) -> Result<()> {
        let channel = normalize_channel(channel);
        debug!(%channel, "Leaving channel");
        self.send_line(&format!("PART #{channel}")).await
    }

    /// Send a chat message to a channel.
    pub async fn send_message(&mut self, channel: &str, text: &str) -> Result<()> {
        let channel = normalize_channel(channel);
        let text = sanitize_outgoing(text);
        self.send_line(&format!("PRIVMSG #{channel} :{text}")).await
    }

    /// Next message from the server, `None` once the connection closes.
    ///
    /// Server keepalives are answered here and never surfaced.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>> {
        loop {
            if let Some(msg) = self.pending.pop_front() {
                match msg {
                    ServerMessage::Ping(payload) => {
                        self.send_line(&format!("PONG :{payload}")).await?;
                        continue;
                    }
                    other => return Ok(Some(other)),
                }
            }

            let frame = match self.ws.next().await {
                Some(frame) => frame?,
                None => return Ok(None),
            };

            match frame {
                Message::Text(text) => {
                    for line in text.lines().filter(|l| !l.trim().is_empty()) {
                        match parse_line(line) {
                            Ok(parsed) => self.pending.push_back(parsed),
                            Err(err) => warn!(error = %err, line, "Dropping unparseable line"),
                        }
                    }
                }
                Message::Ping(payload) => self.ws.send(Message::Pong(payload)).await?,
                Message::Close(_) => return Ok(None),
                _ => {}
            }
        }
    }

    /// Like [`next_message`](Self::next_message) but skipping everything
    /// except chat messages from other users.
    pub async fn next_chat_message(&mut self) -> Result<Option<ChatMessage>> {
        loop {
            match self.next_message().await? {
                Some(ServerMessage::Privmsg(msg)) => {
                    if msg.login == self.login {
                        continue;
                    }
                    return Ok(Some(msg));
                }
                Some(ServerMessage::Reconnect) => {
                    return Err(TmiError::connection("server requested reconnect"));
                }
                Some(other) => trace!(?other, "Ignoring non-chat line"),
                None => return Ok(None),
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }

    async fn await_welcome(&mut self) -> Result<()> {
        let handshake = async {
            loop {
                match self.next_message().await? {
                    Some(ServerMessage::Welcome) => return Ok(()),
                    Some(ServerMessage::Notice { text, .. })
                        if text.to_lowercase().contains("authentication failed") =>
                    {
                        return Err(TmiError::Auth(text));
                    }
                    Some(other) => trace!(?other, "Pre-welcome line"),
                    None => return Err(TmiError::connection("closed during login")),
                }
            }
        };
        tokio::time::timeout(LOGIN_TIMEOUT, handshake)
            .await
            .map_err(|_| TmiError::connection("login timed out"))?
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.ws.send(Message::Text(line.into())).await?;
        Ok(())
    }
}

/// Ensure the `oauth:` prefix credentials are sent with.
pub fn normalize_token(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("oauth:") {
        token.to_string()
    } else {
        format!("oauth:{token}")
    }
}

/// Line breaks in outgoing text would be read as separate commands.
fn sanitize_outgoing(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}
