// illustrator-relay/src/panel/mod.rs
//
// Copyright (c) 2025 Arcella Team
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE>
// or the MIT license <LICENSE-MIT>, at your option.
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Terminal panel: one button and one status line.
//!
//! Enter (or `toggle`) presses the button, `logs [n]` prints recent
//! diagnostics, `quit` leaves. The line is redrawn on every state change.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::Result as RelayResult;
use crate::log;

const DEFAULT_LOG_LINES: usize = 20;

pub struct Panel {
    manager: ConnectionManager,
}

enum Input {
    Toggle,
    Logs(usize),
    Quit,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let mut words = line.split_whitespace();
    match words.next() {
        None | Some("toggle") => Input::Toggle,
        Some("logs") => Input::Logs(
            words
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_LOG_LINES),
        ),
        Some("quit") | Some("exit") => Input::Quit,
        Some(other) => Input::Unknown(other.to_string()),
    }
}

/// Label of the single button for `state`.
pub fn button_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "Connect",
        ConnectionState::Connecting | ConnectionState::Connected => "Disconnect",
    }
}

/// The panel line: button then status.
pub fn render(state: ConnectionState) -> String {
    format!("[ {} ]  {}", button_label(state), state)
}

impl Panel {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// The button. Connecting runs in its own task so a second press can
    /// cancel it; the outcome shows up as a state change.
    async fn press(&self) {
        match self.manager.state() {
            ConnectionState::Disconnected => {
                let manager = self.manager.clone();
                tokio::spawn(async move {
                    if let Err(e) = manager.connect().await {
                        tracing::warn!("Connect to {} failed: {}", manager.endpoint(), e);
                    }
                });
            }
            ConnectionState::Connecting | ConnectionState::Connected => self.manager.disconnect().await,
        }
    }

    /// Runs until `quit` or end of input.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> RelayResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut states = self.manager.subscribe();
        let mut lines = input.lines();

        write_line(&mut output, &render(*states.borrow_and_update())).await?;

        loop {
            tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    write_line(&mut output, &render(state)).await?;
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match parse_input(&line) {
                        Input::Toggle => self.press().await,
                        Input::Logs(n) => {
                            let recent = log::get_recent_logs(n);
                            if recent.is_empty() {
                                write_line(&mut output, "(no log lines)").await?;
                            }
                            for entry in recent.iter().rev() {
                                write_line(&mut output, entry).await?;
                            }
                        }
                        Input::Quit => break,
                        Input::Unknown(word) => {
                            write_line(&mut output, &format!("Unknown input {:?}: press Enter to toggle, `logs` or `quit`", word)).await?;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> RelayResult<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::BufReader;
    use tokio::time::timeout;

    use crate::commands::Dispatcher;
    use crate::host::MemoryHost;

    fn manager(endpoint: &str) -> ConnectionManager {
        let dispatcher = Dispatcher::standard(Arc::new(MemoryHost::new()), None);
        ConnectionManager::new(endpoint, "illustrator", dispatcher)
    }

    #[test]
    fn test_render_states() {
        assert_eq!(render(ConnectionState::Disconnected), "[ Connect ]  Disconnected");
        assert_eq!(render(ConnectionState::Connected), "[ Disconnect ]  Connected");
        assert_eq!(button_label(ConnectionState::Connecting), "Disconnect");
    }

    #[test]
    fn test_parse_input() {
        assert!(matches!(parse_input(""), Input::Toggle));
        assert!(matches!(parse_input("   "), Input::Toggle));
        assert!(matches!(parse_input("logs 5"), Input::Logs(5)));
        assert!(matches!(parse_input("logs"), Input::Logs(DEFAULT_LOG_LINES)));
        assert!(matches!(parse_input("quit"), Input::Quit));
        assert!(matches!(parse_input("dance"), Input::Unknown(ref w) if w == "dance"));
    }

    #[tokio::test]
    async fn test_panel_renders_and_quits() {
        let panel = Panel::new(manager("http://localhost:3001"));
        let mut output = Vec::new();

        panel.run(&b"logs\nquit\n"[..], &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("[ Connect ]  Disconnected\n"));
    }

    async fn expect_line<R: AsyncBufRead + Unpin>(lines: &mut tokio::io::Lines<R>, wanted: &str) {
        loop {
            match lines.next_line().await.unwrap() {
                Some(line) if line == wanted => return,
                Some(_) => continue,
                None => panic!("panel output ended before {:?}", wanted),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_connect_is_redrawn_as_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let manager = manager(&format!("http://127.0.0.1:{}", port));
        let panel = Panel::new(manager.clone());
        let (mut keys, input) = tokio::io::duplex(1024);
        let (output, screen) = tokio::io::duplex(4096);

        let user = async move {
            let mut lines = BufReader::new(screen).lines();
            expect_line(&mut lines, "[ Connect ]  Disconnected").await;
            keys.write_all(b"\n").await.unwrap();
            // Redrawn once the attempt has failed.
            expect_line(&mut lines, "[ Connect ]  Disconnected").await;
            keys.write_all(b"quit\n").await.unwrap();
        };

        let (result, ()) = timeout(Duration::from_secs(5), async {
            tokio::join!(panel.run(BufReader::new(input), output), user)
        })
        .await
        .unwrap();

        result.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_second_press_cancels_pending_connect() {
        // Accepts TCP but never answers the websocket handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let manager = manager(&format!("http://{}", listener.local_addr().unwrap()));
        let panel = Panel::new(manager.clone());
        let (mut keys, input) = tokio::io::duplex(1024);
        let (output, screen) = tokio::io::duplex(4096);

        let user = async move {
            let mut lines = BufReader::new(screen).lines();
            expect_line(&mut lines, "[ Connect ]  Disconnected").await;
            keys.write_all(b"\n").await.unwrap();
            expect_line(&mut lines, "[ Disconnect ]  Connecting").await;
            keys.write_all(b"\n").await.unwrap();
            expect_line(&mut lines, "[ Connect ]  Disconnected").await;
            keys.write_all(b"quit\n").await.unwrap();
        };

        let (result, ()) = timeout(Duration::from_secs(5), async {
            tokio::join!(panel.run(BufReader::new(input), output), user)
        })
        .await
        .unwrap();

        result.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        drop(listener);
    }
}
