//! Companion service backend
//!
//! Discovery and messaging use short UDP datagrams on the factory
//! segment; throughput runs through `iperf3` against the companion's
//! endpoint. Wire framing stays in this file.

use crate::companion::{Companion, MessageKind, PrintChannel};
use crate::error::HalError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::process::Command;

const DISCOVER_TIMEOUT: Duration = Duration::from_secs(1);

/// UDP client for the companion service
#[derive(Debug)]
pub struct UdpCompanion {
    service_port: u16,
    last_server: Mutex<Option<IpAddr>>,
    board: String,
}

impl UdpCompanion {
    /// Client for a companion listening on `service_port`
    #[must_use]
    pub fn new(service_port: u16, board: impl Into<String>) -> Self {
        Self {
            service_port,
            last_server: Mutex::new(None),
            board: board.into(),
        }
    }

    fn kind_tag(kind: MessageKind) -> &'static str {
        match kind {
            MessageKind::Error => "ERR",
            MessageKind::Identity => "MAC",
            MessageKind::Udp => "UDP",
        }
    }

    fn channel_tag(channel: PrintChannel) -> &'static str {
        match channel {
            PrintChannel::Left => "0",
            PrintChannel::Right => "1",
        }
    }
}

#[async_trait]
impl Companion for UdpCompanion {
    async fn local_addr(&self) -> Option<IpAddr> {
        // connect() picks the outgoing interface without sending anything
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
        socket
            .connect((Ipv4Addr::new(8, 8, 8, 8), 53))
            .await
            .ok()?;
        socket.local_addr().ok().map(|addr| addr.ip())
    }

    async fn discover(&self) -> Option<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
        socket.set_broadcast(true).ok()?;
        socket
            .send_to(
                format!("JIG:PING:{}", self.board).as_bytes(),
                (Ipv4Addr::BROADCAST, self.service_port),
            )
            .await
            .ok()?;

        let mut buf = [0u8; 64];
        let reply = tokio::time::timeout(DISCOVER_TIMEOUT, socket.recv_from(&mut buf)).await;
        match reply {
            Ok(Ok((_, src))) => {
                *self.last_server.lock() = Some(src.ip());
                Some(src.ip())
            }
            _ => None,
        }
    }

    async fn request_identity(&self, board: &str) -> Result<String, HalError> {
        let server = self
            .last_server
            .lock()
            .ok_or_else(|| HalError::NotPresent("companion server".to_owned()))?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket
            .send_to(
                format!("JIG:REQ:UUID:{board}").as_bytes(),
                SocketAddr::new(server, self.service_port),
            )
            .await?;

        let mut buf = [0u8; 128];
        let (len, _) = tokio::time::timeout(DISCOVER_TIMEOUT, socket.recv_from(&mut buf))
            .await
            .map_err(|_| HalError::Timeout(DISCOVER_TIMEOUT))??;
        let token = String::from_utf8_lossy(&buf[..len]).trim().to_owned();
        if token.is_empty() {
            return Err(HalError::Parse("empty identity reply".to_owned()));
        }
        Ok(token)
    }

    async fn send(
        &self,
        server: IpAddr,
        kind: MessageKind,
        payload: &str,
        channel: PrintChannel,
    ) -> Result<(), HalError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        let frame = format!(
            "JIG:{}:{}:{payload}",
            Self::kind_tag(kind),
            Self::channel_tag(channel)
        );
        socket
            .send_to(frame.as_bytes(), SocketAddr::new(server, self.service_port))
            .await?;
        Ok(())
    }

    async fn throughput(&self, server: IpAddr) -> Result<i64, HalError> {
        let output = Command::new("iperf3")
            .arg("-c")
            .arg(server.to_string())
            .args(["-u", "-b", "1000M", "-t", "2", "-f", "m"])
            .output()
            .await?;
        if !output.status.success() {
            return Err(HalError::command("iperf3", output.status.to_string()));
        }
        parse_mbits(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Last `N Mbits/sec` figure in an iperf3 report
fn parse_mbits(stdout: &str) -> Result<i64, HalError> {
    for line in stdout.lines().rev() {
        if let Some(idx) = line.find("Mbits/sec") {
            let rate = line[..idx]
                .rsplit(char::is_whitespace)
                .find(|s| !s.is_empty())
                .unwrap_or("");
            if let Ok(value) = rate.parse::<f64>() {
                return Ok(value as i64);
            }
        }
    }
    Err(HalError::Parse(stdout.trim().to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mbits_parses_summary_line() {
        let stdout = "[ ID] Interval  Transfer  Bitrate\n\
                      [  5] 0.00-2.00 sec  225 MBytes  941 Mbits/sec  receiver\n";
        assert_eq!(parse_mbits(stdout).unwrap(), 941);
    }

    #[test]
    fn mbits_rejects_empty_report() {
        assert!(parse_mbits("connection refused").is_err());
    }
}
