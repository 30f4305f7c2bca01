//! Companion service client
//!
//! The harness coordinates with exactly one companion peer on the
//! factory network: it supplies identity tokens, receives result and
//! label-print messages, and hosts the throughput-test endpoint. Only
//! the message kind and payload are meaningful to the engine; wire
//! framing belongs to the backend.

use crate::error::HalError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Message kinds understood by the companion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Failure report line
    Error,
    /// Provisioned identity for label printing
    Identity,
    /// Throughput-endpoint control (start/stop)
    Udp,
}

/// Label printer slot on the companion side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintChannel {
    /// Left jig slot
    Left,
    /// Right jig slot
    Right,
}

impl Default for PrintChannel {
    fn default() -> Self {
        Self::Left
    }
}

/// Client for the companion service
#[async_trait]
pub trait Companion: Send + Sync {
    /// Address of this board on the factory network
    async fn local_addr(&self) -> Option<IpAddr>;

    /// Locate the companion server; `None` when not found this attempt
    async fn discover(&self) -> Option<IpAddr>;

    /// Request a fresh identity token for `board` from the companion
    async fn request_identity(&self, board: &str) -> Result<String, HalError>;

    /// Deliver a message to the companion
    async fn send(
        &self,
        server: IpAddr,
        kind: MessageKind,
        payload: &str,
        channel: PrintChannel,
    ) -> Result<(), HalError>;

    /// Measure throughput against the companion endpoint, Mbit/s
    async fn throughput(&self, server: IpAddr) -> Result<i64, HalError>;
}
