//! Input-event backend over evdev character devices
//!
//! A dedicated reader thread does the blocking reads and feeds a bounded
//! channel; `next` polls that channel under the configured bound so the
//! async side never blocks on the device.

use crate::error::HalError;
use crate::input::{InputEvent, InputStream};
use async_trait::async_trait;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

const EV_KEY: u16 = 0x01;
const EV_SW: u16 = 0x05;

// struct input_event on 64-bit: two u64 timestamps, type, code, value
const EVENT_SIZE: usize = 24;

/// Stream over one `/dev/input/eventN` device
#[derive(Debug)]
pub struct EvdevStream {
    rx: Mutex<mpsc::Receiver<InputEvent>>,
    poll: Duration,
}

impl EvdevStream {
    /// Open the device and start the reader thread
    pub fn open(path: impl AsRef<Path>, poll: Duration) -> Result<Self, HalError> {
        let mut file = std::fs::File::open(path.as_ref())?;
        let (tx, rx) = mpsc::channel(16);

        std::thread::spawn(move || {
            let mut buf = [0u8; EVENT_SIZE];
            loop {
                if file.read_exact(&mut buf).is_err() {
                    break;
                }
                if let Some(event) = decode(&buf) {
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            rx: Mutex::new(rx),
            poll,
        })
    }
}

#[async_trait]
impl InputStream for EvdevStream {
    async fn next(&self) -> Result<Option<InputEvent>, HalError> {
        let mut rx = self.rx.lock().await;
        match tokio::time::timeout(self.poll, rx.recv()).await {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                // reader thread is gone; keep the poll cadence
                tokio::time::sleep(self.poll).await;
                Err(HalError::NotPresent("input device".to_owned()))
            }
            Err(_) => Ok(None),
        }
    }
}

fn decode(buf: &[u8; EVENT_SIZE]) -> Option<InputEvent> {
    let kind = u16::from_ne_bytes([buf[16], buf[17]]);
    let code = u16::from_ne_bytes([buf[18], buf[19]]);
    let value = i32::from_ne_bytes([buf[20], buf[21], buf[22], buf[23]]);
    match kind {
        EV_KEY => Some(InputEvent::Key { code }),
        EV_SW => Some(InputEvent::Switch {
            code,
            engaged: value != 0,
        }),
        _ => None,
    }
}
