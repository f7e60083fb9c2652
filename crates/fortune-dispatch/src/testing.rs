//! In-memory connector and discovery used by the dispatch tests

use async_trait::async_trait;
use fortune_discovery::{Discover, DiscoveryMode, DiscoveryRequest, Resolution, ResolutionSource};
use fortune_link::{Connector, LinkError};
use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

/// How each simulated device behaves once connected
#[derive(Debug, Clone)]
pub struct DeviceScript {
    /// Text sent after a delay, before anything is received
    pub prompt: Option<(Duration, &'static str)>,
    /// Received bytes that make the device answer
    pub trigger: &'static [u8],
    pub reply: &'static str,
    /// Hang up right after replying
    pub close_after_reply: bool,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            prompt: None,
            trigger: b"status\n",
            reply: "uptime 5s\n",
            close_after_reply: false,
        }
    }
}

/// Accepts connections to `up` addresses and refuses everything else
#[derive(Default)]
pub struct FakeConnector {
    pub up: HashSet<String>,
    pub script: DeviceScript,
    /// Refuse once this many sessions have been served
    pub max_sessions: Option<usize>,
    /// Refuse this many connects before serving anything
    pub refuse_first: usize,
    pub connects: Mutex<Vec<String>>,
    pub written: Arc<Mutex<Vec<u8>>>,
    pub sessions: AtomicUsize,
}

impl FakeConnector {
    pub fn refusing() -> Self {
        Self::default()
    }

    pub fn serving(addresses: &[&str]) -> Self {
        Self {
            up: addresses.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Stream = DuplexStream;

    async fn connect(
        &self,
        address: &str,
        port: u16,
        _connect_timeout: Duration,
    ) -> Result<DuplexStream, LinkError> {
        let seen = {
            let mut connects = self.connects.lock().unwrap();
            connects.push(address.to_string());
            connects.len()
        };

        let exhausted = self
            .max_sessions
            .is_some_and(|max| self.sessions.load(Ordering::SeqCst) >= max);
        if seen <= self.refuse_first || !self.up.contains(address) || exhausted {
            return Err(LinkError::Connect {
                address: address.to_string(),
                port,
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            });
        }

        self.sessions.fetch_add(1, Ordering::SeqCst);
        let (client, device) = duplex(4096);
        tokio::spawn(run_device(device, self.script.clone(), self.written.clone()));
        Ok(client)
    }
}

async fn run_device(mut device: DuplexStream, script: DeviceScript, written: Arc<Mutex<Vec<u8>>>) {
    if let Some((delay, prompt)) = script.prompt {
        tokio::time::sleep(delay).await;
        let _ = device.write_all(prompt.as_bytes()).await;
    }

    let mut buf = [0u8; 256];
    loop {
        let n = match device.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let triggered = {
            let mut seen = written.lock().unwrap();
            seen.extend_from_slice(&buf[..n]);
            seen.ends_with(script.trigger)
        };
        if triggered {
            let _ = device.write_all(script.reply.as_bytes()).await;
            if script.close_after_reply {
                return;
            }
        }
    }
}

/// Discovery that answers from a script and counts calls per mode
#[derive(Default)]
pub struct ScriptedDiscovery {
    pub fast: Option<String>,
    pub full: Option<String>,
    pub fast_calls: AtomicUsize,
    pub full_calls: AtomicUsize,
}

impl ScriptedDiscovery {
    pub fn new(fast: Option<&str>, full: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            fast: fast.map(str::to_string),
            full: full.map(str::to_string),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> (usize, usize) {
        (
            self.fast_calls.load(Ordering::SeqCst),
            self.full_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl Discover for ScriptedDiscovery {
    async fn discover(&self, request: DiscoveryRequest) -> Option<Resolution> {
        let answer = match request.mode {
            DiscoveryMode::Fast => {
                self.fast_calls.fetch_add(1, Ordering::SeqCst);
                self.fast.clone()
            }
            DiscoveryMode::Full => {
                self.full_calls.fetch_add(1, Ordering::SeqCst);
                self.full.clone()
            }
        };
        answer.map(|address| Resolution {
            address,
            source: ResolutionSource::Scan,
        })
    }
}
