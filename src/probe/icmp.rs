//! ICMP echo probing facility.
//!
//! Sends one echo request per interval to the resolved target using
//! `surge-ping`, each awaited in its own task so slow replies never delay
//! the next request.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::probe::{
    EchoReply, ProbeConfig, ProbeError, ProbeEvent, ProbeFacility, ProbeRun, StatsRecorder,
};

/// ICMP echo header length in bytes.
const ICMP_HEADER_LEN: usize = 8;

/// Capacity of the event channel between the echo loop and the controller.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// ICMP echo probing facility.
///
/// surge-ping discards repeated replies, so this facility never emits
/// [`ProbeEvent::Duplicate`]; only other facilities produce it.
#[derive(Debug, Clone)]
pub struct IcmpFacility {
    reply_timeout: Duration,
    payload_size: usize,
}

impl IcmpFacility {
    /// Create a facility with explicit reply timeout and payload size.
    pub fn new(reply_timeout: Duration, payload_size: usize) -> Self {
        Self {
            reply_timeout,
            payload_size,
        }
    }

    /// Create a facility from the probe configuration.
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.reply_timeout, config.payload_size)
    }
}

/// Resolve hostname to IP address.
async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    // First, try to parse as an IP address directly
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    // Otherwise, resolve the hostname using tokio's DNS lookup
    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

#[async_trait::async_trait]
impl ProbeFacility for IcmpFacility {
    async fn start(
        &self,
        target: &str,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Result<ProbeRun, ProbeError> {
        let ip = resolve_host(target)
            .await
            .map_err(|source| ProbeError::Resolve {
                host: target.to_string(),
                source,
            })?;

        // Create ICMP client based on IP version
        let client = match ip {
            IpAddr::V4(_) => Client::new(&Config::default()),
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
        }
        .map_err(|e| ProbeError::Creation {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(host = %target, addr = %ip, interval = ?interval, "Starting ICMP probe");

        let stats = Arc::new(StatsRecorder::new(ip.to_string()));
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let echo_loop = EchoLoop {
            client,
            addr: ip,
            ident: PingIdentifier(rand::random()),
            interval,
            reply_timeout: self.reply_timeout,
            payload: Arc::from(vec![0u8; self.payload_size]),
            stats: Arc::clone(&stats),
            tx,
            cancel,
        };
        let task = tokio::spawn(echo_loop.run());

        Ok(ProbeRun {
            events: rx,
            stats,
            task,
        })
    }
}

struct EchoLoop {
    client: Client,
    addr: IpAddr,
    ident: PingIdentifier,
    interval: Duration,
    reply_timeout: Duration,
    payload: Arc<[u8]>,
    stats: Arc<StatsRecorder>,
    tx: mpsc::Sender<ProbeEvent>,
    cancel: CancellationToken,
}

impl EchoLoop {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight = JoinSet::new();
        let mut seq: i64 = 0;

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                Some(_) = in_flight.join_next() => continue,
                _ = ticker.tick() => {}
            }

            in_flight.spawn(echo_once(EchoRequest {
                client: self.client.clone(),
                addr: self.addr,
                ident: self.ident,
                seq,
                timeout: self.reply_timeout,
                payload: Arc::clone(&self.payload),
                stats: Arc::clone(&self.stats),
                tx: self.tx.clone(),
            }));
            seq += 1;
        }

        in_flight.abort_all();
        tracing::debug!(addr = %self.addr, sent = seq, "ICMP probe stopped");
    }
}

struct EchoRequest {
    client: Client,
    addr: IpAddr,
    ident: PingIdentifier,
    seq: i64,
    timeout: Duration,
    payload: Arc<[u8]>,
    stats: Arc<StatsRecorder>,
    tx: mpsc::Sender<ProbeEvent>,
}

async fn echo_once(req: EchoRequest) {
    let mut pinger = req.client.pinger(req.addr, req.ident).await;
    pinger.timeout(req.timeout);

    req.stats.record_sent();
    // Only the low 16 bits go on the wire; the logical sequence keeps counting
    let wire_seq = PingSequence(req.seq as u16);

    match pinger.ping(wire_seq, &req.payload).await {
        Ok((_packet, rtt)) => {
            req.stats.record_reply(rtt);
            let reply = EchoReply {
                seq: req.seq,
                rtt,
                bytes: req.payload.len() + ICMP_HEADER_LEN,
                addr: req.addr,
            };
            // Receiver gone means the session was replaced
            let _ = req.tx.send(ProbeEvent::Reply(reply)).await;
        }
        Err(e) => {
            tracing::trace!(addr = %req.addr, seq = req.seq, error = %e, "Echo request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_from_config() {
        let config = ProbeConfig::new("127.0.0.1")
            .with_reply_timeout(Duration::from_secs(2))
            .with_payload_size(32);
        let facility = IcmpFacility::from_config(&config);
        assert_eq!(facility.reply_timeout, Duration::from_secs(2));
        assert_eq!(facility.payload_size, 32);
    }

    #[tokio::test]
    async fn test_resolve_host_ipv4() {
        let ip = resolve_host("127.0.0.1").await.unwrap();
        assert_eq!(ip, IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)));
    }

    #[tokio::test]
    async fn test_resolve_host_ipv6() {
        let ip = resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(std::net::Ipv6Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_target() {
        let facility = IcmpFacility::new(Duration::from_secs(1), 56);
        let result = facility
            .start(
                "not a valid host!",
                Duration::from_millis(100),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ProbeError::Resolve { .. })));
    }
}
