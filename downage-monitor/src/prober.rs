//! Reachability probing
//!
//! A sample is "up" as soon as one of the configured servers answers:
//! - hosts are tried one at a time, in a fresh random order on every call
//! - the first success wins, remaining hosts are not probed
//! - a probe that cannot run (tool missing, timeout) counts as unreachable
//!
//! The default prober shells out to the platform `ping`, bounded by its own
//! timeout so a hung probe cannot stall the poll loop.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, warn};

/// Explicit probe timeout, independent of the platform ping default
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Single reachability check against one host
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &str) -> bool;
}

/// Returns true if any host answers, probing in random order and stopping at
/// the first success. Each host is probed at most once per call.
pub async fn some_host_reachable<P, R>(prober: &P, hosts: &[String], rng: &mut R) -> bool
where
    P: Prober + ?Sized,
    R: Rng + ?Sized,
{
    let mut order: Vec<&str> = hosts.iter().map(String::as_str).collect();
    order.shuffle(rng);

    for host in order {
        if prober.probe(host).await {
            debug!("{} reachable", host);
            return true;
        }
    }
    false
}

/// ICMP echo through the system `ping` binary
#[derive(Debug, Clone)]
pub struct PingProber {
    program: String,
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            timeout,
        }
    }

    /// Use another ping executable (absolute path or name looked up in PATH)
    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, host: &str) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        if cfg!(target_os = "windows") {
            let wait_ms = self.timeout.as_millis().to_string();
            cmd.args(["-n", "1", "-w", wait_ms.as_str(), host]);
        } else {
            // -W prend des secondes entières
            let wait_secs = self.timeout.as_secs().max(1).to_string();
            cmd.args(["-c", "1", "-W", wait_secs.as_str(), host]);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, host: &str) -> bool {
        debug!("Pinging {} (timeout: {:?})", host, self.timeout);

        // marge d'une seconde pour le démarrage du processus
        let deadline = self.timeout + Duration::from_secs(1);
        match tokio::time::timeout(deadline, self.command(host).status()).await {
            Ok(Ok(status)) if status.success() => true,
            Ok(Ok(status)) => {
                debug!("{} unreachable (ping exited with {})", host, status);
                false
            }
            Ok(Err(e)) => {
                warn!("Failed to run ping for {}: {}", host, e);
                false
            }
            Err(_) => {
                warn!("Ping to {} timed out after {:?}", host, deadline);
                false
            }
        }
    }
}
