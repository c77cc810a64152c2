//! TCP workload probe.
//!
//! Reachability is a timed connect against the instance address.
//! Activity is the number of ESTABLISHED sockets on the service port,
//! read from `/proc/net/tcp` and `/proc/net/tcp6` on the host the
//! watchdog shares with the workload.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::api::WorkloadProbe;
use crate::error::CloudError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP state code for ESTABLISHED in the proc net tables.
const TCP_ESTABLISHED: &str = "01";

/// Probe for a TCP workload on a fixed service port.
#[derive(Debug, Clone)]
pub struct PortProbe {
    port: u16,
}

impl PortProbe {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

impl WorkloadProbe for PortProbe {
    async fn reachable(&self, address: &str) -> bool {
        let target = (address, self.port);
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                debug!(%address, port = self.port, %error, "reachability check failed");
                false
            }
            Err(_) => {
                debug!(%address, port = self.port, "reachability check timed out");
                false
            }
        }
    }

    async fn active_sessions(&self) -> Result<u32, CloudError> {
        let mut sessions = 0;
        for path in ["/proc/net/tcp", "/proc/net/tcp6"] {
            match tokio::fs::read_to_string(path).await {
                Ok(table) => sessions += count_established(&table, self.port),
                // tcp6 may be absent when IPv6 is disabled.
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }
        }
        Ok(sessions)
    }
}

/// Count ESTABLISHED entries whose local port matches `port`.
///
/// Lines look like:
/// `  0: 0100007F:63DD 0100007F:A3F2 01 00000000:00000000 ...`
/// where the hex field after the colon in the local address is the port
/// and the third column is the socket state.
fn count_established(table: &str, port: u16) -> u32 {
    table
        .lines()
        .skip(1)
        .filter(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let (Some(local), Some(state)) = (fields.get(1), fields.get(3)) else {
                return false;
            };
            *state == TCP_ESTABLISHED
                && local
                    .rsplit(':')
                    .next()
                    .and_then(|hex| u16::from_str_radix(hex, 16).ok())
                    .is_some_and(|p| p == port)
        })
        .count() as u32
}
