//! DNS record synchronization.
//!
//! The server record either points at the live instance or at a stable
//! placeholder. The placeholder matters: a stopped workload must still
//! resolve, because the resolution attempt itself is what the activity
//! feed observes to wake the workload back up. A short TTL keeps the
//! switchover fast after scale-up.

use drowse_core::{Config, RetryPolicy};
use tracing::info;

use crate::api::DnsApi;
use crate::error::CloudError;

/// Keeps the server record in step with the workload's address.
#[derive(Debug)]
pub struct RecordSync<D> {
    dns: D,
    zone: String,
    name: String,
    ttl_secs: u32,
    placeholder: String,
    retry: RetryPolicy,
}

impl<D: DnsApi> RecordSync<D> {
    pub fn new(dns: D, config: &Config) -> Self {
        Self {
            dns,
            zone: config.dns_zone.clone(),
            name: config.server_name.clone(),
            ttl_secs: config.dns_ttl_secs,
            placeholder: config.placeholder_ip.clone(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the record at a live instance address.
    pub async fn set_record(&self, address: &str) -> Result<(), CloudError> {
        self.upsert(address).await?;
        info!(name = %self.name, %address, "server record updated");
        Ok(())
    }

    /// Park the record on the placeholder address.
    pub async fn clear_record(&self) -> Result<(), CloudError> {
        self.upsert(&self.placeholder).await?;
        info!(name = %self.name, placeholder = %self.placeholder, "server record parked");
        Ok(())
    }

    async fn upsert(&self, address: &str) -> Result<(), CloudError> {
        self.retry
            .retry("dns upsert", || {
                self.dns
                    .upsert_record(&self.zone, &self.name, address, self.ttl_secs)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDns;
    use drowse_core::Config;

    fn test_config() -> Config {
        Config::from_vars(
            [
                ("CLUSTER", "c"),
                ("SERVICE", "s"),
                ("DNSZONE", "Z1"),
                ("SERVERNAME", "mc.example.com"),
                ("DNSTTL", "30"),
            ]
            .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn set_and_clear_record() {
        let dns = MemoryDns::new();
        let records = RecordSync::new(dns.clone(), &test_config());

        records.set_record("10.0.0.7").await.unwrap();
        assert_eq!(dns.record("Z1", "mc.example.com").as_deref(), Some("10.0.0.7"));
        assert_eq!(dns.record_ttl("Z1", "mc.example.com"), Some(30));

        records.clear_record().await.unwrap();
        assert_eq!(
            dns.record("Z1", "mc.example.com").as_deref(),
            Some("192.168.1.1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn upsert_retries_through_transient_failures() {
        let dns = MemoryDns::new();
        dns.fail_next_upserts(2);
        let records = RecordSync::new(dns.clone(), &test_config());

        records.set_record("10.0.0.7").await.unwrap();
        assert_eq!(dns.record("Z1", "mc.example.com").as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test(start_paused = true)]
    async fn upsert_gives_up_after_bounded_attempts() {
        let dns = MemoryDns::new();
        dns.fail_next_upserts(100);
        let records = RecordSync::new(dns.clone(), &test_config());

        assert!(records.set_record("10.0.0.7").await.is_err());
        assert!(dns.record("Z1", "mc.example.com").is_none());
    }
}
