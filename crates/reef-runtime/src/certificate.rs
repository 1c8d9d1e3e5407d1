//! Certificate issuance workflow.
//!
//! Requests a DNS-validated certificate, publishes the validation record
//! into the domain's hosted zone, waits for the DNS change to propagate,
//! then waits for the certificate to leave pending validation. The ARN
//! returned by the initial request is reused throughout; re-running the
//! workflow without it would request a duplicate certificate.

use crate::error::Result;
use crate::provider::{CertificateAuthority, DnsZones};
use crate::wait::{self, Probe, WaitSettings};
use std::sync::Arc;
use tracing::info;

pub const ISSUED: &str = "ISSUED";
const PENDING_VALIDATION: &str = "PENDING_VALIDATION";

const DNS_SYNCED: &str = "INSYNC";
const DNS_PENDING: &str = "PENDING";

pub struct CertificateWorkflow {
    certificates: Arc<dyn CertificateAuthority>,
    dns: Arc<dyn DnsZones>,
}

impl CertificateWorkflow {
    pub fn new(certificates: Arc<dyn CertificateAuthority>, dns: Arc<dyn DnsZones>) -> Self {
        Self { certificates, dns }
    }

    /// Issues a validated certificate for `domain` and returns its ARN.
    pub async fn issue(&self, domain: &str, hosted_zone_id: &str) -> Result<String> {
        info!(domain, "requesting certificate");
        let request = self.certificates.request_certificate(domain).await?;

        info!(
            record = %request.validation_record.name,
            "publishing DNS validation record"
        );
        let change_id = self
            .dns
            .upsert_records(hosted_zone_id, std::slice::from_ref(&request.validation_record))
            .await?;

        // DNS change propagation is quick; certificate validation can take
        // many minutes, so it gets the long budget.
        let dns = Arc::clone(&self.dns);
        wait::wait_until(
            move || {
                let dns = Arc::clone(&dns);
                let change_id = change_id.clone();
                async move {
                    match dns.change_status(&change_id).await? {
                        status if status == DNS_PENDING => Ok(Probe::InProgress),
                        status => Ok(Probe::Status(status)),
                    }
                }
            },
            WaitSettings::short(),
            DNS_SYNCED,
        )
        .await?
        .expect_success(DNS_SYNCED)?;

        let certificates = Arc::clone(&self.certificates);
        let arn = request.arn.clone();
        wait::wait_until(
            move || {
                let certificates = Arc::clone(&certificates);
                let arn = arn.clone();
                async move {
                    match certificates.certificate_status(&arn).await? {
                        status if status == PENDING_VALIDATION => Ok(Probe::InProgress),
                        status => Ok(Probe::Status(status)),
                    }
                }
            },
            WaitSettings::long(),
            ISSUED,
        )
        .await?
        .expect_success(ISSUED)?;

        info!(domain, arn = %request.arn, "certificate issued");
        Ok(request.arn)
    }
}
