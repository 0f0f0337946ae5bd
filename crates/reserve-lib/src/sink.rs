//! Report sinks
//!
//! A sink receives the finished report together with the delivery decision
//! and is responsible for rendering and transmitting it.

use anyhow::Result;
use async_trait::async_trait;

use crate::report::{Delivery, Report};

/// Trait for report delivery implementations
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Render and send the report
    ///
    /// With [`Delivery::ExpiryNoticeOnly`] only the expiring-reservations
    /// notice is sent.
    async fn deliver(&self, report: &Report, delivery: Delivery) -> Result<()>;
}

/// Hand the report to every sink in order, stopping at the first failure
pub async fn deliver_all(sinks: &[Box<dyn ReportSink>], report: &Report) -> Result<()> {
    for sink in sinks {
        sink.deliver(report, report.delivery).await?;
        tracing::info!(sink = sink.name(), delivery = %report.delivery, "Report delivered");
    }
    Ok(())
}
