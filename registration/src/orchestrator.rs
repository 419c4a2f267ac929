use crate::background::{BackgroundJob, BackgroundQueue};
use crate::config::BatchPolicy;
use crate::planner::SegmentationPlan;
use crate::remote::MarketingApi;
use crate::segments::SegmentResolver;
use crate::types::{ContactId, SegmentId, SegmentName};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// What happened to the part of the plan handled before responding.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome {
    pub resolved_immediate: Vec<SegmentId>,
    pub subscribed: bool,
    pub background_scheduled: bool,
}

/// Result of running one batch of segment names for a contact.
#[derive(Debug, Default)]
pub(crate) struct BatchReport {
    pub resolved: Vec<SegmentId>,
    pub skipped: Vec<SegmentName>,
    pub subscribed: bool,
}

/// Resolves every name in order, then subscribes the contact to everything
/// that resolved in a single call. `delay` separates consecutive API
/// operations. Failures are logged and skipped; the batch always completes.
pub(crate) async fn run_batch(
    resolver: &SegmentResolver,
    api: &dyn MarketingApi,
    contact: &ContactId,
    names: &[SegmentName],
    delay: Duration,
) -> BatchReport {
    let mut report = BatchReport::default();

    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            sleep(delay).await;
        }
        match resolver.resolve_or_create(name).await {
            Some(id) => report.resolved.push(id),
            None => report.skipped.push(name.clone()),
        }
    }

    if report.resolved.is_empty() {
        return report;
    }

    sleep(delay).await;
    match api.subscribe(contact, &report.resolved).await {
        Ok(()) => {
            tracing::info!(
                contact_id = %contact,
                segments = report.resolved.len(),
                "contact subscribed to segments"
            );
            report.subscribed = true;
        }
        Err(err) => {
            tracing::warn!(contact_id = %contact, "could not subscribe contact: {err}");
        }
    }

    report
}

/// Assigns a contact to the segments of a plan: the head of the plan before
/// returning, the rest on the background queue.
#[derive(Clone)]
pub struct BatchOrchestrator {
    api: Arc<dyn MarketingApi>,
    resolver: SegmentResolver,
    policy: BatchPolicy,
    background: BackgroundQueue,
}

impl BatchOrchestrator {
    pub fn new(api: Arc<dyn MarketingApi>, policy: BatchPolicy, background: BackgroundQueue) -> Self {
        BatchOrchestrator {
            resolver: SegmentResolver::new(api.clone()),
            api,
            policy,
            background,
        }
    }

    pub async fn process(&self, plan: SegmentationPlan, contact: &ContactId) -> BatchOutcome {
        let (immediate, remainder) = plan.split(self.policy.immediate_cap);

        let report = run_batch(
            &self.resolver,
            self.api.as_ref(),
            contact,
            &immediate,
            self.policy.immediate_delay(),
        )
        .await;

        if !report.skipped.is_empty() {
            tracing::warn!(
                contact_id = %contact,
                skipped = ?report.skipped,
                "some segments could not be resolved"
            );
        }

        let background_scheduled = !remainder.is_empty()
            && self.background.submit(BackgroundJob {
                contact: contact.clone(),
                segments: remainder,
            });

        BatchOutcome {
            resolved_immediate: report.resolved,
            subscribed: report.subscribed,
            background_scheduled,
        }
    }
}
