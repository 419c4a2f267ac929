use crate::remote::MarketingApi;
use crate::types::{SegmentId, SegmentName};
use std::sync::Arc;

/// Find-or-create for a single segment.
///
/// Never creates without a successful search first, so a name maps to at most
/// one segment. Failures are logged and reported as `None`: a registration
/// with fewer segments is still a registration.
#[derive(Clone)]
pub struct SegmentResolver {
    api: Arc<dyn MarketingApi>,
}

impl SegmentResolver {
    pub fn new(api: Arc<dyn MarketingApi>) -> Self {
        SegmentResolver { api }
    }

    pub async fn resolve_or_create(&self, name: &SegmentName) -> Option<SegmentId> {
        match self.api.search_segment(name).await {
            Ok(Some(id)) => {
                tracing::debug!(segment = %name, segment_id = %id, "segment exists");
                return Some(id);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(segment = %name, "segment search failed, skipping: {err}");
                return None;
            }
        }

        match self.api.create_segment(name).await {
            Ok(id) => {
                tracing::info!(segment = %name, segment_id = %id, "segment created");
                Some(id)
            }
            Err(err) => {
                tracing::warn!(segment = %name, "could not create segment: {err}");
                None
            }
        }
    }
}
