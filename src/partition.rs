//! Splitting the campaign list across workers.

use crate::types::CampaignId;

/// Split `campaigns` into at most `workers` contiguous chunks of size
/// `ceil(len / workers)`, preserving order.
///
/// The final chunk may be shorter, and fewer than `workers` chunks are
/// returned when the campaign count does not fill them all. Empty input
/// yields no partitions.
pub fn partition_campaigns(campaigns: &[CampaignId], workers: usize) -> Vec<Vec<CampaignId>> {
    assert!(workers >= 1, "worker count must be at least 1");

    if campaigns.is_empty() {
        return Vec::new();
    }

    let size = campaigns.len().div_ceil(workers);
    campaigns.chunks(size).map(|c| c.to_vec()).collect()
}
