//! Campaign settings URL construction.

use crate::types::CampaignId;
use anyhow::Result;
use url::Url;

/// Build the settings URL for one campaign from the template URL.
///
/// Sets the `campaignId` query parameter to the given id, replacing any
/// prior value; every other query parameter, the path, and the host are
/// preserved unchanged.
pub fn construct_campaign_url(template: &Url, campaign_id: &CampaignId) -> Url {
    let retained: Vec<(String, String)> = template
        .query_pairs()
        .filter(|(k, _)| k != "campaignId")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = template.clone();
    {
        let mut pairs = out.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("campaignId", campaign_id.as_str());
    }

    out
}

/// Parse the user-supplied template URL, with a readable error on garbage.
pub fn parse_template_url(raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("Invalid campaign settings URL `{}`: {}", raw, e))
}
