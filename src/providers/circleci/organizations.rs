use log::{debug, info};

use super::api::CircleApi;
use super::types::OrgScope;
use crate::error::Result;

/// Decides which organizations to query this cycle.
///
/// A configured filter is used as-is without touching the network. Otherwise
/// the user's collaborations are listed once; errors from that call propagate
/// and are not retried.
pub async fn resolve_org_scopes<A: CircleApi>(
    api: &A,
    organization_filter: Option<&str>,
) -> Result<Vec<OrgScope>> {
    if let Some(slug) = organization_filter.map(str::trim).filter(|s| !s.is_empty()) {
        debug!("Using configured organization: {slug}");
        return Ok(vec![OrgScope::new(slug)]);
    }

    let collaborations = api.collaborations().await?;
    let scopes: Vec<OrgScope> = collaborations
        .into_iter()
        .map(|collaboration| {
            debug!(
                "Found organization {} ({}, {})",
                collaboration.slug,
                collaboration.name.as_deref().unwrap_or("-"),
                collaboration.vcs_type.as_deref().unwrap_or("-")
            );
            OrgScope::new(collaboration.slug)
        })
        .collect();

    info!("Discovered {} organizations", scopes.len());
    Ok(scopes)
}
