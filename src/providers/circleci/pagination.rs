use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::api::CircleApi;
use super::types::{OrgScope, PipelineRecord};
use crate::error::Result;

/// Walks the "pipelines I triggered" listing for one organization, newest first.
///
/// The listing is strictly reverse-chronological, so the first item created
/// before `now - max_age` ends the walk: it is not included and no further
/// pages are requested. Pipelines older than the window whose workflows were
/// rerun recently are therefore missed.
pub async fn fetch_recent_pipelines<A: CircleApi>(
    api: &A,
    org_slug: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<Vec<PipelineRecord>> {
    let cutoff = now - max_age;
    let mut pipelines = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = api.pipelines_page(org_slug, page_token.as_deref()).await?;
        let next = page.next_token().map(ToString::to_string);

        for pipeline in page.items {
            if pipeline.created_at < cutoff {
                debug!(
                    "Reached pipelines older than {cutoff} for {org_slug} after {} items",
                    pipelines.len()
                );
                return Ok(pipelines);
            }
            pipelines.push(pipeline);
        }

        match next {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(pipelines)
}

/// Fetches recent pipelines for every scope concurrently.
///
/// A failing scope is logged and skipped; the others still contribute.
pub async fn fetch_pipelines_for_scopes<A: CircleApi>(
    api: &A,
    scopes: &[OrgScope],
    max_age: Duration,
    now: DateTime<Utc>,
) -> Vec<PipelineRecord> {
    let futures: Vec<_> = scopes
        .iter()
        .map(|scope| async move {
            let result = fetch_recent_pipelines(api, scope.as_str(), max_age, now).await;
            (scope, result)
        })
        .collect();

    let results = futures::future::join_all(futures).await;

    let mut pipelines = Vec::new();
    for (scope, result) in results {
        match result {
            Ok(fetched) => {
                debug!("Fetched {} pipelines for {}", fetched.len(), scope.as_str());
                pipelines.extend(fetched);
            }
            Err(e) => warn!("Skipping organization {}: {e}", scope.as_str()),
        }
    }

    pipelines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CircleError;
    use crate::providers::circleci::testing::{pipeline, FakeCircle};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn stops_at_first_item_past_the_age_window() {
        let now = Utc::now();
        let api = FakeCircle::new().with_pipeline_pages(
            "gh/acme",
            vec![
                vec![
                    pipeline("p-1", "gh/acme/web", "main", now),
                    pipeline("p-2", "gh/acme/web", "dev", now - Duration::days(1)),
                ],
                vec![
                    pipeline("p-3", "gh/acme/web", "old", now - Duration::days(10)),
                    pipeline("p-4", "gh/acme/web", "older", now - Duration::days(20)),
                ],
                vec![pipeline("p-5", "gh/acme/web", "main", now - Duration::days(30))],
            ],
        );

        let pipelines = fetch_recent_pipelines(&api, "gh/acme", Duration::days(14), now)
            .await
            .unwrap();

        let ids: Vec<_> = pipelines.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p-1", "p-2", "p-3"]);
        assert_eq!(api.pipeline_page_requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn early_stop_within_a_single_page_issues_no_more_requests() {
        let now = Utc::now();
        let api = FakeCircle::new().with_pipeline_pages(
            "gh/acme",
            vec![
                vec![
                    pipeline("p-1", "gh/acme/web", "a", now),
                    pipeline("p-2", "gh/acme/web", "b", now - Duration::days(1)),
                    pipeline("p-3", "gh/acme/web", "c", now - Duration::days(10)),
                    pipeline("p-4", "gh/acme/web", "d", now - Duration::days(20)),
                ],
                vec![pipeline("p-5", "gh/acme/web", "e", now - Duration::days(21))],
            ],
        );

        let pipelines = fetch_recent_pipelines(&api, "gh/acme", Duration::days(7), now)
            .await
            .unwrap();

        let ids: Vec<_> = pipelines.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p-1", "p-2"]);
        assert_eq!(api.pipeline_page_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn follows_cursors_until_exhausted() {
        let now = Utc::now();
        let api = FakeCircle::new().with_pipeline_pages(
            "gh/acme",
            vec![
                vec![pipeline("p-1", "gh/acme/web", "a", now)],
                vec![pipeline("p-2", "gh/acme/web", "b", now - Duration::hours(1))],
                vec![pipeline("p-3", "gh/acme/web", "c", now - Duration::hours(2))],
            ],
        );

        let pipelines = fetch_recent_pipelines(&api, "gh/acme", Duration::days(14), now)
            .await
            .unwrap();

        assert_eq!(pipelines.len(), 3);
        assert_eq!(api.pipeline_page_requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn propagates_errors_for_a_single_scope() {
        let api = FakeCircle::new().with_pipeline_error("gh/acme", 429);

        let result = fetch_recent_pipelines(&api, "gh/acme", Duration::days(14), Utc::now()).await;

        assert!(matches!(result, Err(CircleError::RateLimited)));
    }

    #[tokio::test]
    async fn failing_scope_does_not_abort_the_others() {
        let now = Utc::now();
        let api = FakeCircle::new()
            .with_pipeline_error("gh/broken", 500)
            .with_pipeline_pages(
                "gh/acme",
                vec![vec![pipeline("p-1", "gh/acme/web", "main", now)]],
            );

        let scopes = vec![OrgScope::new("gh/broken"), OrgScope::new("gh/acme")];
        let pipelines = fetch_pipelines_for_scopes(&api, &scopes, Duration::days(14), now).await;

        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].id, "p-1");
    }
}
