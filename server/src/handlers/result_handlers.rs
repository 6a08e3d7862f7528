use axum::{
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use oneview_scraper_cli::{assemble::parse_record, RollNumber};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct ResultQuery {
    #[serde(rename = "rollNo")]
    pub roll_no: Option<String>,
}

/// GET /api/result?rollNo=...
pub async fn get_result(
    Extension(state): Extension<AppState>,
    Query(query): Query<ResultQuery>,
) -> impl IntoResponse {
    let Some(roll) = query
        .roll_no
        .as_deref()
        .and_then(|r| r.parse::<RollNumber>().ok())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid or missing rollNo parameter" })),
        );
    };

    if let Some(record) = state.cached(&roll) {
        return (StatusCode::OK, Json(json!(record)));
    }

    let page = match state.fetcher.fetch(&roll).await {
        Ok(page) => page,
        Err(e) => {
            error!(roll = %roll, error = %e, "portal fetch failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            );
        }
    };

    match parse_record(&page) {
        Ok(record) => {
            let body = json!(record);
            state.remember(roll, record);
            (StatusCode::OK, Json(body))
        }
        Err(rejection) => {
            info!(roll = %roll, %rejection, "no result on the portal");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "No result found for this roll number" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        Router,
    };
    use oneview_scraper_cli::{error::FetchError, scraper::Fetcher};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::result::result_routes;

    const STUDENT_PAGE: &str = r#"<html><body><table>
        <tr><td>Exam Name</td><td>:</td><td>  A  B  C  D  E  F  G  H  I  </td></tr>
        <tr><td>RollNo</td><td>:</td><td>2100680100172</td></tr>
        <tr><td>Institute Code</td><td>:</td><td>(068) ABC INSTITUTE</td></tr>
        <tr><td>Branch Code</td><td>:</td><td>(10) CIVIL</td></tr>
        <tr><td>Name</td><td>:</td><td>  JANE ROE  </td></tr>
    </table></body></html>"#;

    /// Returns `page` (or fails when `None`) and counts calls.
    struct Canned {
        page: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for Canned {
        async fn fetch(&self, _roll: &RollNumber) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page.map(str::to_string).ok_or(FetchError::Blocked)
        }
    }

    fn app(page: Option<&'static str>) -> (Router, Arc<Canned>) {
        app_with_ttl(page, crate::state::DEFAULT_CACHE_TTL)
    }

    fn app_with_ttl(page: Option<&'static str>, ttl: Duration) -> (Router, Arc<Canned>) {
        let fetcher = Arc::new(Canned {
            page,
            calls: AtomicUsize::new(0),
        });
        let state = AppState::new(fetcher.clone(), ttl);
        (Router::new().nest("/api", result_routes(state)), fetcher)
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_or_non_numeric_roll_is_a_bad_request() {
        let (app, fetcher) = app(Some(STUDENT_PAGE));

        for uri in ["/api/result", "/api/result?rollNo=", "/api/result?rollNo=12ab"] {
            let (status, body) = get(&app, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Invalid or missing rollNo parameter");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn found_record_is_returned_then_served_from_cache() {
        let (app, fetcher) = app(Some(STUDENT_PAGE));

        let (status, body) = get(&app, "/api/result?rollNo=2100680100172").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rollNumber"], "2100680100172");
        assert_eq!(body["fullName"], "JANE ROE");
        assert_eq!(body["branch"], "CIVIL");

        let (status, again) = get(&app, "/api/result?rollNo=2100680100172").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again, body);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_records_are_fetched_again() {
        let (app, fetcher) = app_with_ttl(Some(STUDENT_PAGE), Duration::ZERO);

        for _ in 0..2 {
            let (status, body) = get(&app, "/api/result?rollNo=2100680100172").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["fullName"], "JANE ROE");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn page_without_a_record_is_not_found() {
        let (app, _) = app(Some("<html><body>Record not found</body></html>"));
        let (status, body) = get(&app, "/api/result?rollNo=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No result found for this roll number");
    }

    #[tokio::test]
    async fn fetch_failure_is_an_internal_error() {
        let (app, _) = app(None);
        let (status, body) = get(&app, "/api/result?rollNo=1").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
