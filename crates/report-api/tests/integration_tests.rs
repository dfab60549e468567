//! Integration tests for the report HTTP surface.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use report_api::metrics::Metrics;
use report_api::{build_state, create_app, load_registry, AppState, ReportService, ServerConfig};
use report_cache::{CacheConfig, CacheCoordinator};
use report_core::{
    from_fn, Action, GenerationError, ReportData, ReportDefinition, RequestContext, Row,
};
use report_out::{Renderer, TemplateRenderer};
use report_policy::{AuditLog, AuditedAuthorizer, Authorizer, Verdict};
use report_registry::ReportRegistry;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

struct Harness {
    state: AppState,
    generations: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

/// Allows everything except one action.
struct DenyOnly(Action);

impl Authorizer for DenyOnly {
    fn authorize(&self, action: Action, _ctx: &RequestContext) -> Verdict {
        if action == self.0 {
            Verdict::deny("denied for this test")
        } else {
            Verdict::allow()
        }
    }
}

impl Harness {
    fn new(admins: &[&str]) -> Self {
        Self::with_config(ServerConfig {
            admins: admins.iter().map(|a| a.to_string()).collect(),
            ..ServerConfig::default()
        })
    }

    fn with_config(config: ServerConfig) -> Self {
        let generations = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));
        let registry = registry(Arc::clone(&generations), Arc::clone(&failing));
        Self {
            state: build_state(&config, registry).unwrap(),
            generations,
            failing,
        }
    }

    /// Assemble the service by hand around a custom authorizer.
    fn with_authorizer(authorizer: impl Authorizer + 'static) -> Self {
        let generations = Arc::new(AtomicUsize::new(0));
        let failing = Arc::new(AtomicBool::new(false));
        let registry = registry(Arc::clone(&generations), Arc::clone(&failing));

        let audit = Arc::new(Mutex::new(AuditLog::new()));
        let service = ReportService::new(
            Arc::new(registry),
            Arc::new(CacheCoordinator::in_memory(CacheConfig::default())),
            Arc::new(Renderer::new(Arc::new(TemplateRenderer::bundled().unwrap()))),
            Arc::new(AuditedAuthorizer::new(authorizer, Arc::clone(&audit))),
            Arc::new(Metrics::new().unwrap()),
        );
        Self {
            state: AppState::new(service, audit),
            generations,
            failing,
        }
    }

    fn app(&self) -> Router {
        create_app(self.state.clone())
    }

    fn generations(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    fn fail_generation(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }

    async fn send(&self, method: &str, uri: &str, user: Option<&str>) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header("x-report-user", user);
        }
        self.app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.send("GET", uri, None).await
    }
}

fn registry(generations: Arc<AtomicUsize>, failing: Arc<AtomicBool>) -> ReportRegistry {
    let counter = generations;
    let tagless = ReportDefinition::builder(
        "tagless-datasets",
        from_fn(move |_, options| {
            if failing.load(Ordering::SeqCst) {
                return Err(GenerationError::Failed("source offline".into()));
            }
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let organization = options.organization().unwrap_or("all").to_string();
            Ok(ReportData::records(vec![
                Row::new()
                    .with("name", "river-levels")
                    .with("organization", organization)
                    .with("user", "alice"),
                Row::new().with("call", call),
            ]))
        }),
    )
    .title("Tagless datasets")
    .option("organization", Value::Null)
    .option("include_sub_organizations", json!(false))
    .build()
    .unwrap();

    let site_wide = ReportDefinition::builder(
        "site-wide",
        from_fn(|_, _| Ok(ReportData::records(vec![Row::new().with("datasets", 3)]))),
    )
    .build()
    .unwrap();

    let national = ReportDefinition::builder(
        "national",
        from_fn(|_, _| Ok(ReportData::records(vec![]))),
    )
    .option("organization", json!("ons"))
    .build()
    .unwrap();

    ReportRegistry::builder()
        .register(tagless)
        .unwrap()
        .register(site_wide)
        .unwrap()
        .register(national)
        .unwrap()
        .build()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

// =============================================================================
// Catalogue and aliases
// =============================================================================

#[tokio::test]
async fn test_list_reports() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report").await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("href=\"/report/tagless-datasets\""));
    assert!(page.contains("href=\"/report/site-wide\""));
}

#[tokio::test]
async fn test_reports_alias_redirects() {
    let harness = Harness::new(&[]);
    let response = harness.get("/reports").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/report");
}

#[tokio::test]
async fn test_unknown_report_is_404() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("nope"));
}

// =============================================================================
// Formats
// =============================================================================

#[tokio::test]
async fn test_html_view() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/tagless-datasets").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(response.headers().contains_key("x-request-id"));
    let page = body_text(response).await;
    assert!(page.contains("<h1>Tagless datasets</h1>"));
    assert!(page.contains("name=\"include_sub_organizations\""));
}

#[tokio::test]
async fn test_csv_download() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/tagless-datasets?format=csv").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=report_tagless-datasets_include_sub_organizations_false_organization_.csv"
    );
    assert_eq!(
        body_text(response).await,
        "\"name\",\"organization\",\"user\",\"call\"\r\n\
         \"river-levels\",\"all\",\"alice\",\"no record\"\r\n\
         \"no record\",\"no record\",\"no record\",\"1\"\r\n"
    );
}

#[tokio::test]
async fn test_json_has_generated_at() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/tagless-datasets?format=json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(parsed["generated_at"].as_str().unwrap().ends_with('Z'));
    assert_eq!(parsed["table"][0]["name"], json!("river-levels"));
}

#[tokio::test]
async fn test_unsupported_format_is_400_without_generation() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/tagless-datasets?format=xml").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("xml"));
    assert_eq!(harness.generations(), 0);
}

#[tokio::test]
async fn test_unknown_option_is_400_naming_it() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/tagless-datasets?bogus=1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("bogus"));
    assert_eq!(harness.generations(), 0);
}

#[tokio::test]
async fn test_reads_are_cached() {
    let harness = Harness::new(&[]);
    harness.get("/report/tagless-datasets?format=json").await;
    harness.get("/report/tagless-datasets?format=csv").await;
    harness
        .get("/report/tagless-datasets?include_sub_organizations=false")
        .await;
    assert_eq!(harness.generations(), 1);

    harness
        .get("/report/tagless-datasets?include_sub_organizations=yes")
        .await;
    assert_eq!(harness.generations(), 2);
}

// =============================================================================
// Canonical form
// =============================================================================

#[tokio::test]
async fn test_organization_query_moves_into_path() {
    let harness = Harness::new(&[]);
    let response = harness
        .get("/report/tagless-datasets?organization=ons&format=csv")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/report/tagless-datasets/ons?format=csv");
    assert_eq!(harness.generations(), 0);
}

#[tokio::test]
async fn test_organization_path_is_bound() {
    let harness = Harness::new(&[]);
    let response = harness
        .get("/report/tagless-datasets/ons?format=json")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["table"][0]["organization"], json!("ons"));
}

#[tokio::test]
async fn test_organization_path_stripped_when_not_declared() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/site-wide/ons").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/report/site-wide");
}

#[tokio::test]
async fn test_default_organization_redirects_to_path_form() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/national").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/report/national/ons");
}

// =============================================================================
// Refresh and authorization
// =============================================================================

#[tokio::test]
async fn test_refresh_redirects_without_flag() {
    let harness = Harness::new(&[]);
    harness.get("/report/tagless-datasets?format=json").await;
    assert_eq!(harness.generations(), 1);

    let response = harness
        .get("/report/tagless-datasets/ons?include_sub_organizations=true&refresh=yes")
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "/report/tagless-datasets/ons?include_sub_organizations=true"
    );
    assert_eq!(harness.generations(), 2);
}

#[tokio::test]
async fn test_post_implies_refresh() {
    let harness = Harness::new(&[]);
    harness.get("/report/tagless-datasets").await;
    let response = harness.send("POST", "/report/tagless-datasets", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/report/tagless-datasets");
    assert_eq!(harness.generations(), 2);
}

#[tokio::test]
async fn test_post_with_format_is_a_read() {
    let harness = Harness::new(&[]);
    harness.get("/report/tagless-datasets?format=csv").await;
    let response = harness
        .send("POST", "/report/tagless-datasets?format=csv", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.generations(), 1);
}

#[tokio::test]
async fn test_unparseable_refresh_flag_is_a_read() {
    let harness = Harness::new(&[]);
    let response = harness.get("/report/tagless-datasets?refresh=maybe").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.generations(), 1);
}

#[tokio::test]
async fn test_refresh_requires_admin() {
    let harness = Harness::new(&["admin"]);
    let before: Value = serde_json::from_str(
        &body_text(harness.get("/report/tagless-datasets?format=json").await).await,
    )
    .unwrap();

    let denied = harness
        .send("GET", "/report/tagless-datasets?refresh=true", Some("mallory"))
        .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.generations(), 1);

    let after: Value = serde_json::from_str(
        &body_text(harness.get("/report/tagless-datasets?format=json").await).await,
    )
    .unwrap();
    assert_eq!(before["generated_at"], after["generated_at"]);

    let allowed = harness
        .send("POST", "/report/tagless-datasets", Some("admin"))
        .await;
    assert_eq!(allowed.status(), StatusCode::FOUND);
    assert_eq!(harness.generations(), 2);

    let refreshed: Value = serde_json::from_str(
        &body_text(harness.get("/report/tagless-datasets?format=json").await).await,
    )
    .unwrap();
    assert!(
        refreshed["generated_at"].as_str().unwrap() > before["generated_at"].as_str().unwrap()
    );

    let audit = harness.state.audit.lock().unwrap();
    assert_eq!(audit.stats().denied, 1);
}

#[tokio::test]
async fn test_restricted_report_denies_view_before_generation() {
    let harness = Harness::with_config(ServerConfig {
        restricted: vec![("tagless-datasets".to_string(), vec!["carol".to_string()])],
        ..ServerConfig::default()
    });

    let denied = harness
        .send("GET", "/report/tagless-datasets/ons?format=csv", Some("bob"))
        .await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(denied).await, "AUTH/not authorized to view report");

    let anonymous = harness.get("/report/tagless-datasets").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.generations(), 0);

    let allowed = harness
        .send("GET", "/report/tagless-datasets?format=csv", Some("carol"))
        .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(harness.generations(), 1);

    // Unrestricted reports stay open.
    assert_eq!(harness.get("/report/site-wide").await.status(), StatusCode::OK);

    let audit = harness.state.audit.lock().unwrap();
    let denied = audit.denied_entries();
    assert_eq!(denied.len(), 2);
    assert_eq!(denied[0].action, Action::ViewReport);
    assert_eq!(denied[0].organization.as_deref(), Some("ons"));
}

#[tokio::test]
async fn test_denied_read_is_401_without_generation() {
    let harness = Harness::with_authorizer(DenyOnly(Action::ReadData));
    let response = harness.get("/report/tagless-datasets?format=json").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "AUTH/not authorized to read report data");
    assert_eq!(harness.generations(), 0);
    assert_eq!(harness.state.service.cache().stored(), 0);

    // Canonical redirects are decided before the read check.
    let redirect = harness.get("/report/tagless-datasets?organization=ons").await;
    assert_eq!(redirect.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_failed_generation_is_500_and_caches_nothing() {
    let harness = Harness::new(&[]);
    harness.fail_generation(true);

    let response = harness.get("/report/tagless-datasets?format=json").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "GENERATE/source offline");
    assert_eq!(harness.state.service.cache().stored(), 0);

    harness.fail_generation(false);
    let response = harness.get("/report/tagless-datasets?format=json").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.generations(), 1);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_artifact() {
    let harness = Harness::new(&["admin"]);
    let before: Value = serde_json::from_str(
        &body_text(harness.get("/report/tagless-datasets?format=json").await).await,
    )
    .unwrap();

    harness.fail_generation(true);
    let refresh = harness
        .send("POST", "/report/tagless-datasets", Some("admin"))
        .await;
    assert_eq!(refresh.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(refresh).await.contains("source offline"));

    let after: Value = serde_json::from_str(
        &body_text(harness.get("/report/tagless-datasets?format=json").await).await,
    )
    .unwrap();
    assert_eq!(before["generated_at"], after["generated_at"]);
    assert_eq!(before["table"], after["table"]);
    assert_eq!(harness.generations(), 1);
}

// =============================================================================
// Operational endpoints
// =============================================================================

#[tokio::test]
async fn test_health_and_metrics() {
    let harness = Harness::new(&[]);
    harness.get("/report/tagless-datasets?format=csv").await;
    harness.get("/report/tagless-datasets?format=csv").await;

    let health: Value =
        serde_json::from_str(&body_text(harness.get("/health").await).await).unwrap();
    assert_eq!(health["status"], json!("ok"));
    assert_eq!(health["reports"], json!(3));
    assert_eq!(health["cached_artifacts"], json!(1));

    let metrics = body_text(harness.get("/metrics").await).await;
    assert!(metrics.contains("report_cache_hits_total 1"));
    assert!(metrics.contains("report_cache_misses_total 1"));
    assert!(metrics.contains("report_renders_total{format=\"csv\"} 2"));
}

#[tokio::test]
async fn test_demo_catalogue_serves() {
    let registry = load_registry(&ServerConfig::default()).unwrap();
    assert_eq!(registry.len(), 3);
    let state = build_state(&ServerConfig::default(), registry).unwrap();

    let response = create_app(state)
        .oneshot(
            Request::builder()
                .uri("/report/tagless-datasets/ons?format=json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(parsed["total"], json!(1));
    assert_eq!(parsed["table"][0]["name"], json!("census-2021-lookup"));
}
