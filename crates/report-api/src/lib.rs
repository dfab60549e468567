//! Report API: HTTP surface for parameterized, cached reports
pub mod config;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod orchestrator;
pub mod urls;

pub use config::ServerConfig;
pub use orchestrator::{ReportService, RequestMethod, ViewRequest};

use anyhow::Context;
use axum::{routing::get, Router};
use report_cache::{CacheConfig, CacheCoordinator};
use report_out::{HashingAnonymizer, Renderer, TemplateRenderer};
use report_policy::{AllowAll, AuditLog, AuditedAuthorizer, Authorizer, RolePolicy};
use report_registry::{CatalogueFile, GeneratorBindings, ReportRegistry};
use std::sync::{Arc, Mutex};
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;

/// Reports served when no catalogue file is configured.
pub const DEMO_CATALOGUE: &str = include_str!("../catalogue/reports.yaml");

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReportService>,
    pub audit: Arc<Mutex<AuditLog>>,
}

impl AppState {
    pub fn new(service: ReportService, audit: Arc<Mutex<AuditLog>>) -> Self {
        Self {
            service: Arc::new(service),
            audit,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/report", get(handlers::list_reports))
        .route("/reports", get(handlers::reports_alias))
        .route(
            "/report/:report_name",
            get(handlers::view_report).post(handlers::view_report),
        )
        .route(
            "/report/:report_name/:organization",
            get(handlers::view_organization_report).post(handlers::view_organization_report),
        )
        .route("/metrics", get(handlers::metrics))
        .route("/health", get(handlers::health))
        .layer(axum::middleware::from_fn(middleware::propagate_request_id))
        .layer(middleware::cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the catalogue named by the config, or the demo one.
pub fn load_registry(config: &ServerConfig) -> anyhow::Result<ReportRegistry> {
    let catalogue = match &config.catalogue_path {
        Some(path) => CatalogueFile::load(path)
            .with_context(|| format!("loading report catalogue {}", path))?,
        None => CatalogueFile::from_yaml(DEMO_CATALOGUE).context("parsing demo catalogue")?,
    };
    catalogue
        .into_registry(&GeneratorBindings::new())
        .context("building report registry")
}

pub fn build_state(config: &ServerConfig, registry: ReportRegistry) -> anyhow::Result<AppState> {
    let templates = match &config.templates_path {
        Some(path) => TemplateRenderer::with_overrides(path)
            .with_context(|| format!("loading templates {}", path))?,
        None => TemplateRenderer::bundled().context("loading bundled templates")?,
    };
    let mut renderer = Renderer::new(Arc::new(templates));
    if config.anonymise {
        renderer = renderer.with_anonymizer(Arc::new(HashingAnonymizer));
    }

    let audit = Arc::new(Mutex::new(AuditLog::new()));
    let authorizer = build_authorizer(config, Arc::clone(&audit));

    let cache = CacheCoordinator::in_memory(CacheConfig {
        generation_timeout: config.generation_timeout,
    });
    let metrics = Metrics::new().context("registering metrics")?;

    let service = ReportService::new(
        Arc::new(registry),
        Arc::new(cache),
        Arc::new(renderer),
        authorizer,
        Arc::new(metrics),
    );
    Ok(AppState::new(service, audit))
}

/// `AllowAll` unless the config names admins or restricted reports.
/// Either way every decision lands in `audit`.
pub fn build_authorizer(config: &ServerConfig, audit: Arc<Mutex<AuditLog>>) -> Arc<dyn Authorizer> {
    if !config.has_access_rules() {
        return Arc::new(AuditedAuthorizer::new(AllowAll, audit));
    }
    let policy = config.restricted.iter().fold(
        RolePolicy::new().with_admins(config.admins.iter().cloned()),
        |policy, (report, users)| policy.restrict(report.clone(), users.iter().cloned()),
    );
    Arc::new(AuditedAuthorizer::new(policy, audit))
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let registry = load_registry(&config)?;
    tracing::info!(reports = registry.len(), "report catalogue loaded");
    let state = build_state(&config, registry)?;

    if config.warm_cache {
        let service = Arc::clone(&state.service);
        tokio::spawn(async move {
            service.cache().warm_all(service.registry()).await;
        });
    }

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;

    tracing::info!("Report API listening on {}", config.addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
