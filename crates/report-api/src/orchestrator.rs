//! Request Orchestrator: drives one report request from raw parameters to
//! a [`RenderedResponse`].
//!
//! ```text
//! authorize(view) -> lookup -> resolve options -+-> redirect (canonical form)
//!                                               |
//!           format -> strict options -> refresh? -+-> authorize(refresh) -> regenerate -> redirect
//!                                                 |
//!                              authorize(read) -> fetch -> render -> respond
//! ```
//!
//! Every failure leaves the pipeline through [`ReportService::respond`],
//! which turns the error into its status code.

use report_cache::CacheCoordinator;
use report_core::{
    Action, OptionResolver, ReportError, RequestContext, Resolution, REFRESH_PARAM,
};
use report_out::{Format, RenderRequest, RenderedResponse, Renderer};
use report_policy::{require, Authorizer};
use report_registry::ReportRegistry;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::metrics::Metrics;
use crate::urls::{canonical_location, view_path, with_query, without_param};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
}

/// One view request as it arrives from the transport.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub report_name: String,
    /// The organization path segment, if the request used that route.
    pub organization: Option<String>,
    /// Query parameters in request order.
    pub params: Vec<(String, String)>,
    pub method: RequestMethod,
    pub user: Option<String>,
}

pub struct ReportService {
    registry: Arc<ReportRegistry>,
    cache: Arc<CacheCoordinator>,
    renderer: Arc<Renderer>,
    authorizer: Arc<dyn Authorizer>,
    metrics: Arc<Metrics>,
}

impl ReportService {
    pub fn new(
        registry: Arc<ReportRegistry>,
        cache: Arc<CacheCoordinator>,
        renderer: Arc<Renderer>,
        authorizer: Arc<dyn Authorizer>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            cache,
            renderer,
            authorizer,
            metrics,
        }
    }

    pub fn registry(&self) -> &ReportRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheCoordinator {
        &self.cache
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The report catalogue page.
    pub fn index(&self, user: Option<String>) -> RenderedResponse {
        let ctx = RequestContext::new(user);
        let result = require(self.authorizer.as_ref(), Action::ListReports, &ctx)
            .and_then(|_| self.renderer.render_index(self.registry.list()));
        self.respond(result, &ctx)
    }

    pub async fn view(&self, request: ViewRequest) -> RenderedResponse {
        let ctx = RequestContext::new(request.user.clone())
            .for_report(&request.report_name)
            .with_organization(request.organization.as_deref());
        let result = self.try_view(&request, &ctx).await;
        self.respond(result, &ctx)
    }

    async fn try_view(
        &self,
        request: &ViewRequest,
        ctx: &RequestContext,
    ) -> Result<RenderedResponse, ReportError> {
        require(self.authorizer.as_ref(), Action::ViewReport, ctx)?;
        let definition = self.registry.lookup(&request.report_name)?;

        let resolver = OptionResolver::new(&definition);
        let resolved = match resolver.resolve(&request.params, request.organization.as_deref()) {
            Resolution::Redirect(redirect) => {
                let location = canonical_location(definition.id(), &redirect, &request.params);
                debug!(report = %definition.id(), location = %location, "redirecting to canonical form");
                return Ok(RenderedResponse::redirect(location));
            }
            Resolution::Resolved(resolved) => resolved,
        };

        // Permissive pass: unknown parameters only produce warnings here.
        let displays = resolved.display_options(&definition);

        let format = Format::parse(resolved.format.as_deref())?;
        let refresh = resolved.refresh
            || (request.method == RequestMethod::Post && !resolved.has_format());

        // Strict pass: unknown parameters fail the request.
        let options = resolved.option_set(&definition)?;

        if refresh {
            require(self.authorizer.as_ref(), Action::Refresh, ctx)?;
            let fetched = self.cache.refresh(&definition, &options).await;
            self.metrics.record_fetch(&fetched, true);
            let fetched = fetched?;
            info!(
                report = %definition.id(),
                key = %fetched.artifact.key,
                user = %ctx.user_label(),
                "report refreshed"
            );
            let location = with_query(
                view_path(definition.id(), request.organization.as_deref()),
                &without_param(&request.params, REFRESH_PARAM),
            );
            return Ok(RenderedResponse::redirect(location));
        }

        require(self.authorizer.as_ref(), Action::ReadData, ctx)?;
        let fetched = self.cache.data_get(&definition, &options).await;
        self.metrics.record_fetch(&fetched, false);
        let fetched = fetched?;
        let key = self.cache.key_get(&definition, &options);

        let options_html = match format {
            Format::Html => self.renderer.option_fragments(&displays)?,
            Format::Csv | Format::Json => Vec::new(),
        };

        let response = self.renderer.render(&RenderRequest {
            definition: &definition,
            artifact: &fetched.artifact,
            key: &key,
            format,
            options: &options,
            options_html: &options_html,
        })?;
        self.metrics.record_render(format);
        debug!(
            report = %definition.id(),
            key = %key,
            format = format.as_str(),
            source = fetched.source.as_str(),
            "report rendered"
        );
        Ok(response)
    }

    fn respond(
        &self,
        result: Result<RenderedResponse, ReportError>,
        ctx: &RequestContext,
    ) -> RenderedResponse {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                let report = ctx.report.as_deref().unwrap_or("-");
                if err.status() >= 500 {
                    error!(report, user = %ctx.user_label(), trace_id = %ctx.trace_id, error = %err, "report request failed");
                } else {
                    info!(report, user = %ctx.user_label(), trace_id = %ctx.trace_id, error = %err, "report request rejected");
                }
                RenderedResponse::error(&err)
            }
        };
        self.metrics.record_response(response.status);
        response
    }
}
