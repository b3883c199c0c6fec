//! HTTP surface of the ladder slice, mounted under `/api/ladder`.

mod handlers;
pub mod models;

use apex_kernel::server::ApiState;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::list_domains, handlers::create_domain))
        .routes(routes!(handlers::get_domain, handlers::update_domain, handlers::delete_domain))
        .routes(routes!(handlers::add_tier))
        .routes(routes!(handlers::publish_thresholds))
        .routes(routes!(handlers::validate_thresholds))
        .routes(routes!(handlers::threshold_history))
}
