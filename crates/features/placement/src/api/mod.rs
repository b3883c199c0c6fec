//! HTTP surface of the placement slice, mounted under `/api/placement`.

mod handlers;
pub mod models;

use apex_kernel::server::ApiState;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::register_candidate))
        .routes(routes!(handlers::get_candidate, handlers::withdraw_candidate))
        .routes(routes!(handlers::enroll))
        .routes(routes!(handlers::domain_status, handlers::leave_domain))
        .routes(routes!(handlers::list_attempts))
        .routes(routes!(handlers::submit_score))
        .routes(routes!(handlers::tier_occupants))
        .routes(routes!(handlers::waiting_list))
        .routes(routes!(handlers::set_capacity))
}
