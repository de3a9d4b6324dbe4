//! Server construction and middleware wiring.

mod config;
mod state_builders;

pub use config::{PortalSettings, ServerConfig};

use state_builders::build_services;

use std::sync::Arc;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use crate::domain::ReconciliationWorker;
use crate::inbound::http::authorize::{authorize, authorize_check};
use crate::inbound::http::health::{HealthState, live, ready};
use crate::inbound::http::payments::payment_status;
use crate::inbound::http::state::HttpState;
use crate::inbound::http::vouchers::redeem;
use crate::middleware::Trace;

#[cfg(debug_assertions)]
use crate::doc::ApiDoc;
#[cfg(debug_assertions)]
use actix_web::HttpResponse;
#[cfg(debug_assertions)]
use utoipa::OpenApi;

fn build_app(
    health_state: web::Data<HealthState>,
    http_state: web::Data<HttpState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let api = web::scope("/api/v1")
        .service(authorize)
        .service(authorize_check)
        .service(redeem)
        .service(payment_status);

    let app = App::new()
        .app_data(health_state)
        .app_data(http_state)
        .wrap(Trace)
        .service(api)
        .service(ready)
        .service(live);

    #[cfg(debug_assertions)]
    let app = app.route(
        "/api-docs/openapi.json",
        web::get().to(|| async { HttpResponse::Ok().json(ApiDoc::openapi()) }),
    );

    app
}

/// Construct the Actix HTTP server and the reconciliation worker it runs
/// alongside.
///
/// The returned worker is not yet running; the caller spawns its sweep loop
/// so shutdown ordering stays in one place.
///
/// # Errors
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<(Server, Arc<ReconciliationWorker>)> {
    let (http_state, worker) = build_services(&config);
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        build_app(server_health_state.clone(), http_state.clone())
    })
    .bind(config.bind_addr.as_str())?
    .run();

    health_state.mark_ready();
    Ok((server, worker))
}
