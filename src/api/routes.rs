use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(handlers::status))
        .service(
            web::resource("/blocks")
                .route(web::get().to(handlers::blocks))
                .route(web::post().to(handlers::mine_block)),
        )
        .route("/blocks/{hash}", web::get().to(handlers::find_block))
        .route("/balance/{address}", web::get().to(handlers::balance))
        .route("/mempool", web::get().to(handlers::mempool))
        .route("/transactions", web::post().to(handlers::new_transaction))
        .route("/wallet", web::get().to(handlers::wallet))
        .service(
            web::resource("/peers")
                .route(web::get().to(handlers::peers))
                .route(web::post().to(handlers::add_peer)),
        );
}
