use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;
mod config;
mod node;
mod p2p;

use config::Config;
use node::Node;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::status,
        api::handlers::blocks,
        api::handlers::mine_block,
        api::handlers::find_block,
        api::handlers::balance,
        api::handlers::mempool,
        api::handlers::new_transaction,
        api::handlers::wallet,
        api::handlers::peers,
        api::handlers::add_peer
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::ChainState,
            blockchain::Tx,
            blockchain::TxIn,
            blockchain::TxOut,
            blockchain::UTxOut,
            blockchain::Address,
            api::schema::ErrorResponse,
            api::schema::TransactionRequest,
            api::schema::PeerRequest,
            api::schema::BalanceResponse,
            api::schema::WalletResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger node endpoints")
    ),
    info(
        title = "Ledger Node API",
        version = "1.0.0",
        description = "Administrative API of a proof-of-work ledger node"
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::parse();
    let node = Node::start(&config).context("failed to start node")?;
    info!("Node wallet address: {}", node.address());

    let listener = TcpListener::bind((config.host.as_str(), config.p2p_port()))
        .await
        .with_context(|| format!("failed to bind peer port {}", config.p2p_port()))?;
    let network = Arc::clone(&node.network);
    tokio::spawn(async move {
        if let Err(err) = network.serve(listener).await {
            error!("Peer listener stopped: {}", err);
        }
    });

    let node = web::Data::new(node);

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(node.clone())
            .configure(api::configure_routes)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
