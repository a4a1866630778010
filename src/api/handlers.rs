use actix_web::{web, HttpResponse, Responder};
use log::error;

use super::schema::{
    BalanceQuery, BalanceResponse, ErrorResponse, PeerRequest, TransactionRequest, WalletResponse,
};
use crate::blockchain::transaction::TransactionError;
use crate::blockchain::{Address, Block, BlockchainError, ChainState, Tx, UTxOut};
use crate::node::{Node, NodeError};

/// Shared node handles
pub type NodeData = web::Data<Node>;

/// Maps a node error onto a status code and an `{errorMessage}` body
fn error_response(err: NodeError) -> HttpResponse {
    let body = ErrorResponse::new(&err);

    match err {
        NodeError::Blockchain(BlockchainError::NotFound(_)) => HttpResponse::NotFound().json(body),
        NodeError::Blockchain(BlockchainError::TransactionError(
            TransactionError::NotEnoughBalance | TransactionError::NotValid,
        )) => HttpResponse::BadRequest().json(body),
        NodeError::Blockchain(BlockchainError::StaleTip) => HttpResponse::Conflict().json(body),
        NodeError::P2p(_) => HttpResponse::BadGateway().json(body),
        err => {
            error!("Request failed: {}", err);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Get the chain checkpoint
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Newest hash, height and current difficulty", body = ChainState)
    )
)]
pub async fn status(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.chain.status())
}

/// Get every block
///
/// Blocks are listed from the tip back to genesis
#[utoipa::path(
    get,
    path = "/blocks",
    responses(
        (status = 200, description = "Blocks retrieved successfully", body = Vec<Block>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn blocks(node: NodeData) -> impl Responder {
    match node.chain.blocks() {
        Ok(blocks) => HttpResponse::Ok().json(blocks),
        Err(err) => error_response(err.into()),
    }
}

/// Mine a new block
///
/// Confirms every pending transaction in a block rewarding the node wallet,
/// then announces the block to every peer
#[utoipa::path(
    post,
    path = "/blocks",
    responses(
        (status = 201, description = "Block mined successfully", body = Block),
        (status = 409, description = "The chain tip moved while mining", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn mine_block(node: NodeData) -> impl Responder {
    let miner = node.clone();

    match web::block(move || miner.mine()).await {
        Ok(Ok(block)) => HttpResponse::Created().json(block),
        Ok(Err(err)) => error_response(err),
        Err(err) => {
            error!("Mining task failed: {}", err);
            HttpResponse::InternalServerError().json(ErrorResponse::new(err))
        }
    }
}

/// Get a block by hash
#[utoipa::path(
    get,
    path = "/blocks/{hash}",
    params(
        ("hash" = String, Path, description = "Block hash")
    ),
    responses(
        (status = 200, description = "Block found", body = Block),
        (status = 404, description = "No block with this hash", body = ErrorResponse)
    )
)]
pub async fn find_block(node: NodeData, hash: web::Path<String>) -> impl Responder {
    match node.chain.find_block(&hash) {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(err) => error_response(err.into()),
    }
}

/// Get the unspent outputs of an address
///
/// With `total=true` only their sum is returned
#[utoipa::path(
    get,
    path = "/balance/{address}",
    params(
        ("address" = String, Path, description = "Owner address"),
        BalanceQuery
    ),
    responses(
        (status = 200, description = "Unspent outputs, or a BalanceResponse when total=true", body = Vec<UTxOut>)
    )
)]
pub async fn balance(
    node: NodeData,
    address: web::Path<String>,
    query: web::Query<BalanceQuery>,
) -> impl Responder {
    let address = Address(address.into_inner());

    if query.total.unwrap_or(false) {
        match node.chain.balance_by_address(&address, &node.mempool) {
            Ok(balance) => HttpResponse::Ok().json(BalanceResponse {
                address: address.0,
                balance,
            }),
            Err(err) => error_response(err.into()),
        }
    } else {
        match node.chain.utxos_by_address(&address, &node.mempool) {
            Ok(utxos) => HttpResponse::Ok().json(utxos),
            Err(err) => error_response(err.into()),
        }
    }
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/mempool",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Tx>)
    )
)]
pub async fn mempool(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.mempool.txs())
}

/// Create a new transaction
///
/// Spends from the node wallet and announces the transaction to every peer
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction queued", body = Tx),
        (status = 400, description = "Not enough balance or invalid transaction", body = ErrorResponse)
    )
)]
pub async fn new_transaction(
    node: NodeData,
    request: web::Json<TransactionRequest>,
) -> impl Responder {
    let to = Address(request.to.clone());

    match node.send(&to, request.amount) {
        Ok(tx) => HttpResponse::Created().json(tx),
        Err(err) => error_response(err),
    }
}

/// Get the node wallet address
#[utoipa::path(
    get,
    path = "/wallet",
    responses(
        (status = 200, description = "Wallet address", body = WalletResponse)
    )
)]
pub async fn wallet(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(WalletResponse {
        address: node.address().0.clone(),
    })
}

/// Get the connected peers
#[utoipa::path(
    get,
    path = "/peers",
    responses(
        (status = 200, description = "Peer keys as host:port", body = Vec<String>)
    )
)]
pub async fn peers(node: NodeData) -> impl Responder {
    HttpResponse::Ok().json(node.network.peers())
}

/// Connect to a peer
///
/// Every peer already connected is told about the new one
#[utoipa::path(
    post,
    path = "/peers",
    request_body = PeerRequest,
    responses(
        (status = 200, description = "Connected"),
        (status = 502, description = "Peer unreachable", body = ErrorResponse)
    )
)]
pub async fn add_peer(node: NodeData, request: web::Json<PeerRequest>) -> impl Responder {
    match node.connect(&request.address, request.port).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => error_response(err),
    }
}
