use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Body returned with every 4xx/5xx response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl ErrorResponse {
    pub fn new(message: impl ToString) -> Self {
        ErrorResponse {
            error_message: message.to_string(),
        }
    }
}

/// Request for the transaction endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// Recipient address
    pub to: String,

    /// Amount to transfer from the node wallet
    pub amount: u64,
}

/// Request for the add peer endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PeerRequest {
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BalanceQuery {
    /// Return the summed balance instead of the unspent outputs
    pub total: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub address: String,
}
