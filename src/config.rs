use clap::Parser;
use std::path::PathBuf;

/// Runtime configuration of a ledger node.
///
/// Every flag can also be given through its environment variable.
#[derive(Parser, Debug, Clone)]
#[command(name = "pow_ledger", about = "Proof-of-work ledger node", version)]
pub struct Config {
    /// Interface the REST API and the peer listener bind to
    #[arg(long, env = "LEDGER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the REST API
    #[arg(long, env = "LEDGER_PORT", default_value_t = 4000)]
    pub port: u16,

    /// Port peers connect to. Defaults to the API port plus 1000.
    #[arg(long = "p2p-port", env = "LEDGER_P2P_PORT")]
    pub p2p_port: Option<u16>,

    /// Directory holding the block store. Defaults to `data/<port>`.
    #[arg(long = "data-dir", env = "LEDGER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Private key file of the node wallet. Defaults to `<data-dir>/coin.wallet`.
    #[arg(long = "wallet-file", env = "LEDGER_WALLET_FILE")]
    pub wallet_file: Option<PathBuf>,
}

impl Config {
    pub fn p2p_port(&self) -> u16 {
        self.p2p_port.unwrap_or_else(|| self.port.wrapping_add(1000))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("data").join(self.port.to_string()))
    }

    pub fn wallet_file(&self) -> PathBuf {
        self.wallet_file
            .clone()
            .unwrap_or_else(|| self.data_dir().join("coin.wallet"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Config::command().debug_assert();
    }

    #[test]
    fn test_derived_defaults() {
        let config = Config::try_parse_from(["pow_ledger", "--port", "4002"]).unwrap();

        assert_eq!(config.p2p_port(), 5002);
        assert_eq!(config.data_dir(), PathBuf::from("data/4002"));
        assert_eq!(config.wallet_file(), PathBuf::from("data/4002/coin.wallet"));
    }

    #[test]
    fn test_explicit_values_win() {
        let config = Config::try_parse_from([
            "pow_ledger",
            "--p2p-port",
            "7000",
            "--data-dir",
            "/tmp/ledger",
            "--wallet-file",
            "/tmp/keys/node.wallet",
        ])
        .unwrap();

        assert_eq!(config.p2p_port(), 7000);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/ledger"));
        assert_eq!(config.wallet_file(), PathBuf::from("/tmp/keys/node.wallet"));
    }

    #[test]
    fn test_rejects_invalid_port() {
        assert!(Config::try_parse_from(["pow_ledger", "--port", "70000"]).is_err());
    }
}
