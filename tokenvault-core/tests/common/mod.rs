#![allow(dead_code)]

use bitcoin::{Network, OutPoint, Txid};
use std::str::FromStr;
use std::sync::Once;

use tokenvault_common::config::UtxoProviderConfig;
use tokenvault_common::logging::{self, LogConfig, LogLevel};
use tokenvault_common::types::{DEFAULT_POOL_SIZE, DEFAULT_POOL_UTXO_VALUE, DEFAULT_POOL_WALLET_ID};
use tokenvault_core::{ContractContext, MemoryTokenStore, MemoryWalletAdapter};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";
pub const POOL: &str = DEFAULT_POOL_WALLET_ID;

static INIT_LOGGER: Once = Once::new();

pub fn setup() {
    INIT_LOGGER.call_once(|| {
        let config = LogConfig {
            level: LogLevel::Error,
            ..LogConfig::default()
        };
        logging::init(&config).expect("Failed to initialize logging");
    });
}

pub fn txid(byte: u8) -> Txid {
    Txid::from_str(&format!("{:02x}", byte).repeat(32)).unwrap()
}

pub fn outpoint(byte: u8, vout: u32) -> OutPoint {
    OutPoint::new(txid(byte), vout)
}

/// In-memory ledger with the wallets used across tests
pub struct Fixture {
    pub wallet: MemoryWalletAdapter,
    pub store: MemoryTokenStore,
}

impl Fixture {
    /// Alice holds 100_000 in one finalized output, Bob holds nothing
    pub fn new() -> Self {
        setup();
        let wallet = MemoryWalletAdapter::new(Network::Regtest);
        wallet.create_wallet(ALICE);
        wallet.create_wallet(BOB);
        wallet.fund(ALICE, 100_000).unwrap();
        Self {
            wallet,
            store: MemoryTokenStore::new(),
        }
    }

    /// Like [`Fixture::new`] plus a collateral pool of 20 outputs of 1_000
    pub fn with_pool() -> Self {
        let fixture = Self::new();
        fixture.wallet.create_wallet(POOL);
        for _ in 0..DEFAULT_POOL_SIZE {
            fixture.wallet.fund(POOL, DEFAULT_POOL_UTXO_VALUE).unwrap();
        }
        fixture
    }

    pub fn ctx(&self) -> ContractContext<'_> {
        ContractContext::new(&self.wallet, &self.store)
    }

    pub fn pool_ctx(&self) -> ContractContext<'_> {
        self.ctx().with_utxo_provider(UtxoProviderConfig {
            enabled: true,
            ..UtxoProviderConfig::default()
        })
    }

    pub fn address(&self, wallet_id: &str) -> String {
        use tokenvault_core::WalletAdapter;
        self.wallet.receive_address(wallet_id, None).unwrap()
    }
}
