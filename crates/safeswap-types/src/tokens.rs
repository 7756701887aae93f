//! Static token registry.
//!
//! Tokens are immutable descriptors; nothing in the orchestrator mutates them.

use alloy_primitives::{address, Address};
use serde::Serialize;

pub const GNOSIS_CHAIN_ID: u64 = 100;

/// Sentinel address used by swap aggregators for the chain's native asset.
pub const NATIVE_ASSET: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    pub address: Address,
    pub symbol: &'static str,
    pub name: &'static str,
    pub decimals: u8,
    pub chain_id: u64,
}

impl Token {
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_ASSET
    }
}

pub const WETH: Token = Token {
    address: address!("6A023CCd1ff6F2045C3309768eAd9E68F978f6e1"),
    symbol: "WETH",
    name: "Wrapped Ether on Gnosis chain",
    decimals: 18,
    chain_id: GNOSIS_CHAIN_ID,
};

pub const WXDAI: Token = Token {
    address: address!("e91D153E0b41518A2Ce8Dd3D7944Fa863463a97d"),
    symbol: "WXDAI",
    name: "Wrapped XDAI",
    decimals: 18,
    chain_id: GNOSIS_CHAIN_ID,
};

pub const XDAI: Token = Token {
    address: NATIVE_ASSET,
    symbol: "XDAI",
    name: "XDAI",
    decimals: 18,
    chain_id: GNOSIS_CHAIN_ID,
};

pub const USDC: Token = Token {
    address: address!("DDAfbb505ad214D7b80b1f830fcCc89B60fb7A83"),
    symbol: "USDC",
    name: "USD//C on Gnosis",
    decimals: 6,
    chain_id: GNOSIS_CHAIN_ID,
};

/// Tokens whose balances are shown for the active account.
pub const TOKEN_LIST: [Token; 4] = [WETH, XDAI, WXDAI, USDC];

/// All registered tokens on `chain_id`.
pub fn tokens_for_chain(chain_id: u64) -> Vec<Token> {
    TOKEN_LIST.iter().copied().filter(|t| t.chain_id == chain_id).collect()
}

/// Look up a token by symbol (case-insensitive) or address.
pub fn find_token(chain_id: u64, symbol_or_address: &str) -> Option<Token> {
    let parsed: Option<Address> = symbol_or_address.parse().ok();
    TOKEN_LIST.iter().copied().find(|t| {
        t.chain_id == chain_id
            && (t.symbol.eq_ignore_ascii_case(symbol_or_address) || Some(t.address) == parsed)
    })
}
