//! Batch encoding: several meta-transactions become one account call.
//!
//! Multiple calls are packed for the MultiSend contract:
//! `operation (1) | to (20) | value (32) | data length (32) | data`,
//! executed by the account through a delegate call.

use alloy_sol_types::{sol, SolCall};
use safeswap_types::{AccountCall, Address, CallOperation, MetaTransaction, Result, SwapError, U256};

sol! {
    function multiSend(bytes transactions) external payable;
}

fn pack(batch: &[MetaTransaction]) -> Vec<u8> {
    let mut packed = Vec::new();
    for tx in batch {
        packed.push(CallOperation::Call as u8);
        packed.extend_from_slice(tx.to.as_slice());
        packed.extend_from_slice(&tx.value.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(tx.data.len()).to_be_bytes::<32>());
        packed.extend_from_slice(&tx.data);
    }
    packed
}

/// Encode `batch` as a single call for the account to execute.
pub fn encode_batch(batch: &[MetaTransaction], multisend: Address) -> Result<AccountCall> {
    match batch {
        [] => Err(SwapError::Relay("cannot relay an empty batch".into())),
        [single] => Ok(AccountCall {
            to: single.to,
            value: single.value,
            data: single.data.clone(),
            operation: CallOperation::Call,
        }),
        many => {
            let data = multiSendCall { transactions: pack(many).into() }.abi_encode();
            Ok(AccountCall {
                to: multisend,
                value: U256::ZERO,
                data: data.into(),
                operation: CallOperation::DelegateCall,
            })
        }
    }
}
