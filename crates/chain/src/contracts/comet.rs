//! Compound V3 (Comet) contract interface.
//!
//! Only the subset the absorb bot touches: the Withdraw event used to
//! discover borrowers, the liquidation margin read, and `absorb`.

use alloy::primitives::{Address, Bytes};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Comet market interface (subset for absorption)
    #[sol(rpc)]
    #[derive(Debug)]
    interface IComet {
        event Withdraw(address indexed src, address indexed to, uint256 amount);

        function getLiquidationMargin(address account) external view returns (int256);
        function absorb(address absorber, address[] calldata accounts) external;
    }
}

/// Encode `absorb(absorber, accounts)` calldata.
pub fn encode_absorb(absorber: Address, accounts: &[Address]) -> Bytes {
    let call = IComet::absorbCall {
        absorber,
        accounts: accounts.to_vec(),
    };
    Bytes::from(call.abi_encode())
}
