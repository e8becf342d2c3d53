const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const MIN_ADDRESS_LEN: usize = 32;
const MAX_ADDRESS_LEN: usize = 44;

/// Validates customer wallet addresses before an order is accepted.
///
/// The marketplace does not talk to the chain itself. Anything that can vouch for an address (a wallet SDK, an RPC
/// lookup) can be plugged in here.
pub trait WalletAddressValidator: Send + Sync {
    fn is_valid(&self, address: &str) -> bool;
}

/// Accepts base58-encoded addresses of 32 to 44 characters, which covers ed25519 public keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base58AddressValidator;

impl WalletAddressValidator for Base58AddressValidator {
    fn is_valid(&self, address: &str) -> bool {
        is_valid_wallet_address(address)
    }
}

pub fn is_valid_wallet_address(address: &str) -> bool {
    (MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&address.len()) && address.chars().all(|c| BASE58_ALPHABET.contains(c))
}
