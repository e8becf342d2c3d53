mod order_number;
mod wallet_address;

pub use order_number::{generate_order_number, is_order_number, ORDER_NUMBER_PREFIX};
pub use wallet_address::{is_valid_wallet_address, Base58AddressValidator, WalletAddressValidator};
