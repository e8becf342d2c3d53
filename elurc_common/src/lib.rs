mod amounts;
pub mod helpers;

pub mod op;
mod secret;

pub use amounts::{
    AmountConversionError,
    EuroCents,
    Lamports,
    ELURC_CURRENCY_CODE,
    EUR_CURRENCY_CODE,
    LAMPORTS_PER_ELURC,
};
pub use secret::Secret;
