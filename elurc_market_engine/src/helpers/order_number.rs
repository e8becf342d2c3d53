use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};

pub const ORDER_NUMBER_PREFIX: &str = "ELR";
const SUFFIX_LEN: usize = 6;

/// Generates a human-readable order number of the form `ELR-YYYYMMDD-XXXXXX`, where the suffix is six random
/// upper-case alphanumeric characters.
pub fn generate_order_number(created_at: DateTime<Utc>) -> String {
    let suffix = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect::<String>();
    format!("{ORDER_NUMBER_PREFIX}-{}-{suffix}", created_at.format("%Y%m%d"))
}

pub fn is_order_number(s: &str) -> bool {
    let mut parts = s.split('-');
    let (Some(prefix), Some(date), Some(suffix), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == ORDER_NUMBER_PREFIX
        && date.len() == 8
        && date.chars().all(|c| c.is_ascii_digit())
        && suffix.len() == SUFFIX_LEN
        && suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
