use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, trace};
use regex::Regex;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // Proxies append to the list, so the first entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req.headers().get("Forwarded").and_then(|v| v.to_str().ok()).and_then(ip_from_forwarded_header);
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

/// Extracts the client address from an RFC 7239 `Forwarded` header value, e.g. `for=192.0.2.60;proto=http`.
pub fn ip_from_forwarded_header(value: &str) -> Option<IpAddr> {
    let re = Regex::new(r#"for=(?P<ip>[^;,]+)"#).ok()?;
    re.captures(value)
        .and_then(|caps| caps.name("ip"))
        .map(|m| m.as_str().trim_matches('"').trim_start_matches('[').trim_end_matches(']'))
        .and_then(|s| IpAddr::from_str(s).ok())
}

/// Signs `data` with HMAC-SHA256 and returns the base64-encoded tag. This is the value the ledger verifier sends in
/// the webhook signature header.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(data);
    Ok(base64::encode(mac.finalize().into_bytes()))
}

/// Checks a base64-encoded HMAC-SHA256 tag against `data` in constant time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let tag = match base64::decode(signature.trim()) {
        Ok(tag) => tag,
        Err(e) => {
            debug!("🔐️ HMAC signature is not valid base64. {e}");
            return false;
        },
    };
    match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(&tag).is_ok()
        },
        Err(_) => false,
    }
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;

    use super::*;

    #[test]
    fn hmac_round_trip() {
        let body = br#"{"order_id":"abc","transaction_signature":"5xyz","amount_received":1000}"#;
        let sig = calculate_hmac("shared-secret", body).unwrap();
        assert!(verify_hmac("shared-secret", body, &sig));
        assert!(!verify_hmac("other-secret", body, &sig));
        assert!(!verify_hmac("shared-secret", b"tampered", &sig));
        assert!(!verify_hmac("shared-secret", body, "not base64!"));
    }

    #[test]
    fn known_hmac_value() {
        // RFC 4231, test case 2
        let sig = calculate_hmac("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(sig, "W9zBRr9gdU5qBCQmCJV1x1oAPwidJzmDnexYuWTsOEM=");
    }

    #[test]
    fn forwarded_header() {
        assert_eq!(ip_from_forwarded_header("for=192.0.2.60;proto=http"), "192.0.2.60".parse().ok());
        assert_eq!(ip_from_forwarded_header(r#"for="[2001:db8::17]""#), "2001:db8::17".parse().ok());
        assert_eq!(ip_from_forwarded_header("proto=https"), None);
    }

    #[test]
    fn remote_ip_preference() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("Forwarded", "for=198.51.100.4"))
            .peer_addr("127.0.0.1:5000".parse().unwrap())
            .to_http_request();
        assert_eq!(get_remote_ip(&req, true, true), "203.0.113.7".parse().ok());
        assert_eq!(get_remote_ip(&req, false, true), "198.51.100.4".parse().ok());
        assert_eq!(get_remote_ip(&req, false, false), "127.0.0.1".parse().ok());
    }
}
