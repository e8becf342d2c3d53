mod acl;
mod hmac;
mod whitelist;

pub use acl::{AclMiddlewareFactory, AclMiddlewareService, ADMIN_KEY_HEADER};
pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, HMAC_HEADER};
pub use whitelist::{WhitelistMiddlewareFactory, WhitelistMiddlewareService};
