//! Buyer-identity middleware.
//!
//! The identity mechanism itself is external (wallet-session handling in
//! the web tier). This middleware only lifts the opaque wallet address off
//! the request, from the `X-Wallet-Address` header or the web tier's
//! `publicKey` cookie, into a request extension. Endpoints that create
//! purchases require it; downloads are bearer-token authorized and do not.

use axum::{
    body::Body,
    extract::Request,
    http::header::COOKIE,
    middleware::Next,
    response::Response,
};

use crate::api::error::{ApiError, ErrorCode};

/// Header carrying the buyer's wallet address.
pub const WALLET_HEADER: &str = "x-wallet-address";

/// Cookie set by the web tier after wallet connect.
pub const WALLET_COOKIE: &str = "publicKey";

/// Opaque buyer identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct WalletIdentity(pub String);

/// Extract the wallet identity, if present, and attach it as an extension.
pub async fn identity_middleware(mut request: Request<Body>, next: Next) -> Response {
    if let Some(address) = wallet_address(&request) {
        request.extensions_mut().insert(WalletIdentity(address));
    }
    next.run(request).await
}

/// Require a buyer identity on the request.
pub fn require_identity(identity: Option<&WalletIdentity>) -> Result<&WalletIdentity, ApiError> {
    identity.ok_or_else(|| ApiError::new(ErrorCode::AuthRequired, "No buyer identity on request"))
}

fn wallet_address(request: &Request<Body>) -> Option<String> {
    if let Some(header) = request
        .headers()
        .get(WALLET_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        let header = header.trim();
        if !header.is_empty() {
            return Some(header.to_string());
        }
    }

    let cookies = request.headers().get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        if name == WALLET_COOKIE && !value.is_empty() {
            Some(value.to_string())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::HeaderValue;

    fn request_with_header(name: &'static str, value: &str) -> Request<Body> {
        let mut request = Request::new(Body::empty());
        request
            .headers_mut()
            .insert(name, HeaderValue::from_str(value).unwrap());
        request
    }

    #[test]
    fn prefers_wallet_header() {
        let request = request_with_header(WALLET_HEADER, "FvmBq...abc");
        assert_eq!(wallet_address(&request), Some("FvmBq...abc".to_string()));
    }

    #[test]
    fn falls_back_to_cookie() {
        let request =
            request_with_header("cookie", "theme=dark; publicKey=9xQeWvG8...xyz; lang=en");
        assert_eq!(wallet_address(&request), Some("9xQeWvG8...xyz".to_string()));
    }

    #[test]
    fn absent_identity_is_none() {
        let request = Request::new(Body::empty());
        assert_eq!(wallet_address(&request), None);

        let request = request_with_header("cookie", "theme=dark");
        assert_eq!(wallet_address(&request), None);
    }

    #[test]
    fn require_identity_rejects_missing() {
        assert!(require_identity(None).is_err());
        let identity = WalletIdentity("abc".to_string());
        assert!(require_identity(Some(&identity)).is_ok());
    }
}
