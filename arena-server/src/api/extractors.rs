//! Custom Axum extractors for request authentication.
//!
//! Provides `SignedBody`, the raw request body together with its optional
//! `X-Arena-Signature` header. Handlers verify it against whichever secret
//! guards their endpoint, because the JSON must be checked byte for byte
//! before it is parsed.
//!
//! All cryptographic operations are delegated to [`arena_sdk::signature`].

use arena_sdk::signature::{self, SIGNATURE_HEADER, SignatureError};
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Upper bound on accepted request bodies.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// The exact bytes of a request body and its signature header, if any.
#[derive(Debug, Clone)]
pub struct SignedBody {
    pub bytes: Bytes,
    pub signature: Option<String>,
}

/// Errors that can occur during signed-body verification.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum SignedBodyError {
    #[error("missing X-Arena-Signature header")]
    MissingHeader,
    #[error("invalid X-Arena-Signature header")]
    InvalidHeader,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("signature verification failed")]
    VerificationFailed,
}

impl SignedBody {
    /// Check the body against `secret`. Without a secret every body passes.
    pub fn verify(&self, secret: Option<&[u8]>) -> Result<(), SignedBodyError> {
        let Some(secret) = secret else {
            return Ok(());
        };
        let header = self
            .signature
            .as_deref()
            .ok_or(SignedBodyError::MissingHeader)?;
        signature::verify(&self.bytes, header, secret).map_err(|e| match e {
            SignatureError::InvalidHex => SignedBodyError::InvalidHeader,
            _ => SignedBodyError::VerificationFailed,
        })
    }
}

impl IntoResponse for SignedBodyError {
    fn into_response(self) -> Response {
        let status = match self {
            SignedBodyError::MissingHeader => StatusCode::UNAUTHORIZED,
            SignedBodyError::BodyReadError => StatusCode::BAD_REQUEST,
            SignedBodyError::InvalidHeader | SignedBodyError::VerificationFailed => {
                StatusCode::FORBIDDEN
            }
        };
        (status, self.to_string()).into_response()
    }
}

impl<S: Send + Sync> FromRequest<S> for SignedBody {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let signature = match req.headers().get(SIGNATURE_HEADER) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| SignedBodyError::InvalidHeader)?
                    .to_owned(),
            ),
            None => None,
        };

        let bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| SignedBodyError::BodyReadError)?;

        Ok(SignedBody { bytes, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str, signature: Option<String>) -> SignedBody {
        SignedBody {
            bytes: Bytes::from(json.to_owned()),
            signature,
        }
    }

    #[test]
    fn unsigned_endpoints_accept_anything() {
        assert!(body("{}", None).verify(None).is_ok());
        assert!(body("{}", Some("zz".into())).verify(None).is_ok());
    }

    #[test]
    fn signed_endpoints_check_the_exact_bytes() {
        let secret = b"shared";
        let good = signature::sign(br#"{"a":1}"#, secret);

        assert!(body(r#"{"a":1}"#, Some(good.clone())).verify(Some(secret)).is_ok());
        assert!(matches!(
            body(r#"{"a": 1}"#, Some(good)).verify(Some(secret)),
            Err(SignedBodyError::VerificationFailed)
        ));
        assert!(matches!(
            body(r#"{"a":1}"#, None).verify(Some(secret)),
            Err(SignedBodyError::MissingHeader)
        ));
        assert!(matches!(
            body(r#"{"a":1}"#, Some("not-hex".into())).verify(Some(secret)),
            Err(SignedBodyError::InvalidHeader)
        ));
    }
}
