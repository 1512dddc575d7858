//! Bearer token payload decoding.
//!
//! Only the payload segment is read. Signatures are checked by the backend, never here.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::json;

use crate::models::Claims;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenDecodeError {
    #[error("token does not have three segments")]
    Malformed,

    #[error("token payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token payload does not contain valid claims: {0}")]
    Claims(String),
}

/// Decodes the claims of a `header.payload.signature` token.
pub fn decode_token(token: &str) -> Result<Claims, TokenDecodeError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenDecodeError::Malformed);
    };
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenDecodeError::Claims(e.to_string()))
}

/// Builds an unsigned token carrying `claims`. Used by the in-memory backend.
#[must_use]
pub fn encode_unsigned(claims: &Claims) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let mut payload = json!({
        "token_type": "access",
        "user_id": claims.user_id,
        "role": claims.role.to_str(),
        "is_approved": claims.is_approved,
        "is_onboarded": claims.is_onboarded,
    });
    if let Some(exp) = claims.exp {
        payload["exp"] = exp.into();
    }
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{payload}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "{}.{}.c2ln",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_decode_backend_token() {
        let token = token_with_payload(
            r#"{"token_type":"access","exp":1767225600,"jti":"x","user_id":42,"role":"admin","is_approved":true,"is_onboarded":false}"#,
        );
        let claims = decode_token(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.is_approved);
        assert!(!claims.is_onboarded);
        assert_eq!(claims.exp, Some(1_767_225_600));
    }

    #[test]
    fn test_decode_round_trips_unsigned_token() {
        let claims = Claims {
            user_id: 3,
            role: Role::User,
            is_approved: false,
            is_onboarded: false,
            exp: None,
        };
        assert_eq!(decode_token(&encode_unsigned(&claims)), Ok(claims));
    }

    #[test]
    fn test_decode_never_panics_on_garbage() {
        for token in [
            "",
            ".",
            "..",
            "a.b",
            "a.b.c.d",
            "not a token",
            "x.%%%.y",
            "x.bm90IGpzb24.y",
            "x.e30.y",
            "\u{1f600}.\u{1f600}.\u{1f600}",
        ] {
            assert!(decode_token(token).is_err(), "{token:?} should not decode");
        }
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let token = token_with_payload(r#"{"user_id":1,"role":"superuser"}"#);
        assert!(matches!(
            decode_token(&token),
            Err(TokenDecodeError::Claims(_))
        ));
    }
}
