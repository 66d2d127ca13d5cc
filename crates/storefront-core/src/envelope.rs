//! Response envelope decoding.
//!
//! The backend reports outcomes on two channels: the HTTP status and an
//! application code embedded in the JSON body:
//!
//! ```json
//! { "code": 0, "data": { ... } }
//! ```
//!
//! [`decode`] folds both into a single `Result`. It is pure and never panics.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{DEFAULT_ERROR_MESSAGE, Error, TransientError, TransportError};
use crate::traits::RawResponse;

/// Application code signalling success.
pub const SUCCESS_CODE: i64 = 0;

/// Wire format of every response body.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "code")]
    pub app_code: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Classify a transport outcome.
///
/// Returns the envelope `data` on success.
pub fn decode(outcome: Result<RawResponse, TransportError>) -> Result<serde_json::Value, Error> {
    let response = outcome?;
    let status = response.status;

    match status {
        401 => {
            return Err(Error::Unauthorized {
                message: body_message(&response.body).unwrap_or_else(|| "Unauthorized".into()),
            });
        }
        403 => {
            return Err(Error::Forbidden {
                message: body_message(&response.body).unwrap_or_else(|| "Forbidden".into()),
            });
        }
        s if s >= 500 => {
            return Err(TransientError::Server {
                status,
                message: body_message(&response.body).unwrap_or_else(|| "Server error".into()),
            }
            .into());
        }
        _ => {}
    }

    let envelope: Envelope = match serde_json::from_slice(&response.body) {
        Ok(envelope) => envelope,
        Err(_) => return Err(Error::other(Some(status), DEFAULT_ERROR_MESSAGE)),
    };

    if envelope.app_code != SUCCESS_CODE {
        return Err(Error::Application {
            code: envelope.app_code,
            message: data_message(&envelope.data)
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        });
    }

    // A success code on an error status is contradictory.
    if !(200..300).contains(&status) {
        return Err(Error::other(
            Some(status),
            data_message(&envelope.data).unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        ));
    }

    Ok(envelope.data)
}

/// Convert decoded envelope data into a caller type.
pub fn decode_data<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, Error> {
    serde_json::from_value(data).map_err(|e| Error::Decode {
        message: e.to_string(),
    })
}

/// Best-effort message from an error body: `data.message`, then `message`.
fn body_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    data_message(&value["data"]).or_else(|| value["message"].as_str().map(str::to_string))
}

fn data_message(data: &serde_json::Value) -> Option<String> {
    data["message"]
        .as_str()
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, OtherError};
    use serde_json::json;

    fn respond(status: u16, body: serde_json::Value) -> Result<RawResponse, TransportError> {
        Ok(RawResponse::json(status, &body))
    }

    #[test]
    fn success_returns_data() {
        let payload = json!({"items": [1, 2, 3], "total": 3});
        let data = decode(respond(200, json!({"code": 0, "data": payload.clone()}))).unwrap();
        assert_eq!(data, payload);
    }

    #[test]
    fn success_without_data_is_null() {
        let data = decode(respond(200, json!({"code": 0}))).unwrap();
        assert!(data.is_null());
    }

    #[test]
    fn nonzero_code_is_application_error() {
        let err = decode(respond(200, json!({"code": 2, "data": {"message": "foo"}}))).unwrap_err();
        match err {
            Error::Application { code, message } => {
                assert_eq!(code, 2);
                assert_eq!(message, "foo");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn application_error_without_message_uses_default() {
        let err = decode(respond(200, json!({"code": 1, "data": null}))).unwrap_err();
        assert_eq!(err.user_message(), DEFAULT_ERROR_MESSAGE);
    }

    #[test]
    fn status_takes_precedence_over_envelope() {
        let body = json!({"code": 0, "data": {"message": "token expired"}});
        let err = decode(respond(401, body.clone())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.user_message(), "token expired");

        let err = decode(respond(403, body.clone())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = decode(respond(503, body)).unwrap_err();
        assert!(matches!(
            err,
            Error::Transient(TransientError::Server { status: 503, .. })
        ));
    }

    #[test]
    fn no_response_is_transient() {
        let err = decode(Err(TransportError::Connection {
            message: "connection refused".into(),
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn client_error_with_envelope_is_application_error() {
        let err = decode(respond(
            400,
            json!({"code": 1, "data": {"message": "Email already used"}}),
        ))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Application);
        assert_eq!(err.user_message(), "Email already used");
    }

    #[test]
    fn unparseable_body_is_other() {
        let outcome = Ok(RawResponse {
            status: 404,
            body: b"<html>Not Found</html>".to_vec(),
        });
        match decode(outcome).unwrap_err() {
            Error::Other(OtherError { status, .. }) => assert_eq!(status, Some(404)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decode_data_into_type() {
        #[derive(Debug, Deserialize)]
        struct Product {
            id: u64,
        }

        let product: Product = decode_data(json!({"id": 7})).unwrap();
        assert_eq!(product.id, 7);

        let err = decode_data::<Product>(json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
