//! Body decoding and method override (pipeline stages 1 and 2).

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::Response,
};
use url::form_urlencoded;

use crate::error::AppError;

/// Largest form body accepted, in bytes.
pub const FORM_BODY_LIMIT: usize = 100 * 1024;

/// Field (or query parameter) naming the verb a `POST` should be treated as.
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// Decoded fields of a `application/x-www-form-urlencoded` request body.
///
/// The raw body is put back on the request, so handlers can still use
/// `axum::Form`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    /// Decode a urlencoded payload.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        Self(form_urlencoded::parse(bytes).into_owned().collect())
    }

    /// First value of `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether the body carried no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stage 1: buffer and decode form bodies into [`FormFields`].
///
/// # Errors
///
/// Returns `AppError::PayloadTooLarge` if the body exceeds [`FORM_BODY_LIMIT`]
/// and `AppError::BadRequest` if it cannot be read.
pub async fn decode_form(request: Request, next: Next) -> Result<Response, AppError> {
    if !is_form(request.headers()) {
        return Ok(next.run(request).await);
    }

    let declared_len = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > FORM_BODY_LIMIT) {
        return Err(AppError::PayloadTooLarge);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, FORM_BODY_LIMIT)
        .await
        .map_err(|e| AppError::BadRequest(format!("could not read form body: {e}")))?;

    parts.extensions.insert(FormFields::parse(&bytes));

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Stage 2: let a `POST` stand in for `PUT`, `PATCH` or `DELETE`.
///
/// The target verb comes from the `_method` form field, or from a `_method`
/// query parameter (`<form method="post" action="/logout?_method=DELETE">`).
/// Any other value is ignored.
pub async fn method_override(mut request: Request, next: Next) -> Response {
    if request.method() == Method::POST {
        if let Some(method) = override_target(&request) {
            tracing::debug!(
                uri = %request.uri(),
                method = %method,
                "Overriding request method"
            );
            *request.method_mut() = method;
        }
    }

    next.run(request).await
}

fn override_target(request: &Request) -> Option<Method> {
    let from_form = request
        .extensions()
        .get::<FormFields>()
        .and_then(|fields| fields.get(METHOD_OVERRIDE_FIELD))
        .map(str::to_owned);

    let from_query = || {
        request.uri().query().and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == METHOD_OVERRIDE_FIELD)
                .map(|(_, value)| value.into_owned())
        })
    };

    parse_override(&from_form.or_else(from_query)?)
}

fn parse_override(raw: &str) -> Option<Method> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_parse() {
        let fields = FormFields::parse(b"username=ada&password=p%40ss+word&username=again");
        assert_eq!(fields.get("username"), Some("ada"));
        assert_eq!(fields.get("password"), Some("p@ss word"));
        assert_eq!(fields.get("missing"), None);
        assert!(FormFields::parse(b"").is_empty());
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(parse_override("delete"), Some(Method::DELETE));
        assert_eq!(parse_override(" PUT "), Some(Method::PUT));
        assert_eq!(parse_override("Patch"), Some(Method::PATCH));
        assert_eq!(parse_override("GET"), None);
        assert_eq!(parse_override("CONNECT"), None);
        assert_eq!(parse_override(""), None);
    }

    #[test]
    fn test_override_target_from_query() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/logout?_method=DELETE")
            .body(Body::empty())
            .unwrap();
        assert_eq!(override_target(&request), Some(Method::DELETE));
    }

    #[test]
    fn test_override_target_prefers_form_field() {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/items/1?_method=PUT")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(FormFields::parse(b"_method=delete"));
        assert_eq!(override_target(&request), Some(Method::DELETE));
    }

    #[test]
    fn test_is_form() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=utf-8".parse().unwrap(),
        );
        assert!(is_form(&headers));
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_form(&headers));
    }
}
