//! Response interpretation.
//!
//! Parses raw response bodies (plain JSON, JSONP padding, legacy
//! query-service envelopes) into payload values and resolves the embed
//! markup through the builder chain: invocation-level builder, then the
//! provider's builder, then the payload's literal `html` field.

use serde_json::Value;

use crate::error::{EmbedError, Result};
use crate::provider::{CodeBuilder, Provider};
use crate::request::RequestMode;

/// Parse a response body according to the request mode.
///
/// JSONP bodies are unwrapped first; a body without padding parses as-is,
/// since some endpoints ignore the callback parameter. Legacy query-service
/// bodies additionally have their envelope unwrapped down to the single
/// result record.
pub fn parse_payload(body: &str, mode: RequestMode) -> Result<Value> {
    let text = match mode {
        RequestMode::Json => body.trim(),
        RequestMode::Jsonp | RequestMode::LegacyQuery => strip_jsonp(body),
    };
    let value: Value = serde_json::from_str(text)?;

    if mode == RequestMode::LegacyQuery {
        unwrap_legacy_envelope(&value)
    } else {
        Ok(value)
    }
}

/// Strip JSONP callback padding, returning the JSON between the outermost
/// parentheses. Bodies without padding are returned unchanged.
#[must_use]
pub fn strip_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(open), Some(close)) if open < close => trimmed[open + 1..close].trim(),
        _ => trimmed,
    }
}

/// Extract the single result record from a legacy query-service envelope
/// shaped as `{ "query": { "count": n, "results": ... } }`.
///
/// A zero count (or missing results) is an empty result. When the service
/// returns more than one record, the first is used.
pub fn unwrap_legacy_envelope(value: &Value) -> Result<Value> {
    let count = value
        .pointer("/query/count")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if count == 0 {
        return Err(EmbedError::EmptyResult);
    }

    match value.pointer("/query/results") {
        Some(Value::Array(records)) => records.first().cloned().ok_or(EmbedError::EmptyResult),
        Some(Value::Null) | None => Err(EmbedError::EmptyResult),
        // The service envelopes a single record as a bare object.
        Some(record) => Ok(record.clone()),
    }
}

/// Resolve embed markup for a payload.
///
/// Resolution order: the invocation-level builder, then the provider's
/// builder, then the payload's literal `html` field. A payload that none of
/// these understand is an unrecognized response shape.
pub fn build_markup(
    data: &Value,
    invocation_builder: Option<&CodeBuilder>,
    provider: &Provider,
) -> Result<String> {
    if let Some(builder) = invocation_builder {
        return Ok(builder(data));
    }
    if let Some(builder) = &provider.code_builder {
        return Ok(builder(data));
    }
    if let Some(html) = data.get("html").and_then(Value::as_str) {
        return Ok(html.to_string());
    }
    Err(EmbedError::UnrecognizedResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::MediaKind;
    use serde_json::json;
    use std::sync::Arc;

    fn plain_provider() -> Provider {
        Provider::new("plain", MediaKind::Video)
            .urls([r"plain\.example/"])
            .api("https://plain.example/oembed")
    }

    #[test]
    fn strips_simple_padding() {
        assert_eq!(strip_jsonp(r#"cb({"html":"<i></i>"})"#), r#"{"html":"<i></i>"}"#);
    }

    #[test]
    fn strips_guarded_padding() {
        let body = r#"/**/ typeof cb === 'function' && cb({"a":1});"#;
        // Outermost parentheses win, whatever the guard looks like.
        assert_eq!(strip_jsonp(body), r#"{"a":1}"#);
    }

    #[test]
    fn leaves_unpadded_bodies_alone() {
        assert_eq!(strip_jsonp(r#"{"html":"x"}"#), r#"{"html":"x"}"#);
    }

    #[test]
    fn parses_plain_json() {
        let value = parse_payload(r#"{"html":"<iframe></iframe>"}"#, RequestMode::Json).unwrap();
        assert_eq!(value["html"], "<iframe></iframe>");
    }

    #[test]
    fn invalid_json_is_a_payload_error() {
        let err = parse_payload("<html>not json</html>", RequestMode::Json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn parses_jsonp_bodies() {
        let value =
            parse_payload(r#"inlaycb0({"html":"<b>x</b>"})"#, RequestMode::Jsonp).unwrap();
        assert_eq!(value["html"], "<b>x</b>");
    }

    #[test]
    fn legacy_envelope_yields_the_first_record() {
        let body = r#"cb({"query":{"count":2,"results":[{"html":"<b>first</b>"},{"html":"<b>second</b>"}]}})"#;
        let value = parse_payload(body, RequestMode::LegacyQuery).unwrap();
        assert_eq!(value["html"], "<b>first</b>");
    }

    #[test]
    fn legacy_envelope_accepts_a_bare_record() {
        let body = r#"cb({"query":{"count":1,"results":{"json":{"html":"<b>x</b>"}}}})"#;
        let value = parse_payload(body, RequestMode::LegacyQuery).unwrap();
        assert_eq!(value["json"]["html"], "<b>x</b>");
    }

    #[test]
    fn empty_legacy_envelope_is_an_empty_result() {
        let body = r#"cb({"query":{"count":0,"results":null}})"#;
        let err = parse_payload(body, RequestMode::LegacyQuery).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn markup_uses_the_html_field_when_no_builder_exists() {
        let data = json!({"html": "<iframe></iframe>"});
        let markup = build_markup(&data, None, &plain_provider()).unwrap();
        assert_eq!(markup, "<iframe></iframe>");
    }

    #[test]
    fn invocation_builder_wins_over_everything() {
        let data = json!({"html": "<iframe></iframe>"});
        let provider = plain_provider().code_builder(|_| "<provider/>".to_string());
        let invocation: CodeBuilder = Arc::new(|_: &Value| "<invocation/>".to_string());

        let markup = build_markup(&data, Some(&invocation), &provider).unwrap();
        assert_eq!(markup, "<invocation/>");
    }

    #[test]
    fn provider_builder_wins_over_the_html_field() {
        let data = json!({"html": "<iframe></iframe>"});
        let provider = plain_provider().code_builder(|_| "<provider/>".to_string());

        let markup = build_markup(&data, None, &provider).unwrap();
        assert_eq!(markup, "<provider/>");
    }

    #[test]
    fn shapeless_payloads_are_rejected() {
        let data = json!({});
        let err = build_markup(&data, None, &plain_provider()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedResponse);
    }

    #[test]
    fn non_string_html_fields_are_rejected() {
        let data = json!({"html": 42});
        let err = build_markup(&data, None, &plain_provider()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnrecognizedResponse);
    }
}
