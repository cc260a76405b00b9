//! Canvas pagination: `Link` header parsing and page-body decoding.

use reqwest::header::{HeaderMap, LINK};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CanvasError, Result};

/// Return the `rel="next"` target from a `Link` header, if any.
///
/// Canvas sends links like
/// `<https://x/api/v1/courses?page=2&per_page=10>; rel="next", <...>; rel="last"`.
/// Targets are read between `<` and `>`, so commas inside a URL are kept.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(find_next)
}

fn find_next(header: &str) -> Option<String> {
    let mut rest = header;
    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        let close = after.find('>')?;
        let url = &after[..close];
        let tail = &after[close + 1..];
        let params = &tail[..tail.find('<').unwrap_or(tail.len())];

        if !url.is_empty() && is_next(params) {
            return Some(url.to_string());
        }
        rest = tail;
    }
    None
}

fn is_next(params: &str) -> bool {
    params.split(';').any(|param| {
        let mut kv = param.splitn(2, '=');
        let key = kv.next().map(str::trim);
        let value = kv
            .next()
            .map(|v| v.trim().trim_end_matches(',').trim().trim_matches('"'));
        key == Some("rel") && value.is_some_and(|v| v.split_whitespace().any(|r| r == "next"))
    })
}

/// Decode one page body into items.
///
/// A bare object is treated as a single-item page.
pub(crate) fn decode_page<T: DeserializeOwned>(resource: &str, body: &str) -> Result<Vec<T>> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| CanvasError::malformed(resource, e, body))?;

    let values = match value {
        Value::Array(values) => values,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(CanvasError::malformed(
                resource,
                "expected a JSON array or object",
                &other.to_string(),
            ))
        }
    };

    values
        .into_iter()
        .map(|v| {
            let fragment = v.to_string();
            serde_json::from_value(v).map_err(|e| CanvasError::malformed(resource, e, &fragment))
        })
        .collect()
}
