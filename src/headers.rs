use crate::http::{Headers, Response};

/// Splits a `Key: Value` string on its first colon. Returns `None` when there
/// is no colon at all.
pub fn parse_header(header: &str) -> Option<(&str, &str)> {
    let (key, value) = header.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Builds the request header mapping from `-H` arguments. Entries without a
/// colon are dropped; a repeated key keeps its first position and last value.
pub fn parse_headers<S: AsRef<str>>(list: &[S]) -> Headers {
    let mut headers = Headers::default();
    for entry in list {
        match parse_header(entry.as_ref()) {
            Some((key, value)) => headers.insert(key, value),
            None => tracing::debug!("skipping malformed header {:?}", entry.as_ref()),
        }
    }
    headers
}

pub fn format_response_headers(response: &Response) -> Vec<String> {
    let mut lines = Vec::with_capacity(response.headers().len() + 1);
    lines.push(format!(
        "Status: {} {}",
        response.status_code(),
        response.status_message()
    ));
    for (key, value) in response.headers().iter() {
        lines.push(format!("{key}: {value}"));
    }
    lines
}
