//! Minimal HTTP surface for the status endpoint.
//!
//! The node serves at most one client per tick. Requests are a single
//! request line (the platform reads until `\r\n\r\n` or disconnect); only
//! the path token matters. Responses are built byte-exact into a fixed
//! buffer — no allocation, no chunking, connection closed after one
//! response.

use core::fmt::Write as _;

use heapless::{String, Vec};
use thiserror_no_std::Error;

use crate::motion::AccelSample;
use crate::node::SensorNode;
use crate::report::LinkStatus;

/// Upper bound for one full response (headers + JSON body).
pub const RESPONSE_CAPACITY: usize = 1024;

/// Scratch space for the serialized JSON payload.
const JSON_CAPACITY: usize = 768;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HttpError {
    #[error("response exceeds buffer capacity")]
    ResponseOverflow,
    #[error("payload serialization failed")]
    PayloadSerialization,
}

/// The recognized endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Status,
    Alert,
    NotFound,
}

/// Extract the path from a raw request: the token between the first two
/// spaces of the request line. Malformed request lines default to `/`.
pub fn extract_path(request: &[u8]) -> &str {
    let line_end = request
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(request.len());
    let Ok(line) = core::str::from_utf8(&request[..line_end]) else {
        return "/";
    };

    let mut tokens = line.split(' ');
    let _method = tokens.next();
    match tokens.next() {
        Some(path) if !path.is_empty() => path,
        _ => "/",
    }
}

/// Map a path to a route. Query strings and fragments never affect routing.
pub fn route(path: &str) -> Route {
    let path = path
        .split_once(['?', '#'])
        .map_or(path, |(before, _)| before);
    match path {
        "/" | "/status" => Route::Status,
        "/alert" => Route::Alert,
        _ => Route::NotFound,
    }
}

/// Build the full response for a raw request into `out`.
///
/// `sample` is the report-time accelerometer re-read the platform took just
/// before serving; it feeds the status payload only.
pub fn respond(
    node: &SensorNode,
    sample: AccelSample,
    link: LinkStatus,
    now_ms: u64,
    request: &[u8],
    out: &mut Vec<u8, RESPONSE_CAPACITY>,
) -> Result<(), HttpError> {
    let mut json = [0u8; JSON_CAPACITY];

    match route(extract_path(request)) {
        Route::Status => {
            let report = node.status_report(sample, link, now_ms);
            let len = serde_json_core::to_slice(&report, &mut json)
                .map_err(|_| HttpError::PayloadSerialization)?;
            ok_json(&json[..len], out)
        }
        Route::Alert => {
            let report = node.alert_report(now_ms);
            let len = serde_json_core::to_slice(&report, &mut json)
                .map_err(|_| HttpError::PayloadSerialization)?;
            ok_json(&json[..len], out)
        }
        Route::NotFound => not_found(out),
    }
}

/// `200 OK` with a JSON body and permissive CORS headers.
fn ok_json(body: &[u8], out: &mut Vec<u8, RESPONSE_CAPACITY>) -> Result<(), HttpError> {
    push(out, b"HTTP/1.1 200 OK\r\n")?;
    push(out, b"Content-Type: application/json\r\n")?;
    push(out, b"Access-Control-Allow-Origin: *\r\n")?;
    push(out, b"Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n")?;
    push(out, b"Access-Control-Allow-Headers: Content-Type\r\n")?;
    push_content_length(out, body.len())?;
    push(out, b"Connection: close\r\n\r\n")?;
    push(out, body)
}

/// `404 Not Found`, plain text, fixed body.
fn not_found(out: &mut Vec<u8, RESPONSE_CAPACITY>) -> Result<(), HttpError> {
    const BODY: &[u8] = b"Endpoint not found";
    push(out, b"HTTP/1.1 404 Not Found\r\n")?;
    push(out, b"Content-Type: text/plain\r\n")?;
    push_content_length(out, BODY.len())?;
    push(out, b"Connection: close\r\n\r\n")?;
    push(out, BODY)
}

fn push_content_length(
    out: &mut Vec<u8, RESPONSE_CAPACITY>,
    len: usize,
) -> Result<(), HttpError> {
    let mut header: String<32> = String::new();
    write!(header, "Content-Length: {len}\r\n").map_err(|_| HttpError::ResponseOverflow)?;
    push(out, header.as_bytes())
}

fn push(out: &mut Vec<u8, RESPONSE_CAPACITY>, bytes: &[u8]) -> Result<(), HttpError> {
    out.extend_from_slice(bytes)
        .map_err(|_| HttpError::ResponseOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TuningConfig;

    fn node() -> SensorNode {
        SensorNode::new(TuningConfig::default())
    }

    fn at_rest() -> AccelSample {
        AccelSample::new(0.0, 0.0, 1.0)
    }

    fn serve(node: &SensorNode, request: &[u8]) -> alloc::string::String {
        let mut out = Vec::new();
        respond(node, at_rest(), LinkStatus::default(), 7000, request, &mut out)
            .expect("response fits");
        core::str::from_utf8(&out).unwrap().into()
    }

    #[test]
    fn test_path_extraction() {
        assert_eq!(extract_path(b"GET /status HTTP/1.1\r\n"), "/status");
        assert_eq!(extract_path(b"GET / HTTP/1.1\r\n"), "/");
        assert_eq!(extract_path(b"GET /alert\r\n"), "/alert");
    }

    #[test]
    fn test_malformed_request_line_defaults_to_root() {
        assert_eq!(extract_path(b"GARBAGE\r\n"), "/");
        assert_eq!(extract_path(b""), "/");
        assert_eq!(extract_path(b"\r\n"), "/");
        assert_eq!(extract_path(&[0xff, 0xfe, b' ', b'x']), "/");
    }

    #[test]
    fn test_routing_ignores_query_string() {
        assert_eq!(route("/status?verbose=1"), Route::Status);
        assert_eq!(route("/unknown?x=1"), Route::NotFound);
        assert_eq!(route("/alert"), Route::Alert);
        assert_eq!(route("/"), Route::Status);
        assert_eq!(route("/alerts"), Route::NotFound);
    }

    #[test]
    fn test_status_response_shape() {
        let mut n = node();
        n.tick(at_rest(), 1000);
        n.tick(at_rest(), 1050);

        let response = serve(&n, b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: application/json\r\n"));
        assert!(response.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(response.contains(r#""shake_detected":false"#));
        assert!(response.contains(r#""timestamp":7000"#));
        assert!(response.contains(r#""magnitude":1.0"#), "response: {response}");
    }

    #[test]
    fn test_root_serves_status_too() {
        let response = serve(&node(), b"GET / HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains(r#""accelerometer""#));
    }

    #[test]
    fn test_alert_response_idle() {
        let response = serve(&node(), b"GET /alert HTTP/1.1\r\n\r\n");
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        assert_eq!(
            body,
            r#"{"alert_response":{"alert_active":false,"timestamp":7000}}"#
        );
    }

    #[test]
    fn test_unknown_path_is_404() {
        let response = serve(&node(), b"GET /unknown?q=1 HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.ends_with("\r\n\r\nEndpoint not found"));
    }

    #[test]
    fn test_content_length_matches_body() {
        let response = serve(&node(), b"GET /alert HTTP/1.1\r\n\r\n");
        let (head, body) = response.split_once("\r\n\r\n").unwrap();
        let declared: usize = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .expect("header present")
            .parse()
            .unwrap();
        assert_eq!(declared, body.len());
    }
}
