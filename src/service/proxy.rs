//! HTTP front-end proxy.
//!
//! Translates plain `GET`-with-query requests into filter-service wire
//! calls and relays the JSON response. The HTTP handling is deliberately
//! minimal: one request per connection, GET only, no body parsing —
//! enough surface for load generators and curl.
//!
//! Routes: `/insert?score=<f32>`, `/get-max`, `/get-min`, `/remove-max`,
//! `/remove-min`, `/get-size`, `/clear`.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::item::Item;
use crate::service::client::FilterClient;
use crate::service::wire::Response;

/// Fixed payload attached to proxied inserts; the filter never reads it.
const INSERT_PAYLOAD: [u8; 4] = [0x01, 0x02, 0x03, 0x04];

/// The HTTP-to-wire proxy.
pub struct Proxy {
    config: ProxyConfig,
    client: Arc<FilterClient>,
}

impl Proxy {
    /// Builds a proxy for the configured upstream filter service.
    ///
    /// # Errors
    ///
    /// Returns configuration validation errors.
    pub fn new(config: ProxyConfig) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(FilterClient::new(config.filter_addr.clone()));
        Ok(Self { config, client })
    }

    /// Binds the configured port and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the port cannot be bound.
    pub fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))?;
        log::info!(
            "http proxy {} running at port: {}",
            self.config.id,
            self.config.port
        );
        self.serve(&listener)
    }

    /// Serves connections from an already-bound listener. Exposed so
    /// tests can bind an ephemeral port first.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if accepting fails fatally.
    pub fn serve(&self, listener: &TcpListener) -> Result<()> {
        loop {
            let (stream, _peer) = match listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("proxy accept error: {e}");
                    continue;
                }
            };
            let client = Arc::clone(&self.client);
            std::thread::spawn(move || {
                if let Err(e) = handle_connection(&client, stream) {
                    log::debug!("proxy connection ended: {e}");
                }
            });
        }
    }
}

/// Serves one HTTP request and closes the connection.
fn handle_connection(client: &FilterClient, stream: TcpStream) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(());
    }
    // Drain the headers; none of them affect routing.
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        if header == "\r\n" || header == "\n" {
            break;
        }
    }

    let mut writer = BufWriter::new(stream);
    let Some((method, target)) = parse_request_line(&request_line) else {
        return write_http_response(&mut writer, 400, "text/plain", b"malformed request line");
    };
    if method != "GET" {
        return write_http_response(&mut writer, 405, "text/plain", b"only GET is supported");
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    let started = Instant::now();
    let (status, body) = respond(client, path, query);
    log::info!(
        "proxy{};{};{};{}us",
        path.replace('/', "."),
        query,
        if status == 200 { "ok" } else { "error" },
        started.elapsed().as_micros()
    );

    let content_type = if status == 200 {
        "application/json"
    } else {
        "text/plain"
    };
    write_http_response(&mut writer, status, content_type, body.as_bytes())
}

/// Routes one request to the upstream client. Returns the HTTP status
/// and the response body.
fn respond(client: &FilterClient, path: &str, query: &str) -> (u16, String) {
    match path {
        "/insert" => {
            let Some(raw) = query_param(query, "score") else {
                return (400, "Malformed request to `/insert` endpoint!".to_string());
            };
            let Ok(score) = raw.parse::<f32>() else {
                return (400, "Malformed request to `/insert` endpoint!".to_string());
            };
            let item = Item::new(score, INSERT_PAYLOAD.to_vec());
            relay(client.insert(item).map(|()| Response::success()))
        }
        "/get-max" => relay(client.get_max().map(Response::with_item)),
        "/get-min" => relay(client.get_min().map(Response::with_item)),
        "/remove-max" => relay(client.remove_max().map(Response::with_item)),
        "/remove-min" => relay(client.remove_min().map(Response::with_item)),
        "/get-size" => relay(client.get_size().map(Response::with_size)),
        "/clear" => relay(client.clear().map(|()| Response::success())),
        _ => (404, format!("no such endpoint: {path}")),
    }
}

/// Encodes a successful wire response as the 200 body, or the error text
/// as a 500 body.
fn relay(outcome: Result<Response>) -> (u16, String) {
    match outcome {
        Ok(response) => match serde_json::to_string(&response) {
            Ok(body) => (200, body),
            Err(e) => (500, e.to_string()),
        },
        Err(e) => (500, e.to_string()),
    }
}

/// Splits `GET /path?query HTTP/1.1` into method and target.
fn parse_request_line(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    parts.next()?; // the HTTP version must be present
    Some((method, target))
}

/// Extracts one query parameter by name, without URL decoding — scores
/// are plain numerals.
fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn write_http_response<W: Write>(
    writer: &mut W,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    };
    write!(
        writer,
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_line_parsing() {
        assert_eq!(
            parse_request_line("GET /insert?score=1.5 HTTP/1.1\r\n"),
            Some(("GET", "/insert?score=1.5"))
        );
        assert_eq!(parse_request_line("GET\r\n"), None);
        assert_eq!(parse_request_line(""), None);
    }

    #[test]
    fn query_param_extraction() {
        assert_eq!(query_param("score=1.5", "score"), Some("1.5"));
        assert_eq!(query_param("a=1&score=0.25&b=2", "score"), Some("0.25"));
        assert_eq!(query_param("", "score"), None);
        assert_eq!(query_param("scores=9", "score"), None);
    }

    #[test]
    fn insert_without_score_is_bad_request() {
        let client = FilterClient::new("127.0.0.1:1");
        let (status, _) = respond(&client, "/insert", "");
        assert_eq!(status, 400);
        let (status, _) = respond(&client, "/insert", "score=not-a-number");
        assert_eq!(status, 400);
    }

    #[test]
    fn unknown_path_is_not_found() {
        let client = FilterClient::new("127.0.0.1:1");
        let (status, body) = respond(&client, "/stats", "");
        assert_eq!(status, 404);
        assert!(body.contains("/stats"));
    }

    #[test]
    fn unreachable_upstream_is_internal_error() {
        let client = FilterClient::new("127.0.0.1:1");
        let (status, _) = respond(&client, "/get-size", "");
        assert_eq!(status, 500);
    }

    #[test]
    fn http_response_formatting() {
        let mut buf = Vec::new();
        write_http_response(&mut buf, 200, "application/json", b"{}").unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\n{}"));
    }
}
