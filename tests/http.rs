//! Real HTTP round trips against a loopback server.
//!
//! A tiny server on `127.0.0.1` answers each connection with the next
//! scripted response and records the raw request it received, so these
//! tests pin what actually goes over the wire: download error mapping,
//! query encoding, headers and JSON bodies.

use esd_crawl::pipeline::input::{resolve_input, PdfSource, ResolvedInput};
use esd_crawl::{
    AirtableClient, AirtableConfig, CrawlError, ErrorKind, Fields, MemoryStore, TableFinder,
    TableFinderConfig,
};
use serde_json::{json, Value};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

// ── Loopback server ──────────────────────────────────────────────────────────

struct Reply {
    status: u16,
    reason: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    fn json(status: u16, reason: &'static str, body: &str) -> Self {
        Self {
            status,
            reason,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    fn bytes(content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type,
            body: body.to_vec(),
        }
    }
}

struct Server {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Server {
    /// Serve one connection per reply, in order, on a background thread.
    fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        thread::spawn(move || {
            for reply in replies {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                seen.lock().unwrap().push(read_request(&mut stream));
                let head = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    reply.status,
                    reply.reason,
                    reply.content_type,
                    reply.body.len()
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&reply.body);
                let _ = stream.flush();
            }
        });

        Self { addr, requests }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Read one request: the head, then `Content-Length` bytes of body.
fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request_line(raw: &str) -> &str {
    raw.lines().next().unwrap_or_default()
}

fn body_json(raw: &str) -> Value {
    let (_, body) = raw.split_once("\r\n\r\n").expect("request has a body");
    serde_json::from_str(body).unwrap()
}

const TINY_PDF: &[u8] = b"%PDF-1.4\n%%EOF\n";

// ── Downloads ────────────────────────────────────────────────────────────────

#[test]
fn download_404_is_network_error() {
    let server = Server::start(vec![Reply::json(404, "Not Found", "{}")]);
    let url = server.url("/missing.pdf");

    let finder = TableFinder::with_store(TableFinderConfig::default(), MemoryStore::new());
    let err = finder.find_tables_from_url(&url, &()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network, "got {err}");
    match err {
        CrawlError::DownloadFailed { url: failed, reason } => {
            assert_eq!(failed, url);
            assert!(reason.contains("404"), "{reason}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(finder.store().is_empty());
    assert_eq!(request_line(&server.requests()[0]), "GET /missing.pdf HTTP/1.1");
}

#[test]
fn download_of_html_is_not_a_pdf() {
    let server = Server::start(vec![Reply::bytes("text/html", b"<html>login</html>")]);
    let url = server.url("/report.pdf");

    let err = resolve_input(PdfSource::Url(url.clone()), 5).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Document);
    match err {
        CrawlError::NotAPdf { path, magic } => {
            assert_eq!(&magic, b"<htm");
            assert_eq!(path, PathBuf::from(url));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn downloaded_pdf_lives_in_scratch_file_until_dropped() {
    let server = Server::start(vec![Reply::bytes("application/pdf", TINY_PDF)]);

    let resolved = resolve_input(PdfSource::from(server.url("/ok.pdf").as_str()), 5).unwrap();
    assert!(matches!(resolved, ResolvedInput::Scratch(_)));
    let path = resolved.path().to_path_buf();
    assert_eq!(std::fs::read(&path).unwrap(), TINY_PDF);

    drop(resolved);
    assert!(!path.exists());
}

// ── Airtable over HTTP ───────────────────────────────────────────────────────

fn airtable(server: &Server) -> AirtableClient {
    let config = AirtableConfig::builder()
        .api_root(server.url("/v0"))
        .api_key("keyTest123")
        .timeout_secs(5)
        .build()
        .unwrap();
    AirtableClient::new(config).unwrap()
}

#[test]
fn upsert_sends_encoded_lookup_then_create() {
    let server = Server::start(vec![
        Reply::json(200, "OK", r#"{"records":[]}"#),
        Reply::json(200, "OK", r#"{"records":[{"id":"rec456","fields":{}}]}"#),
    ]);
    let mut fields = Fields::new();
    fields.insert("myattr".into(), json!("foo & bar"));

    let id = airtable(&server)
        .upsert_record("123", "Fake", "myattr", &fields)
        .unwrap();
    assert_eq!(id, "rec456");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);

    let lookup = &requests[0];
    assert_eq!(
        request_line(lookup),
        "GET /v0/123/Fake?maxRecords=1&filterByFormula=%7Bmyattr%7D+%3D+%27foo+%26+bar%27 HTTP/1.1"
    );
    assert!(lookup.to_ascii_lowercase().contains("authorization: bearer keytest123"));

    let create = &requests[1];
    assert_eq!(request_line(create), "POST /v0/123/Fake HTTP/1.1");
    assert!(create.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(create.to_ascii_lowercase().contains("authorization: bearer keytest123"));
    assert_eq!(body_json(create), json!({"fields": {"myattr": "foo & bar"}}));
}

#[test]
fn create_404_over_http_is_remote_api_error() {
    let server = Server::start(vec![Reply::json(404, "Not Found", r#"{"error":"NOT_FOUND"}"#)]);
    let mut fields = Fields::new();
    fields.insert("myattr".into(), json!("foo"));

    let err = airtable(&server)
        .create_record("123", "Fake", &fields)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteApi);
    assert!(matches!(err, CrawlError::RemoteApi { status: 404, ref body } if body.contains("NOT_FOUND")));
}

#[test]
fn unreachable_api_is_network_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let config = AirtableConfig::builder()
        .api_root(format!("http://{addr}/v0"))
        .timeout_secs(5)
        .build()
        .unwrap();

    let err = AirtableClient::new(config)
        .unwrap()
        .find_record("123", "Fake", "myattr", &json!("foo"))
        .unwrap_err();
    assert!(matches!(err, CrawlError::RequestFailed { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Network);
}
