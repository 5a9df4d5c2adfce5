use crate::photo::decode_photo;
use crate::pipeline::{AssessOptions, ClaimPipeline};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_HEADER_BYTES: usize = 8192;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8899".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

/// Loopback HTTP service in front of a [`ClaimPipeline`].
///
/// Routes:
/// - `GET /health`
/// - `GET /costs`: the repair cost table
/// - `POST /assess?model=<name>&confidence=<f>`: body is the photo, answers a claim report
pub struct ApiServer {
    cfg: ApiConfig,
    pipeline: ClaimPipeline,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, pipeline: ClaimPipeline) -> Self {
        Self { cfg, pipeline }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        if !configured_addr.ip().is_loopback() {
            return Err(anyhow!(
                "claims api only serves loopback addresses, got '{}'",
                configured_addr
            ));
        }
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg;
        let pipeline = self.pipeline;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, &cfg, &pipeline, shutdown_thread) {
                log::error!("claims api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: &ApiConfig,
    pipeline: &ClaimPipeline,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, cfg, pipeline) {
                    log::warn!("claims api request rejected: {:#}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    cfg: &ApiConfig,
    pipeline: &ClaimPipeline,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    if !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, r#"{"error":"forbidden"}"#)?;
        return Ok(());
    }

    let request = read_request(&mut stream, cfg.max_upload_bytes);
    let request = match request {
        Ok(request) => request,
        Err(RequestError::TooLarge) => {
            write_json_response(&mut stream, 413, r#"{"error":"payload_too_large"}"#)?;
            return Ok(());
        }
        Err(RequestError::Malformed(err)) => {
            write_error(&mut stream, 400, &format!("{:#}", err))?;
            return Err(err);
        }
    };

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => write_json_response(&mut stream, 200, r#"{"status":"ok"}"#),
        ("GET", "/costs") => {
            let payload = serde_json::to_vec(pipeline.costs())?;
            write_response(&mut stream, 200, "application/json", &payload)
        }
        ("POST", "/assess") => handle_assess(&mut stream, pipeline, &request),
        (_, "/health") | (_, "/costs") | (_, "/assess") => {
            write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

/// Bad uploads and bad overrides answer 400; a detector that fails on a valid
/// request answers 500.
fn handle_assess(
    stream: &mut TcpStream,
    pipeline: &ClaimPipeline,
    request: &HttpRequest,
) -> Result<()> {
    let checked = request
        .assess_options()
        .and_then(|options| pipeline.check_options(&options).map(|_| options));
    let options = match checked {
        Ok(options) => options,
        Err(err) => return write_error(stream, 400, &format!("{:#}", err)),
    };
    let photo = match decode_photo(&request.body) {
        Ok(photo) => photo,
        Err(err) => {
            log::warn!("upload rejected: {:#}", err);
            return write_error(stream, 400, &format!("{:#}", err));
        }
    };
    let run = match pipeline.detect(&photo, &options) {
        Ok(run) => run,
        Err(err) => {
            log::error!("assessment failed: {:#}", err);
            return write_error(stream, 500, &format!("{:#}", err));
        }
    };

    let report = pipeline.report(&photo, run);
    log::info!(
        "assessed photo {} with {}: total {} and {} flags",
        report.photo_sha256,
        report.model,
        report.total_cost,
        report.fraud_flags.len()
    );
    let payload = serde_json::to_vec(&report)?;
    write_response(stream, 200, "application/json", &payload)
}

enum RequestError {
    TooLarge,
    Malformed(anyhow::Error),
}

impl From<anyhow::Error> for RequestError {
    fn from(err: anyhow::Error) -> Self {
        RequestError::Malformed(err)
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Malformed(err.into())
    }
}

fn read_request(
    stream: &mut TcpStream,
    max_body_bytes: usize,
) -> std::result::Result<HttpRequest, RequestError> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before headers").into());
        }
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request headers too large").into());
        }
    };

    let text = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = match headers.get("content-length") {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow!("invalid content-length '{}'", value))?,
        None => 0,
    };
    if content_length > max_body_bytes {
        return Err(RequestError::TooLarge);
    }

    let mut body = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!(
                "request body truncated: expected {} bytes, got {}",
                content_length,
                body.len()
            )
            .into());
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (raw_path.to_string(), HashMap::new()),
    };
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        query,
        body,
    })
}

fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

fn write_error(stream: &mut TcpStream, status: u16, message: &str) -> Result<()> {
    let body = serde_json::json!({ "error": message }).to_string();
    write_json_response(stream, status, &body)
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    body: Vec<u8>,
}

impl HttpRequest {
    fn assess_options(&self) -> Result<AssessOptions> {
        let model = self
            .query
            .get("model")
            .filter(|model| !model.is_empty())
            .cloned();
        let confidence = match self.query.get("confidence") {
            Some(value) => Some(
                value
                    .parse::<f32>()
                    .with_context(|| format!("invalid confidence '{}'", value))?,
            ),
            None => None,
        };
        Ok(AssessOptions { model, confidence })
    }
}
