//! Capture proxy
//!
//! Plain HTTP/1.1 forward proxy. Every forwarded exchange becomes a
//! [`CapturedEntry`] tagged with the upstream port it was sent to.

use crate::models::{build_url, CapturedEntry, HttpMethod};
use crate::storage::StoreHandle;
use anyhow::{anyhow, Context};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

const MAX_HEADER_BYTES: usize = 64 * 1024;
const MAX_HEADER_COUNT: usize = 128;
const MAX_BODY_CAPTURE_BYTES: usize = 512 * 1024;
const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Idle time allowed for a client to send its request head
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
#[error("request body exceeds configured limit of {limit} bytes")]
struct RequestBodyTooLarge {
    limit: usize,
}

impl RequestBodyTooLarge {
    fn new(limit: usize) -> Self {
        Self { limit }
    }
}

/// Accept proxy connections until `shutdown` flips to `true`.
///
/// Each connection carries exactly one exchange and is closed afterwards.
pub async fn serve(
    listener: TcpListener,
    store: StoreHandle,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Capture proxy listening on {}", addr);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => {
                let (mut socket, peer_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                        continue;
                    }
                };
                tracing::debug!("Connection from {}", peer_addr);
                let store = store.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(&mut socket, &store).await {
                        let err_str = e.to_string().to_lowercase();
                        if err_str.contains("broken pipe")
                            || err_str.contains("connection reset")
                            || err_str.contains("connection closed")
                        {
                            tracing::debug!("Connection closed by client: {}", e);
                        } else {
                            tracing::error!("Error handling connection: {}", e);
                        }
                    }
                    let _ = socket.shutdown().await;
                });
            }
        }
    }

    tracing::info!("Capture proxy stopped");
    Ok(())
}

async fn handle_connection<S>(client: &mut S, store: &StoreHandle) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let req_start = Instant::now();
    let parsed = match tokio::time::timeout(REQUEST_READ_TIMEOUT, read_http_request(client)).await
    {
        Ok(Ok(parsed)) => parsed,
        Ok(Err(err)) => {
            let (code, label, body) = if err.downcast_ref::<RequestBodyTooLarge>().is_some() {
                (413, "Payload Too Large", "Request body exceeds allowed size")
            } else {
                (400, "Bad Request", "Unable to parse HTTP request")
            };
            tracing::warn!("Failed to parse request: {err}");
            let _ = respond_with_status(client, code, label, body).await;
            return Ok(());
        }
        Err(_) => {
            tracing::debug!("Timed out waiting for request head");
            return Ok(());
        }
    };

    if parsed.method == HttpMethod::Connect {
        tracing::info!("Rejecting CONNECT to {}:{}", parsed.host, parsed.port);
        respond_with_status(
            client,
            501,
            "Not Implemented",
            "Tunneling is not supported by the capture proxy",
        )
        .await?;
        return Ok(());
    }

    if parsed.scheme != "http" {
        respond_with_status(
            client,
            501,
            "Not Implemented",
            "Only plain HTTP targets can be captured",
        )
        .await?;
        return Ok(());
    }

    process_request(client, parsed, req_start, store).await
}

async fn process_request<S>(
    client: &mut S,
    mut parsed: ParsedRequest,
    req_start: Instant,
    store: &StoreHandle,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut entry = CapturedEntry::new(
        parsed.method,
        build_url(&parsed.scheme, &parsed.host, parsed.port, &parsed.path),
        parsed.port,
    );
    entry.http_version = parsed.version.clone();
    entry.request_headers = parsed.headers.clone();
    entry.request_content_type = header_value(&parsed.headers, "content-type").map(str::to_string);

    let mut upstream = match TcpStream::connect((parsed.host.as_str(), parsed.port)).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(
                "Failed to connect to upstream {}:{} - {}",
                parsed.host,
                parsed.port,
                err
            );
            respond_with_status(client, 502, "Bad Gateway", "Unable to reach upstream server")
                .await?;
            entry.fail(502, "Unable to reach upstream server", "Upstream connection failed");
            entry.timing.total_ms = Some(elapsed_ms(req_start));
            record(store, entry).await;
            return Ok(());
        }
    };

    let send_start = Instant::now();
    let mut request_capture = BodyCapture::new(MAX_BODY_CAPTURE_BYTES);
    let forward_result =
        forward_request_to_upstream(client, &mut upstream, &mut parsed, &mut request_capture).await;
    entry.request_body = request_capture.into_option();

    if let Err(err) = forward_result {
        let (code, label, body) = if err.downcast_ref::<RequestBodyTooLarge>().is_some() {
            (413, "Payload Too Large", "Request body exceeds allowed size")
        } else {
            (400, "Bad Request", "Failed to read request body")
        };
        tracing::warn!("Failed to forward request upstream: {err}");
        respond_with_status(client, code, label, body).await?;
        entry.fail(code, label, "Request body could not be forwarded");
        entry.timing.total_ms = Some(elapsed_ms(req_start));
        record(store, entry).await;
        return Ok(());
    }
    upstream.flush().await?;
    entry.timing.send_ms = Some(elapsed_ms(send_start));

    let waiting_start = Instant::now();
    let mut head = match read_response_head(&mut upstream).await {
        Ok(head) => head,
        Err(err) => {
            tracing::error!("Failed to read response head: {err}");
            respond_with_status(client, 502, "Bad Gateway", "Failed to read response").await?;
            entry.fail(502, "Failed to read response", "No response from upstream");
            entry.timing.total_ms = Some(elapsed_ms(req_start));
            record(store, entry).await;
            return Ok(());
        }
    };
    entry.timing.wait_ms = Some(elapsed_ms(waiting_start));

    let download_start = Instant::now();
    let no_body = parsed.method == HttpMethod::Head
        || (100..200).contains(&head.status_code)
        || head.status_code == 204
        || head.status_code == 304;
    let content_length =
        header_value(&head.headers, "content-length").and_then(|v| v.trim().parse::<usize>().ok());
    let is_chunked = header_value(&head.headers, "transfer-encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    let prefix = std::mem::take(&mut head.body_prefix);
    let mut response_capture = BodyCapture::new(MAX_BODY_CAPTURE_BYTES);
    let relayed = async {
        write_response_head(client, &head).await?;
        let wire_len = if no_body {
            0
        } else if is_chunked {
            forward_chunked_body(prefix, &mut upstream, client, &mut response_capture).await?
        } else if let Some(len) = content_length {
            forward_fixed_length_response(prefix, &mut upstream, client, len, &mut response_capture)
                .await?
        } else {
            relay_until_eof(prefix, &mut upstream, client, &mut response_capture).await?
        };
        client.flush().await?;
        Ok::<_, anyhow::Error>(wire_len)
    }
    .await;
    entry.timing.receive_ms = Some(elapsed_ms(download_start));

    entry.status_code = Some(head.status_code);
    entry.status_message = Some(head.reason);
    entry.response_content_type = header_value(&head.headers, "content-type").map(str::to_string);
    entry.response_headers = head.headers;
    entry.response_body = response_capture.into_option();
    entry.timing.total_ms = Some(elapsed_ms(req_start));

    let wire_len = match relayed {
        Ok(wire_len) => wire_len,
        Err(err) => {
            // The head may already be with the client, so only the record changes
            tracing::warn!("Response relay for {} failed: {err}", entry.url);
            entry.fail(
                502,
                "Failed to relay response",
                &format!("Response body relay failed: {err}"),
            );
            record(store, entry).await;
            return Err(err);
        }
    };
    entry.response_size = Some(wire_len);

    tracing::debug!(
        "{} {} -> {} ({} bytes, port {})",
        entry.method,
        entry.url,
        entry.status_code.unwrap_or(0),
        wire_len,
        entry.upstream_port
    );
    record(store, entry).await;
    Ok(())
}

async fn record(store: &StoreHandle, entry: CapturedEntry) {
    match store.get() {
        Ok(store) => {
            store.append(entry).await;
        }
        Err(err) => tracing::debug!("Dropping capture of {}: {}", entry.url, err),
    }
}

fn elapsed_ms(since: Instant) -> u32 {
    since.elapsed().as_millis().min(u32::MAX as u128) as u32
}

/// Parsed HTTP request with metadata required for forwarding/capture.
struct ParsedRequest {
    method: HttpMethod,
    scheme: String,
    host: String,
    port: u16,
    path: String,
    version: String,
    headers: Vec<(String, String)>,
    body_kind: RequestBodyKind,
    buffered_body: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
enum RequestBodyKind {
    None,
    ContentLength { length: usize },
    Chunked,
}

struct BodyCapture {
    buf: Vec<u8>,
    limit: usize,
}

impl BodyCapture {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    fn push(&mut self, data: &[u8]) {
        if self.buf.len() >= self.limit {
            return;
        }
        let remaining = self.limit - self.buf.len();
        let to_take = remaining.min(data.len());
        if to_take > 0 {
            self.buf.extend_from_slice(&data[..to_take]);
        }
    }

    fn into_option(self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf)
        }
    }

}

struct ResponseHead {
    version: String,
    status_code: u16,
    reason: String,
    headers: Vec<(String, String)>,
    body_prefix: Vec<u8>,
}

async fn read_http_request<S>(stream: &mut S) -> anyhow::Result<ParsedRequest>
where
    S: AsyncRead + Unpin,
{
    let (raw_head, buffered_body) = read_message_head(stream).await?;

    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
    let mut req = httparse::Request::new(&mut header_storage);
    let status = req.parse(&raw_head)?;
    if status.is_partial() {
        return Err(anyhow!("partial HTTP request"));
    }

    let method_str = req.method.unwrap_or("GET");
    let path_raw = req.path.unwrap_or("/");
    let version = format!("HTTP/1.{}", req.version.unwrap_or(1));
    let headers = headers_from_httparse(req.headers);
    let method = HttpMethod::from_str_lossy(method_str);

    if method == HttpMethod::Connect {
        let (host, port) = split_host_and_port(path_raw, 443);
        return Ok(ParsedRequest {
            method,
            scheme: "https".to_string(),
            host,
            port,
            path: "/".to_string(),
            version,
            headers,
            body_kind: RequestBodyKind::None,
            buffered_body,
        });
    }

    let content_length = match header_value(&headers, "content-length") {
        Some(raw) => Some(
            raw.trim()
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid Content-Length: {raw}"))?,
        ),
        None => None,
    };
    if content_length.is_some_and(|len| len > MAX_REQUEST_BODY_BYTES) {
        return Err(RequestBodyTooLarge::new(MAX_REQUEST_BODY_BYTES).into());
    }
    let is_chunked = header_value(&headers, "transfer-encoding")
        .map(|v| v.to_ascii_lowercase().contains("chunked"))
        .unwrap_or(false);

    let (scheme, host, port, path) = resolve_target(path_raw, &headers)?;
    let body_kind = if is_chunked {
        RequestBodyKind::Chunked
    } else if let Some(length) = content_length {
        RequestBodyKind::ContentLength { length }
    } else {
        RequestBodyKind::None
    };

    Ok(ParsedRequest {
        method,
        scheme,
        host,
        port,
        path,
        version,
        headers,
        body_kind,
        buffered_body,
    })
}

async fn read_response_head<S>(stream: &mut S) -> anyhow::Result<ResponseHead>
where
    S: AsyncRead + Unpin,
{
    let (raw_head, buffered_body) = read_message_head(stream).await?;

    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
    let mut res = httparse::Response::new(&mut header_storage);
    let status = res.parse(&raw_head)?;
    if status.is_partial() {
        return Err(anyhow!("partial HTTP response"));
    }

    Ok(ResponseHead {
        version: format!("HTTP/1.{}", res.version.unwrap_or(1)),
        status_code: res.code.ok_or_else(|| anyhow!("response without status code"))?,
        reason: res.reason.unwrap_or("").to_string(),
        headers: headers_from_httparse(res.headers),
        body_prefix: buffered_body,
    })
}

async fn read_message_head<S>(stream: &mut S) -> anyhow::Result<(Vec<u8>, Vec<u8>)>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(2048);
    let mut temp = [0u8; 4096];

    loop {
        let bytes_read = stream.read(&mut temp).await?;
        if bytes_read == 0 {
            break;
        }
        buffer.extend_from_slice(&temp[..bytes_read]);

        if let Some(pos) = find_header_end(&buffer) {
            let remaining = buffer.split_off(pos);
            return Ok((buffer, remaining));
        }

        if buffer.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("HTTP headers exceed allowed size"));
        }
    }

    Err(anyhow!("connection closed before headers completed"))
}

async fn forward_request_to_upstream<C, U>(
    client: &mut C,
    upstream: &mut U,
    parsed: &mut ParsedRequest,
    capture: &mut BodyCapture,
) -> anyhow::Result<()>
where
    C: AsyncRead + Unpin,
    U: AsyncWrite + Unpin,
{
    write_request_head(
        upstream,
        parsed.method.as_str(),
        &parsed.path,
        &parsed.version,
        &parsed.headers,
    )
    .await?;

    match parsed.body_kind {
        RequestBodyKind::None => Ok(()),
        RequestBodyKind::ContentLength { length } => {
            forward_fixed_length_body(client, upstream, &mut parsed.buffered_body, length, capture)
                .await
        }
        RequestBodyKind::Chunked => {
            forward_chunked_request_body(client, upstream, &mut parsed.buffered_body, capture).await
        }
    }
}

async fn write_request_head<W>(
    writer: &mut W,
    method: &str,
    path: &str,
    version: &str,
    headers: &[(String, String)],
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!("{method} {path} {version}\r\n");
    for (name, value) in headers {
        if is_hop_by_hop(name) {
            continue;
        }
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("Connection: close\r\n\r\n");
    writer.write_all(head.as_bytes()).await?;
    Ok(())
}

/// Relay the upstream head to the client, closing the connection after the
/// exchange.
async fn write_response_head<W>(writer: &mut W, head: &ResponseHead) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut raw = format!("{} {} {}\r\n", head.version, head.status_code, head.reason);
    for (name, value) in &head.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        raw.push_str(&format!("{name}: {value}\r\n"));
    }
    raw.push_str("Connection: close\r\n\r\n");
    writer.write_all(raw.as_bytes()).await?;
    Ok(())
}

fn is_hop_by_hop(name: &str) -> bool {
    name.eq_ignore_ascii_case("Connection")
        || name.eq_ignore_ascii_case("Proxy-Connection")
        || name.eq_ignore_ascii_case("Keep-Alive")
}

async fn forward_fixed_length_body<C, U>(
    client: &mut C,
    upstream: &mut U,
    buffered: &mut Vec<u8>,
    expected_len: usize,
    capture: &mut BodyCapture,
) -> anyhow::Result<()>
where
    C: AsyncRead + Unpin,
    U: AsyncWrite + Unpin,
{
    let mut remaining = expected_len;
    if remaining == 0 {
        buffered.clear();
        return Ok(());
    }

    if !buffered.is_empty() {
        let to_take = remaining.min(buffered.len());
        upstream.write_all(&buffered[..to_take]).await?;
        capture.push(&buffered[..to_take]);
        remaining -= to_take;
        buffered.drain(..to_take);
    }

    let mut buf = vec![0u8; 8192];
    while remaining > 0 {
        let read_len = buf.len().min(remaining);
        let n = client.read(&mut buf[..read_len]).await?;
        if n == 0 {
            return Err(anyhow!("connection closed while reading request body"));
        }
        upstream.write_all(&buf[..n]).await?;
        capture.push(&buf[..n]);
        remaining -= n;
    }
    Ok(())
}

async fn forward_chunked_request_body<C, U>(
    client: &mut C,
    upstream: &mut U,
    buffered: &mut Vec<u8>,
    capture: &mut BodyCapture,
) -> anyhow::Result<()>
where
    C: AsyncRead + Unpin,
    U: AsyncWrite + Unpin,
{
    let mut buffer: VecDeque<u8> = std::mem::take(buffered).into();
    let mut total_bytes: usize = 0;

    loop {
        let line = read_crlf_line(&mut buffer, client).await?;
        upstream.write_all(&line).await?;
        let chunk_size = parse_chunk_size(&line)?;

        if chunk_size == 0 {
            forward_trailers(&mut buffer, client, upstream).await?;
            break;
        }

        total_bytes = total_bytes
            .checked_add(chunk_size)
            .ok_or_else(|| RequestBodyTooLarge::new(MAX_REQUEST_BODY_BYTES))?;
        if total_bytes > MAX_REQUEST_BODY_BYTES {
            return Err(RequestBodyTooLarge::new(MAX_REQUEST_BODY_BYTES).into());
        }

        relay_chunk_data(&mut buffer, client, upstream, chunk_size, capture).await?;

        let crlf = read_exact_from_buffer(&mut buffer, client, 2).await?;
        if crlf != b"\r\n" {
            return Err(anyhow!("invalid chunk terminator"));
        }
        upstream.write_all(&crlf).await?;
    }

    *buffered = buffer.into();
    Ok(())
}

/// Relay a `Content-Length` response body. Returns the number of body bytes
/// relayed.
async fn forward_fixed_length_response<R, W>(
    prefix: Vec<u8>,
    upstream: &mut R,
    client: &mut W,
    expected_len: usize,
    capture: &mut BodyCapture,
) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = expected_len;

    let from_prefix = remaining.min(prefix.len());
    if from_prefix > 0 {
        client.write_all(&prefix[..from_prefix]).await?;
        capture.push(&prefix[..from_prefix]);
        remaining -= from_prefix;
    }

    let mut buf = vec![0u8; 8192];
    while remaining > 0 {
        let read_len = buf.len().min(remaining);
        let n = upstream
            .read(&mut buf[..read_len])
            .await
            .context("reading response body")?;
        if n == 0 {
            return Err(anyhow!("connection closed while reading response body"));
        }
        client.write_all(&buf[..n]).await?;
        capture.push(&buf[..n]);
        remaining -= n;
    }

    Ok(expected_len as u64)
}

/// Relay a close-delimited response body
async fn relay_until_eof<R, W>(
    prefix: Vec<u8>,
    upstream: &mut R,
    client: &mut W,
    capture: &mut BodyCapture,
) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut total = prefix.len() as u64;
    if !prefix.is_empty() {
        client.write_all(&prefix).await?;
        capture.push(&prefix);
    }

    let mut buf = vec![0u8; 8192];
    loop {
        let n = upstream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        client.write_all(&buf[..n]).await?;
        capture.push(&buf[..n]);
        total += n as u64;
    }
    Ok(total)
}

/// Relay a chunked body verbatim while decoding it for capture. Returns the
/// decoded body length.
async fn forward_chunked_body<R, W>(
    initial_buffer: Vec<u8>,
    upstream: &mut R,
    client: &mut W,
    capture: &mut BodyCapture,
) -> anyhow::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer: VecDeque<u8> = initial_buffer.into();
    let mut total_body_bytes = 0u64;

    loop {
        let line = read_crlf_line(&mut buffer, upstream).await?;
        client.write_all(&line).await?;
        let chunk_size = parse_chunk_size(&line)?;

        if chunk_size == 0 {
            forward_trailers(&mut buffer, upstream, client).await?;
            break;
        }

        relay_chunk_data(&mut buffer, upstream, client, chunk_size, capture).await?;
        total_body_bytes += chunk_size as u64;

        let crlf = read_exact_from_buffer(&mut buffer, upstream, 2).await?;
        if crlf != b"\r\n" {
            return Err(anyhow!("invalid chunk terminator"));
        }
        client.write_all(&crlf).await?;
    }

    Ok(total_body_bytes)
}

/// Relay `len` bytes of chunk data in bounded slices, draining any
/// already-buffered bytes first
async fn relay_chunk_data<R, W>(
    buffer: &mut VecDeque<u8>,
    reader: &mut R,
    writer: &mut W,
    len: usize,
    capture: &mut BodyCapture,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut remaining = len;
    let buffered = remaining.min(buffer.len());
    if buffered > 0 {
        let data: Vec<u8> = buffer.drain(..buffered).collect();
        writer.write_all(&data).await?;
        capture.push(&data);
        remaining -= buffered;
    }

    let mut buf = vec![0u8; 8192];
    while remaining > 0 {
        let read_len = buf.len().min(remaining);
        let n = reader.read(&mut buf[..read_len]).await?;
        if n == 0 {
            return Err(anyhow!("connection closed while reading chunked body"));
        }
        writer.write_all(&buf[..n]).await?;
        capture.push(&buf[..n]);
        remaining -= n;
    }
    Ok(())
}

fn parse_chunk_size(line: &[u8]) -> anyhow::Result<usize> {
    if line.len() < 2 {
        return Err(anyhow!("invalid chunked encoding: missing CRLF"));
    }
    let size_token = std::str::from_utf8(&line[..line.len() - 2])
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim();
    usize::from_str_radix(size_token, 16).map_err(|_| anyhow!("invalid chunk size: {size_token}"))
}

/// Trailers end with a blank line
async fn forward_trailers<R, W>(
    buffer: &mut VecDeque<u8>,
    reader: &mut R,
    writer: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let trailer_line = read_crlf_line(buffer, reader).await?;
        writer.write_all(&trailer_line).await?;
        if trailer_line == b"\r\n" {
            return Ok(());
        }
    }
}

async fn read_crlf_line<R>(buffer: &mut VecDeque<u8>, stream: &mut R) -> anyhow::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(pos) = find_crlf_in_deque(buffer) {
            return Ok(buffer.drain(..pos + 2).collect());
        }
        if buffer.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("chunk header line exceeds allowed size"));
        }
        fill_buffer(buffer, stream).await?;
    }
}

async fn read_exact_from_buffer<R>(
    buffer: &mut VecDeque<u8>,
    stream: &mut R,
    len: usize,
) -> anyhow::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    while buffer.len() < len {
        fill_buffer(buffer, stream).await?;
    }
    Ok(buffer.drain(..len).collect())
}

async fn fill_buffer<R>(buffer: &mut VecDeque<u8>, stream: &mut R) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut temp = [0u8; 4096];
    let read = stream.read(&mut temp).await?;
    if read == 0 {
        return Err(anyhow!("connection closed while reading chunked body"));
    }
    buffer.extend(&temp[..read]);
    Ok(())
}

fn find_crlf_in_deque(buffer: &VecDeque<u8>) -> Option<usize> {
    if buffer.len() < 2 {
        return None;
    }
    (0..buffer.len() - 1).find(|&i| buffer[i] == b'\r' && buffer[i + 1] == b'\n')
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

fn headers_from_httparse(headers: &[httparse::Header]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).to_string()))
        .collect()
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn resolve_target(
    raw_path: &str,
    headers: &[(String, String)],
) -> anyhow::Result<(String, String, u16, String)> {
    for (scheme, default_port) in [("http", 80), ("https", 443)] {
        if let Some(rest) = raw_path.strip_prefix(scheme).and_then(|r| r.strip_prefix("://")) {
            let (host_port, path) = match rest.find(|c| c == '/' || c == '?') {
                Some(idx) if rest[idx..].starts_with('/') => (&rest[..idx], rest[idx..].to_string()),
                Some(idx) => (&rest[..idx], format!("/{}", &rest[idx..])),
                None => (rest, "/".to_string()),
            };
            let (host, port) = split_host_and_port(host_port, default_port);
            if host.is_empty() {
                return Err(anyhow!("missing host in request target {raw_path}"));
            }
            return Ok((scheme.to_string(), host, port, path));
        }
    }

    let host_header = header_value(headers, "host")
        .ok_or_else(|| anyhow!("Missing Host header in HTTP/1.1 request"))?;
    let (host, port) = split_host_and_port(host_header, 80);
    Ok(("http".to_string(), host, port, raw_path.to_string()))
}

fn split_host_and_port(input: &str, default_port: u16) -> (String, u16) {
    if let Some((host, port)) = input.rsplit_once(':') {
        if let Ok(parsed) = port.parse::<u16>() {
            return (host.to_string(), parsed);
        }
    }
    (input.to_string(), default_port)
}

async fn respond_with_status<W>(
    stream: &mut W,
    code: u16,
    message: &str,
    body: &str,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\nContent-Type: text/plain\r\n\r\n{}",
        code,
        message,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}
