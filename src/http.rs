use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use url::{Host, Url};

pub struct Client {
    user_agent: String,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends one HTTP/1.1 request and reads the whole response into memory.
    ///
    /// `timeout` bounds connecting as well as every individual read and write.
    pub fn send(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Response> {
        let url = Url::parse(url)?;

        let host = match url
            .host()
            .ok_or_else(|| anyhow!("Given URL does not contain a host"))?
        {
            Host::Domain(domain) => domain.to_string(),
            Host::Ipv4(addr) => addr.to_string(),
            Host::Ipv6(addr) => addr.to_string(),
        };
        let port = url.port().unwrap_or(match url.scheme() {
            "http" => 80,
            "https" => 443,
            _ => bail!("Unknown scheme: {}", url.scheme()),
        });

        let mut headers = headers.clone();
        if !headers.contains("Host") {
            let authority = url.host_str().unwrap_or(&host);
            match url.port() {
                Some(port) => headers.insert("Host", format!("{authority}:{port}")),
                None => headers.insert("Host", authority),
            }
        }
        if !headers.contains("User-Agent") {
            headers.insert("User-Agent", &self.user_agent);
        }
        // The response is framed by EOF, so the server must close.
        headers.remove("Connection");
        headers.insert("Connection", "close");

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path = format!("{path}?{query}");
        }
        let req = Request {
            method,
            path,
            headers,
            body,
        };

        let mut request_bytes = Vec::new();
        req.write_to(&mut request_bytes)?;

        tracing::debug!("sending {} bytes to {host}:{port}", request_bytes.len());
        tracing::trace!(
            "\n{}",
            prefix_lines(&String::from_utf8_lossy(&request_bytes), ">>> ")
        );

        let addr = (host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("Failed to resolve {host}"),
                )
            })?;
        let mut stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut response_bytes = Vec::new();
        if url.scheme() == "https" {
            let root_store =
                rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            let config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();
            let server_name = host.clone().try_into()?;
            let mut conn = rustls::ClientConnection::new(Arc::new(config), server_name)?;
            let stream = rustls::Stream::new(&mut conn, &mut stream);

            // Plenty of servers close the socket without sending close_notify.
            let result = do_read_write(stream, &request_bytes, &mut response_bytes);
            if let Err(error) = result {
                if error.kind() != io::ErrorKind::UnexpectedEof || response_bytes.is_empty() {
                    return Err(error.into());
                }
            }
        } else {
            do_read_write(stream, &request_bytes, &mut response_bytes)?;
        }

        tracing::debug!("received {} bytes from {host}:{port}", response_bytes.len());
        tracing::trace!(
            "\n{}",
            prefix_lines(&String::from_utf8_lossy(&response_bytes), "<<< ")
        );

        Response::parse(&response_bytes, method)
    }
}

fn do_read_write<S>(
    mut stream: S,
    request_bytes: &[u8],
    response_bytes: &mut Vec<u8>,
) -> io::Result<()>
where
    S: Read + Write,
{
    stream.write_all(request_bytes)?;
    stream.flush()?;
    stream.read_to_end(response_bytes)?;
    Ok(())
}

/// Ordered header list. Names keep the case they were given with; lookups
/// ignore case.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Sets `key` to `val`, replacing an entry with the exact same name in
    /// place. New names go to the end.
    pub fn insert(&mut self, key: impl ToString, val: impl ToString) {
        let key = key.to_string();
        let val = val.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = val,
            None => self.0.push((key, val)),
        }
    }

    pub fn append(&mut self, key: impl ToString, val: impl ToString) {
        self.0.push((key.to_string(), val.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Drops every entry named `key`, ignoring case.
    pub fn remove(&mut self, key: &str) {
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct Request<'a> {
    method: &'a str,
    path: String,
    headers: Headers,
    body: Option<&'a [u8]>,
}

impl Request<'_> {
    fn write_to(mut self, mut writer: impl Write) -> Result<()> {
        if let Some(body) = self.body {
            self.headers.insert("Content-Length", body.len());
        }

        write!(writer, "{} {} HTTP/1.1\r\n", self.method, self.path)?;

        for (key, value) in self.headers.iter() {
            write!(writer, "{key}: {value}\r\n")?;
        }

        writer.write_all(b"\r\n")?;

        if let Some(body) = self.body {
            writer.write_all(body)?;
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Response {
    status_code: u16,
    status_message: String,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Parses a complete response as read off the wire. `method` is the
    /// request method, needed to tell whether a body may follow.
    pub fn parse(bytes: &[u8], method: &str) -> Result<Self> {
        let mut state = ResponseParserState::Status;

        let mut status_code = 0u16;
        let mut status_message = String::new();
        let mut headers = Headers::default();
        let mut head_complete = false;

        let mut pos = 0;
        for mut line in bytes.split(|&c| c == b'\n') {
            pos += line.len() + 1;

            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }

            match state {
                ResponseParserState::Status => {
                    let line = std::str::from_utf8(line).context("Invalid status line")?;
                    let mut parts = line.splitn(3, ' ');
                    if !parts.next().unwrap_or_default().starts_with("HTTP/") {
                        bail!("Invalid status line: {line}");
                    }
                    let code = parts
                        .next()
                        .ok_or_else(|| anyhow!("Invalid status line: {line}"))?;
                    status_code = code
                        .parse()
                        .with_context(|| format!("Invalid status code: {code}"))?;
                    status_message = parts.next().unwrap_or_default().trim().to_owned();
                    state = ResponseParserState::Header;
                }
                ResponseParserState::Header => {
                    if line.is_empty() {
                        head_complete = true;
                        break;
                    }

                    let line = String::from_utf8_lossy(line);
                    let (key, value) = line
                        .split_once(':')
                        .ok_or_else(|| anyhow!("Invalid header: {line}"))?;
                    headers.append(key.trim(), value.trim());
                }
            }
        }

        if !head_complete {
            bail!("Incomplete response: missing end of headers");
        }

        let rest = &bytes[pos.min(bytes.len())..];
        let body = if !may_have_body(method, status_code) {
            Vec::new()
        } else if let Some(encoding) = headers.get("Transfer-Encoding") {
            let last = encoding.rsplit(',').next().unwrap_or_default().trim();
            if !last.eq_ignore_ascii_case("chunked") {
                bail!("Unknown transfer-encoding value: {encoding}");
            }
            decode_chunked(rest)?
        } else if let Some(length) = headers.get("Content-Length") {
            let length: usize = length
                .parse()
                .with_context(|| format!("Invalid Content-Length: {length}"))?;
            if rest.len() < length {
                bail!(
                    "Response body truncated: expected {length} bytes, got {}",
                    rest.len()
                );
            }
            rest[..length].to_vec()
        } else {
            rest.to_vec()
        };

        Ok(Response {
            status_code,
            status_message,
            headers,
            body,
        })
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

enum ResponseParserState {
    Status,
    Header,
}

fn may_have_body(method: &str, status_code: u16) -> bool {
    !(method.eq_ignore_ascii_case("HEAD")
        || (100..200).contains(&status_code)
        || status_code == 204
        || status_code == 304)
}

fn decode_chunked(mut bytes: &[u8]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line_end = bytes
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| anyhow!("Invalid chunk: missing size line"))?;
        let size_line = std::str::from_utf8(&bytes[..line_end]).context("Invalid chunk size")?;
        let size = size_line.split(';').next().unwrap_or_default().trim();
        let length = usize::from_str_radix(size, 16)
            .with_context(|| format!("Invalid chunk size: {size}"))?;
        let remaining = &bytes[line_end + 2..];
        if length == 0 {
            break;
        }

        let end = length
            .checked_add(2)
            .ok_or_else(|| anyhow!("Invalid chunk size: {size}"))?;
        if remaining.len() < end || &remaining[length..end] != b"\r\n" {
            bail!("Invalid chunk: truncated data");
        }
        body.extend_from_slice(&remaining[..length]);
        bytes = &remaining[end..];
    }
    Ok(body)
}

fn prefix_lines(str: &str, prefix: &str) -> String {
    str.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<String>>()
        .join("\n")
}
