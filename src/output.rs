use std::{
    fmt::Display,
    fs,
    io::{self, Write},
    path::Path,
};

use anyhow::{Context, Result};

use crate::http::Headers;

/// Writes the body to `path`, replacing whatever was there.
pub fn write_to_file(content: &[u8], path: &Path, verbose: bool) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!("wrote {} bytes to {}", content.len(), path.display());

    if verbose {
        let _ = writeln!(io::stderr().lock(), "Saved to {}", path.display());
    }
    Ok(())
}

pub fn write_to_stdout(content: &[u8]) -> Result<()> {
    write_body(&mut io::stdout().lock(), content)
}

/// Text bodies are written as decoded text, anything else byte for byte. No
/// newline is appended in either case.
pub fn write_body(out: &mut impl Write, content: &[u8]) -> Result<()> {
    let written = match std::str::from_utf8(content) {
        Ok(text) => out.write_all(text.as_bytes()),
        Err(_) => {
            tracing::debug!("body is not UTF-8, writing {} raw bytes", content.len());
            out.write_all(content)
        }
    };
    written
        .and_then(|()| out.flush())
        .context("Output error")
}

pub fn print_headers(lines: &[String]) {
    let _ = write_response_trace(&mut io::stderr().lock(), lines);
}

pub fn print_request_info(method: &str, url: &str, headers: &Headers) {
    let _ = write_request_trace(&mut io::stderr().lock(), method, url, headers);
}

pub fn write_response_trace(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "< {line}")?;
    }
    writeln!(out)
}

pub fn write_request_trace(
    out: &mut impl Write,
    method: &str,
    url: &str,
    headers: &Headers,
) -> io::Result<()> {
    writeln!(out, "> {method} {url}")?;
    for (key, value) in headers.iter() {
        writeln!(out, "> {key}: {value}")?;
    }
    writeln!(out)
}

/// Emits a program diagnostic on stderr.
pub fn report_error(message: impl Display) {
    let _ = writeln!(io::stderr().lock(), "purl: {message}");
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.bin");
        let content: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        fs::write(&path, b"previous contents that are longer than nothing").unwrap();
        write_to_file(&content, &path, false).unwrap();

        assert_eq!(fs::read(&path).unwrap(), content);
    }

    #[test]
    fn file_keeps_crlf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crlf.txt");

        write_to_file(b"a\r\nb\n", &path, true).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"a\r\nb\n");
    }

    #[test]
    fn file_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        let error = write_to_file(b"x", &path, false).unwrap_err();

        let message = format!("{error:#}");
        assert!(message.starts_with(&format!("Failed to write {}: ", path.display())));
    }

    #[test]
    fn text_body_is_written_verbatim() {
        let mut out = Vec::new();
        write_body(&mut out, "héllo\nwörld".as_bytes()).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "héllo\nwörld");
    }

    #[test]
    fn binary_body_passes_through() {
        let content = [0x89, b'P', b'N', b'G', 0xff, 0xfe, 0x00];
        let mut out = Vec::new();
        write_body(&mut out, &content).unwrap();

        assert_eq!(out, content);
    }

    #[test]
    fn write_failure_is_output_error() {
        let error = write_body(&mut BrokenPipe, b"data").unwrap_err();

        assert_eq!(format!("{error:#}"), "Output error: Broken pipe");
    }

    #[test]
    fn response_trace_lines() {
        let mut out = Vec::new();
        let lines = vec!["Status: 200 OK".to_string(), "Server: test".to_string()];
        write_response_trace(&mut out, &lines).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "< Status: 200 OK\n< Server: test\n\n"
        );
    }

    #[test]
    fn request_trace_lines() {
        let mut headers = Headers::default();
        headers.insert("Accept", "application/json");
        headers.insert("X-Id", "7");

        let mut out = Vec::new();
        write_request_trace(&mut out, "POST", "http://localhost/x", &headers).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "> POST http://localhost/x\n> Accept: application/json\n> X-Id: 7\n\n"
        );
    }
}
