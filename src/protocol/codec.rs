//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! *<argc>\r\n                  ← array header
//! $<len>\r\n<bytes>\r\n        ← one bulk string per argument
//! ...
//! ```
//! A line that does not start with `*` is an inline request: arguments
//! separated by spaces, terminated by `\n` (optionally `\r\n`).
//!
//! ### Reply
//! ```text
//! +OK\r\n                      simple string
//! -ERR message\r\n             error
//! :42\r\n                      integer
//! $3\r\nfoo\r\n                bulk string ($-1 = null)
//! *2\r\n...                    array of replies
//! ```
//!
//! Decoders are incremental: they return `Ok(None)` until a whole frame is
//! buffered and consume nothing in that case.

use std::io::{Read, Write};

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{DequeError, Result};
use super::Reply;

/// Maximum number of arguments in one request
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Default maximum length of one bulk argument (512 MB)
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Maximum length of an inline request or a header line
pub const MAX_INLINE_LEN: usize = 64 * 1024;

/// Bytes requested from the socket per read
const READ_CHUNK: usize = 16 * 1024;

// =============================================================================
// Request Decoding
// =============================================================================

/// Decode one request from the front of `buf`
///
/// Returns the arguments (command name first) and advances `buf` past them,
/// or `Ok(None)` if `buf` does not yet hold a complete request. Empty
/// requests (`*0`, blank inline lines) are skipped.
pub fn decode_request(buf: &mut BytesMut, max_bulk_len: usize) -> Result<Option<Vec<Bytes>>> {
    loop {
        let Some((consumed, ranges)) = parse_request(&buf[..], max_bulk_len)? else {
            return Ok(None);
        };

        let frame = buf.split_to(consumed).freeze();
        if ranges.is_empty() {
            continue;
        }
        return Ok(Some(
            ranges.into_iter().map(|(start, end)| frame.slice(start..end)).collect(),
        ));
    }
}

/// Parse a request into argument byte ranges within `data`
fn parse_request(data: &[u8], max_bulk_len: usize) -> Result<Option<(usize, Vec<(usize, usize)>)>> {
    match data.first() {
        None => Ok(None),
        Some(b'*') => parse_multibulk(data, max_bulk_len),
        Some(_) => parse_inline(data),
    }
}

fn parse_multibulk(data: &[u8], max_bulk_len: usize) -> Result<Option<(usize, Vec<(usize, usize)>)>> {
    let Some((argc, mut cursor)) = read_integer_line(data, 1)? else {
        return Ok(None);
    };
    if argc <= 0 {
        return Ok(Some((cursor, Vec::new())));
    }
    if argc as usize > MAX_ARRAY_LEN {
        return Err(DequeError::Protocol("invalid multibulk length".to_string()));
    }

    let mut ranges = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        match data.get(cursor) {
            None => return Ok(None),
            Some(b'$') => {}
            Some(&other) => {
                return Err(DequeError::Protocol(format!(
                    "expected '$', got '{}'",
                    other as char
                )))
            }
        }

        let Some((len, next)) = read_integer_line(data, cursor + 1)? else {
            return Ok(None);
        };
        if len < 0 || len as usize > max_bulk_len {
            return Err(DequeError::Protocol("invalid bulk length".to_string()));
        }

        let len = len as usize;
        if data.len() < next + len + 2 {
            return Ok(None);
        }
        if &data[next + len..next + len + 2] != b"\r\n" {
            return Err(DequeError::Protocol("bulk string not terminated by CRLF".to_string()));
        }

        ranges.push((next, next + len));
        cursor = next + len + 2;
    }

    Ok(Some((cursor, ranges)))
}

fn parse_inline(data: &[u8]) -> Result<Option<(usize, Vec<(usize, usize)>)>> {
    let Some(newline) = data.iter().position(|&b| b == b'\n') else {
        if data.len() > MAX_INLINE_LEN {
            return Err(DequeError::Protocol("too big inline request".to_string()));
        }
        return Ok(None);
    };

    let line_end = if newline > 0 && data[newline - 1] == b'\r' {
        newline - 1
    } else {
        newline
    };

    let mut ranges = Vec::new();
    let mut start = None;
    for (i, &b) in data[..line_end].iter().enumerate() {
        match (b == b' ' || b == b'\t', start) {
            (true, Some(s)) => {
                ranges.push((s, i));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        ranges.push((s, line_end));
    }

    Ok(Some((newline + 1, ranges)))
}

/// Parse `<integer>\r\n` starting at `start`; returns the value and the
/// offset just past the line
fn read_integer_line(data: &[u8], start: usize) -> Result<Option<(i64, usize)>> {
    let rest = data.get(start..).unwrap_or_default();
    let Some(cr) = find_crlf(rest) else {
        if rest.len() > MAX_INLINE_LEN {
            return Err(DequeError::Protocol("header line too long".to_string()));
        }
        return Ok(None);
    };

    let value = std::str::from_utf8(&rest[..cr])
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| {
            DequeError::Protocol(format!(
                "invalid length '{}'",
                String::from_utf8_lossy(&rest[..cr])
            ))
        })?;

    Ok(Some((value, start + cr + 2)))
}

fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

// =============================================================================
// Request Encoding
// =============================================================================

/// Encode arguments as a RESP array of bulk strings
pub fn encode_request(args: &[Bytes], out: &mut BytesMut) {
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        write_bulk(arg, out);
    }
}

// =============================================================================
// Reply Encoding/Decoding
// =============================================================================

/// Encode a reply
pub fn encode_reply(reply: &Reply, out: &mut BytesMut) {
    match reply {
        Reply::Simple(text) => write_line(b'+', text.as_bytes(), out),
        Reply::Error(text) => write_line(b'-', text.as_bytes(), out),
        Reply::Integer(value) => write_line(b':', value.to_string().as_bytes(), out),
        Reply::Bulk(value) => write_bulk(value, out),
        Reply::Null => out.extend_from_slice(b"$-1\r\n"),
        Reply::Array(items) => {
            write_line(b'*', items.len().to_string().as_bytes(), out);
            for item in items {
                encode_reply(item, out);
            }
        }
    }
}

/// Decode one reply from the front of `buf`; `Ok(None)` if incomplete
pub fn decode_reply(buf: &mut BytesMut) -> Result<Option<Reply>> {
    match parse_reply(&buf[..], 0)? {
        Some((reply, consumed)) => {
            buf.advance(consumed);
            Ok(Some(reply))
        }
        None => Ok(None),
    }
}

fn parse_reply(data: &[u8], start: usize) -> Result<Option<(Reply, usize)>> {
    let Some(&kind) = data.get(start) else {
        return Ok(None);
    };

    match kind {
        b'+' | b'-' => {
            let rest = &data[start + 1..];
            let Some(cr) = find_crlf(rest) else {
                return Ok(None);
            };
            let text = String::from_utf8_lossy(&rest[..cr]).into_owned();
            let reply = if kind == b'+' {
                Reply::Simple(text)
            } else {
                Reply::Error(text)
            };
            Ok(Some((reply, start + 1 + cr + 2)))
        }
        b':' => Ok(read_integer_line(data, start + 1)?
            .map(|(value, next)| (Reply::Integer(value), next))),
        b'$' => {
            let Some((len, next)) = read_integer_line(data, start + 1)? else {
                return Ok(None);
            };
            if len < 0 {
                return Ok(Some((Reply::Null, next)));
            }
            let len = len as usize;
            if data.len() < next + len + 2 {
                return Ok(None);
            }
            let value = Bytes::copy_from_slice(&data[next..next + len]);
            Ok(Some((Reply::Bulk(value), next + len + 2)))
        }
        b'*' => {
            let Some((count, mut cursor)) = read_integer_line(data, start + 1)? else {
                return Ok(None);
            };
            if count < 0 {
                return Ok(Some((Reply::Null, cursor)));
            }
            let mut items = Vec::with_capacity((count as usize).min(MAX_ARRAY_LEN));
            for _ in 0..count {
                let Some((item, next)) = parse_reply(data, cursor)? else {
                    return Ok(None);
                };
                items.push(item);
                cursor = next;
            }
            Ok(Some((Reply::Array(items), cursor)))
        }
        other => Err(DequeError::Protocol(format!(
            "unknown reply type '{}'",
            other as char
        ))),
    }
}

fn write_line(kind: u8, body: &[u8], out: &mut BytesMut) {
    out.reserve(body.len() + 3);
    out.extend_from_slice(&[kind]);
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
}

fn write_bulk(value: &[u8], out: &mut BytesMut) {
    write_line(b'$', value.len().to_string().as_bytes(), out);
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one complete request from a stream
///
/// `buf` carries bytes left over from earlier reads (pipelined requests).
/// Returns `Ok(None)` when the peer closes between requests; a close in the
/// middle of a request is an `UnexpectedEof` I/O error.
pub fn read_request<R: Read>(
    reader: &mut R,
    buf: &mut BytesMut,
    max_bulk_len: usize,
) -> Result<Option<Vec<Bytes>>> {
    loop {
        if let Some(args) = decode_request(buf, max_bulk_len)? {
            return Ok(Some(args));
        }
        if fill(reader, buf)? == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
    }
}

/// Write a request and flush
pub fn write_request<W: Write>(writer: &mut W, args: &[Bytes]) -> Result<()> {
    let mut out = BytesMut::new();
    encode_request(args, &mut out);
    writer.write_all(&out)?;
    writer.flush()?;
    Ok(())
}

/// Read one complete reply from a stream
pub fn read_reply<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<Reply> {
    loop {
        if let Some(reply) = decode_reply(buf)? {
            return Ok(reply);
        }
        if fill(reader, buf)? == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
    }
}

/// Write a reply and flush
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    let mut out = BytesMut::new();
    encode_reply(reply, &mut out);
    writer.write_all(&out)?;
    writer.flush()?;
    Ok(())
}

fn fill<R: Read>(reader: &mut R, buf: &mut BytesMut) -> Result<usize> {
    let mut chunk = [0u8; READ_CHUNK];
    let n = reader.read(&mut chunk)?;
    buf.extend_from_slice(&chunk[..n]);
    Ok(n)
}
