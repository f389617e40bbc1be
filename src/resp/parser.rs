//! Streaming RESP2/RESP3 reply decoder.
//!
//! [`parse`] decodes exactly one reply from the front of a buffer and returns
//! `Ok((RespValue, bytes_consumed))`, `Err(Incomplete)` when more bytes are
//! needed, or `Err(Protocol(…))` on malformed framing. It never blocks;
//! waiting for bytes is the connection's job.
//!
//! Bulk strings are extracted with `Bytes::slice`, sharing the read buffer
//! instead of copying. Lengths, element counts and nesting depth announced by
//! the server are bounded before anything is allocated for them.

use bytes::Bytes;
use memchr::memchr;

use crate::error::{RedisError, Result};
use crate::resp::types::RespValue;

/// Largest bulk payload accepted (the server's own proto-max-bulk-len default).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest element count accepted for one array/set/map/push.
pub const MAX_ELEMENTS: usize = 16_777_216;

/// Deepest nesting accepted for aggregate replies.
pub const MAX_DEPTH: usize = 512;

/// Upper bound for speculative `Vec` pre-allocation from a declared count.
const PREALLOC_LIMIT: usize = 4096;

/// Parse one reply from the front of `buf`.
pub fn parse(buf: &Bytes) -> Result<(RespValue, usize)> {
    value_at(buf, 0, 0)
}

/// Parse from a borrowed slice (copies into `Bytes` first).
///
/// Prefer [`parse`] with an existing `Bytes` for zero-copy bulk strings.
pub fn parse_slice(buf: &[u8]) -> Result<(RespValue, usize)> {
    parse(&Bytes::copy_from_slice(buf))
}

/// Byte length of the complete reply at the front of `buf`, without
/// building a value. `Err(Incomplete)` means the reply has not fully arrived.
pub fn resp_frame_len(buf: &[u8]) -> Result<usize> {
    frame_end(buf, 0, 0)
}

fn frame_end(buf: &[u8], pos: usize, depth: usize) -> Result<usize> {
    if pos >= buf.len() {
        return Err(RedisError::Incomplete);
    }
    if depth > MAX_DEPTH {
        return Err(too_deep());
    }
    match buf[pos] {
        b'+' | b'-' | b':' | b',' | b'(' => Ok(read_line(buf, pos + 1)?.1),
        b'_' | b'#' => {
            let (_, next) = read_line(buf, pos + 1)?;
            Ok(next)
        }
        b'$' | b'!' | b'=' => {
            let (line, next) = read_line(buf, pos + 1)?;
            let Some(len) = bulk_len(line)? else {
                return Ok(next);
            };
            let end = next + len + 2;
            if buf.len() < end {
                return Err(RedisError::Incomplete);
            }
            Ok(end)
        }
        b'*' | b'~' | b'>' => {
            let (line, mut next) = read_line(buf, pos + 1)?;
            let Some(count) = element_count(line)? else {
                return Ok(next);
            };
            for _ in 0..count {
                next = frame_end(buf, next, depth + 1)?;
            }
            Ok(next)
        }
        b'%' | b'|' => {
            let (line, mut next) = read_line(buf, pos + 1)?;
            let count = element_count(line)?
                .ok_or_else(|| RedisError::Protocol("negative map count".into()))?;
            for _ in 0..count * 2 {
                next = frame_end(buf, next, depth + 1)?;
            }
            if buf[pos] == b'|' {
                next = frame_end(buf, next, depth + 1)?;
            }
            Ok(next)
        }
        other => Err(unknown_type(other)),
    }
}

fn value_at(buf: &Bytes, pos: usize, depth: usize) -> Result<(RespValue, usize)> {
    if pos >= buf.len() {
        return Err(RedisError::Incomplete);
    }
    if depth > MAX_DEPTH {
        return Err(too_deep());
    }
    let start = pos + 1;
    match buf[pos] {
        b'+' => {
            let (line, next) = read_line(buf, start)?;
            Ok((RespValue::SimpleString(utf8(line, "simple string")?), next))
        }
        b'-' => {
            let (line, next) = read_line(buf, start)?;
            Ok((RespValue::Error(lossy(line)), next))
        }
        b':' => {
            let (line, next) = read_line(buf, start)?;
            Ok((RespValue::Integer(parse_int(line)?), next))
        }
        b'$' => {
            let (line, next) = read_line(buf, start)?;
            match bulk_len(line)? {
                None => Ok((RespValue::Null, next)),
                Some(len) => {
                    let end = bulk_end(buf, next, len, "bulk string")?;
                    Ok((RespValue::BulkString(buf.slice(next..next + len)), end))
                }
            }
        }
        b'!' => {
            let (line, next) = read_line(buf, start)?;
            let len = bulk_len(line)?
                .ok_or_else(|| RedisError::Protocol("negative bulk error length".into()))?;
            let end = bulk_end(buf, next, len, "bulk error")?;
            Ok((RespValue::BulkError(lossy(&buf[next..next + len])), end))
        }
        b'=' => {
            let (line, next) = read_line(buf, start)?;
            let len = bulk_len(line)?.ok_or_else(|| {
                RedisError::Protocol("negative verbatim string length".into())
            })?;
            let end = bulk_end(buf, next, len, "verbatim string")?;
            let content = &buf[next..next + len];
            if len < 4 || content[3] != b':' {
                return Err(RedisError::Protocol(
                    "verbatim string missing encoding prefix".into(),
                ));
            }
            let value = RespValue::VerbatimString {
                encoding: utf8(&content[..3], "verbatim encoding")?,
                data: utf8(&content[4..], "verbatim string")?,
            };
            Ok((value, end))
        }
        b'*' => {
            let (line, next) = read_line(buf, start)?;
            match element_count(line)? {
                None => Ok((RespValue::Null, next)),
                Some(count) => {
                    let (items, end) = sequence(buf, next, count, depth)?;
                    Ok((RespValue::Array(items), end))
                }
            }
        }
        b'~' => {
            let (line, next) = read_line(buf, start)?;
            let count = element_count(line)?
                .ok_or_else(|| RedisError::Protocol("negative set count".into()))?;
            let (items, end) = sequence(buf, next, count, depth)?;
            Ok((RespValue::Set(items), end))
        }
        b'>' => {
            let (line, next) = read_line(buf, start)?;
            let count = element_count(line)?
                .ok_or_else(|| RedisError::Protocol("negative push count".into()))?;
            if count == 0 {
                return Err(RedisError::Protocol(
                    "push message must carry its kind".into(),
                ));
            }
            let (mut items, end) = sequence(buf, next, count, depth)?;
            let kind = match items.remove(0) {
                RespValue::SimpleString(s) => s,
                RespValue::BulkString(b) => utf8(&b, "push kind")?,
                other => {
                    return Err(RedisError::Protocol(format!(
                        "push kind must be a string, got {}",
                        other.type_name()
                    )));
                }
            };
            Ok((RespValue::Push { kind, data: items }, end))
        }
        b'%' => {
            let (line, next) = read_line(buf, start)?;
            let count = element_count(line)?
                .ok_or_else(|| RedisError::Protocol("negative map count".into()))?;
            let (pairs, end) = pairs(buf, next, count, depth)?;
            Ok((RespValue::Map(pairs), end))
        }
        b'|' => {
            let (line, next) = read_line(buf, start)?;
            let count = element_count(line)?
                .ok_or_else(|| RedisError::Protocol("negative attribute count".into()))?;
            let (attributes, next) = pairs(buf, next, count, depth)?;
            let (data, end) = value_at(buf, next, depth + 1)?;
            Ok((
                RespValue::Attribute {
                    data: Box::new(data),
                    attributes,
                },
                end,
            ))
        }
        b'_' => {
            let (line, next) = read_line(buf, start)?;
            if !line.is_empty() {
                return Err(RedisError::Protocol("null type carries data".into()));
            }
            Ok((RespValue::Null, next))
        }
        b'#' => {
            let (line, next) = read_line(buf, start)?;
            let b = match line {
                b"t" => true,
                b"f" => false,
                _ => {
                    return Err(RedisError::Protocol(format!(
                        "invalid boolean: {:?}",
                        String::from_utf8_lossy(line)
                    )));
                }
            };
            Ok((RespValue::Boolean(b), next))
        }
        b',' => {
            let (line, next) = read_line(buf, start)?;
            Ok((RespValue::Double(parse_double(line)?), next))
        }
        b'(' => {
            let (line, next) = read_line(buf, start)?;
            let s = utf8(line, "big number")?;
            let digits = s.strip_prefix(['+', '-']).unwrap_or(&s);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RedisError::Protocol(format!("invalid big number: {s}")));
            }
            Ok((RespValue::BigNumber(s), next))
        }
        other => Err(unknown_type(other)),
    }
}

fn sequence(
    buf: &Bytes,
    mut pos: usize,
    count: usize,
    depth: usize,
) -> Result<(Vec<RespValue>, usize)> {
    let mut items = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        let (item, next) = value_at(buf, pos, depth + 1)?;
        items.push(item);
        pos = next;
    }
    Ok((items, pos))
}

fn pairs(
    buf: &Bytes,
    mut pos: usize,
    count: usize,
    depth: usize,
) -> Result<(Vec<(RespValue, RespValue)>, usize)> {
    let mut out = Vec::with_capacity(count.min(PREALLOC_LIMIT));
    for _ in 0..count {
        let (key, next) = value_at(buf, pos, depth + 1)?;
        let (val, next) = value_at(buf, next, depth + 1)?;
        out.push((key, val));
        pos = next;
    }
    Ok((out, pos))
}

// ── Helpers ────────────────────────────────────────────────────────

/// Read the line starting at `buf[offset]` up to `\r\n`.
/// Returns `(line_bytes, index_after_crlf)`.
#[inline]
fn read_line(buf: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let search = buf.get(offset..).ok_or(RedisError::Incomplete)?;
    let Some(rel) = memchr(b'\r', search) else {
        return Err(RedisError::Incomplete);
    };
    let cr = offset + rel;
    match buf.get(cr + 1) {
        None => Err(RedisError::Incomplete),
        Some(b'\n') => Ok((&buf[offset..cr], cr + 2)),
        Some(_) => Err(RedisError::Protocol("expected \\n after \\r".into())),
    }
}

/// Check the `\r\n` after a length-prefixed payload; returns the end offset.
fn bulk_end(buf: &[u8], start: usize, len: usize, what: &str) -> Result<usize> {
    let data_end = start + len;
    if buf.len() < data_end + 2 {
        return Err(RedisError::Incomplete);
    }
    if &buf[data_end..data_end + 2] != b"\r\n" {
        return Err(RedisError::Protocol(format!("{what} not terminated by \\r\\n")));
    }
    Ok(data_end + 2)
}

/// Length header of a bulk payload; `None` for the RESP2 null (`-1`).
fn bulk_len(line: &[u8]) -> Result<Option<usize>> {
    match parse_int(line)? {
        -1 => Ok(None),
        n if n < 0 => Err(RedisError::Protocol(format!("invalid bulk length: {n}"))),
        n if n as u64 > MAX_BULK_LEN as u64 => Err(RedisError::Protocol(format!(
            "bulk length {n} exceeds limit of {MAX_BULK_LEN} bytes"
        ))),
        n => Ok(Some(n as usize)),
    }
}

/// Element count header of an aggregate; `None` for the RESP2 null (`-1`).
fn element_count(line: &[u8]) -> Result<Option<usize>> {
    match parse_int(line)? {
        -1 => Ok(None),
        n if n < 0 => Err(RedisError::Protocol(format!("invalid element count: {n}"))),
        n if n as u64 > MAX_ELEMENTS as u64 => Err(RedisError::Protocol(format!(
            "element count {n} exceeds limit of {MAX_ELEMENTS}"
        ))),
        n => Ok(Some(n as usize)),
    }
}

/// Parse a signed decimal i64 without allocating.
fn parse_int(bytes: &[u8]) -> Result<i64> {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        Some(_) => (false, bytes),
        None => return Err(RedisError::Protocol("empty integer".into())),
    };
    if digits.is_empty() {
        return Err(RedisError::Protocol("integer has no digits".into()));
    }

    // Accumulate negatively so i64::MIN parses without overflow.
    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(RedisError::Protocol(format!(
                "invalid byte in integer: 0x{b:02x}"
            )));
        }
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_sub(i64::from(b - b'0')))
            .ok_or_else(|| RedisError::Protocol("integer overflow".into()))?;
    }

    if negative {
        Ok(n)
    } else {
        n.checked_neg()
            .ok_or_else(|| RedisError::Protocol("integer overflow".into()))
    }
}

fn parse_double(line: &[u8]) -> Result<f64> {
    let s = std::str::from_utf8(line)
        .map_err(|e| RedisError::Protocol(format!("invalid UTF-8 in double: {e}")))?;
    match s {
        "inf" | "+inf" => Ok(f64::INFINITY),
        "-inf" => Ok(f64::NEG_INFINITY),
        "nan" => Ok(f64::NAN),
        _ => s
            .parse::<f64>()
            .map_err(|e| RedisError::Protocol(format!("invalid double {s:?}: {e}"))),
    }
}

fn utf8(bytes: &[u8], what: &str) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| RedisError::Protocol(format!("invalid UTF-8 in {what}: {e}")))
}

/// Error text echoes command arguments, which may be binary.
fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn unknown_type(byte: u8) -> RedisError {
    RedisError::Protocol(format!("unknown RESP type byte: 0x{byte:02x}"))
}

fn too_deep() -> RedisError {
    RedisError::Protocol(format!("reply nested deeper than {MAX_DEPTH} levels"))
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn is_incomplete(r: Result<(RespValue, usize)>) -> bool {
        matches!(r, Err(RedisError::Incomplete))
    }

    fn is_protocol(r: Result<(RespValue, usize)>) -> bool {
        matches!(r, Err(RedisError::Protocol(_)))
    }

    #[test]
    fn status_reply() {
        let (val, len) = parse_slice(b"+OK\r\n").unwrap();
        assert_eq!(val, RespValue::status("OK"));
        assert_eq!(len, 5);
    }

    #[test]
    fn error_reply_is_a_value() {
        let (val, len) = parse_slice(b"-ERR unknown\r\n").unwrap();
        assert_eq!(val, RespValue::Error("ERR unknown".into()));
        assert_eq!(len, 14);
    }

    #[test]
    fn error_text_with_binary_args_is_kept() {
        let wire = b"-ERR unknown command 'BF.ADD', with args beginning with: 'bf' '\xff\xfe' \r\n";
        let (val, len) = parse_slice(wire).unwrap();
        assert_eq!(len, wire.len());
        let RespValue::Error(msg) = val else {
            panic!("expected an error reply");
        };
        assert!(msg.starts_with("ERR unknown command 'BF.ADD'"));
        assert!(msg.contains('\u{FFFD}'));

        let (val, _) = parse_slice(b"!6\r\nERR \xff\xfe\r\n").unwrap();
        assert_eq!(val, RespValue::BulkError("ERR \u{FFFD}\u{FFFD}".into()));
    }

    #[test]
    fn integers() {
        assert_eq!(parse_slice(b":1000\r\n").unwrap().0, RespValue::Integer(1000));
        assert_eq!(parse_slice(b":-42\r\n").unwrap().0, RespValue::Integer(-42));
        assert_eq!(parse_slice(b":+7\r\n").unwrap().0, RespValue::Integer(7));
        assert_eq!(
            parse_slice(b":-9223372036854775808\r\n").unwrap().0,
            RespValue::Integer(i64::MIN)
        );
        assert_eq!(
            parse_slice(b":9223372036854775807\r\n").unwrap().0,
            RespValue::Integer(i64::MAX)
        );
    }

    #[test]
    fn integer_errors() {
        assert!(is_protocol(parse_slice(b":9223372036854775808\r\n")));
        assert!(is_protocol(parse_slice(b":\r\n")));
        assert!(is_protocol(parse_slice(b":-\r\n")));
        assert!(is_protocol(parse_slice(b":12a3\r\n")));
    }

    #[test]
    fn bulk_strings() {
        let (val, len) = parse_slice(b"$5\r\nhello\r\n").unwrap();
        assert_eq!(val, RespValue::bulk(&b"hello"[..]));
        assert_eq!(len, 11);

        let (val, len) = parse_slice(b"$0\r\n\r\n").unwrap();
        assert_eq!(val, RespValue::bulk(Bytes::new()));
        assert_eq!(len, 6);

        assert_eq!(parse_slice(b"$-1\r\n").unwrap().0, RespValue::Null);
    }

    #[test]
    fn bulk_string_is_binary_safe() {
        let (val, _) = parse_slice(b"$6\r\nhe\r\nlo\r\n").unwrap();
        assert_eq!(val, RespValue::bulk(&b"he\r\nlo"[..]));

        let (val, _) = parse_slice(b"$3\r\n\x00\xff\x01\r\n").unwrap();
        assert_eq!(val.as_bytes(), Some(&[0u8, 0xff, 1][..]));
    }

    #[test]
    fn bulk_string_zero_copy() {
        let buf = Bytes::from_static(b"$3\r\nabc\r\n");
        let (val, _) = parse(&buf).unwrap();
        let RespValue::BulkString(data) = val else {
            panic!("expected bulk string");
        };
        assert_eq!(data.as_ptr(), buf[4..].as_ptr());
    }

    #[test]
    fn bulk_string_framing_errors() {
        assert!(is_incomplete(parse_slice(b"$5\r\nhel")));
        assert!(is_protocol(parse_slice(b"$5\r\nhelloXX")));
        assert!(is_protocol(parse_slice(b"$-2\r\n")));
    }

    #[test]
    fn bulk_length_ceiling() {
        let header = format!("${}\r\n", MAX_BULK_LEN + 1);
        assert!(is_protocol(parse_slice(header.as_bytes())));
        assert!(resp_frame_len(header.as_bytes()).is_err());
    }

    #[test]
    fn element_count_ceiling() {
        let header = format!("*{}\r\n", MAX_ELEMENTS + 1);
        assert!(is_protocol(parse_slice(header.as_bytes())));
    }

    #[test]
    fn huge_declared_count_does_not_preallocate() {
        // Declares the maximum count but only carries one element.
        let header = format!("*{}\r\n:1\r\n", MAX_ELEMENTS);
        assert!(is_incomplete(parse_slice(header.as_bytes())));
    }

    #[test]
    fn arrays() {
        let (val, len) = parse_slice(b"*2\r\n$3\r\nfoo\r\n:7\r\n").unwrap();
        assert_eq!(
            val,
            RespValue::Array(vec![RespValue::from("foo"), RespValue::Integer(7)])
        );
        assert_eq!(len, 17);

        assert_eq!(parse_slice(b"*0\r\n").unwrap().0, RespValue::Array(vec![]));
        assert_eq!(parse_slice(b"*-1\r\n").unwrap().0, RespValue::Null);
    }

    #[test]
    fn nested_arrays_with_errors_inside() {
        let input = b"*2\r\n*1\r\n-ERR inner\r\n$-1\r\n";
        let (val, _) = parse_slice(input).unwrap();
        assert_eq!(
            val,
            RespValue::Array(vec![
                RespValue::Array(vec![RespValue::Error("ERR inner".into())]),
                RespValue::Null,
            ])
        );
    }

    #[test]
    fn nesting_depth_limit() {
        let mut deep = "*1\r\n".repeat(MAX_DEPTH + 2);
        deep.push_str(":1\r\n");
        assert!(is_protocol(parse_slice(deep.as_bytes())));
        assert!(resp_frame_len(deep.as_bytes()).is_err());

        let mut ok = "*1\r\n".repeat(16);
        ok.push_str(":1\r\n");
        assert!(parse_slice(ok.as_bytes()).is_ok());
    }

    #[test]
    fn resp3_scalars() {
        assert_eq!(parse_slice(b"_\r\n").unwrap().0, RespValue::Null);
        assert_eq!(parse_slice(b"#t\r\n").unwrap().0, RespValue::Boolean(true));
        assert_eq!(parse_slice(b"#f\r\n").unwrap().0, RespValue::Boolean(false));
        assert_eq!(parse_slice(b",3.5\r\n").unwrap().0, RespValue::Double(3.5));
        assert_eq!(parse_slice(b",-inf\r\n").unwrap().0, RespValue::Double(f64::NEG_INFINITY));
        assert_eq!(
            parse_slice(b"(-123456789012345678901234567890\r\n").unwrap().0,
            RespValue::BigNumber("-123456789012345678901234567890".into())
        );
        assert!(is_protocol(parse_slice(b"#x\r\n")));
        assert!(is_protocol(parse_slice(b"(12x\r\n")));
        assert!(is_protocol(parse_slice(b"_x\r\n")));

        let RespValue::Double(nan) = parse_slice(b",nan\r\n").unwrap().0 else {
            panic!("expected double");
        };
        assert!(nan.is_nan());
    }

    #[test]
    fn resp3_bulk_error_and_verbatim() {
        let (val, _) = parse_slice(b"!21\r\nSYNTAX invalid syntax\r\n").unwrap();
        assert_eq!(val, RespValue::BulkError("SYNTAX invalid syntax".into()));

        let (val, _) = parse_slice(b"=15\r\ntxt:Some string\r\n").unwrap();
        assert_eq!(
            val,
            RespValue::VerbatimString {
                encoding: "txt".into(),
                data: "Some string".into()
            }
        );
        assert!(is_protocol(parse_slice(b"=3\r\ntxt\r\n")));
    }

    #[test]
    fn resp3_aggregates() {
        let (val, _) = parse_slice(b"%1\r\n+key\r\n:1\r\n").unwrap();
        assert_eq!(
            val,
            RespValue::Map(vec![(RespValue::status("key"), RespValue::Integer(1))])
        );

        let (val, _) = parse_slice(b"~2\r\n:1\r\n:2\r\n").unwrap();
        assert_eq!(val, RespValue::Set(vec![RespValue::Integer(1), RespValue::Integer(2)]));

        let (val, _) = parse_slice(b">3\r\n$7\r\nmessage\r\n$2\r\nch\r\n$5\r\nhello\r\n").unwrap();
        assert_eq!(
            val,
            RespValue::Push {
                kind: "message".into(),
                data: vec![RespValue::from("ch"), RespValue::from("hello")],
            }
        );
        assert!(is_protocol(parse_slice(b">0\r\n")));

        let (val, _) = parse_slice(b"|1\r\n+ttl\r\n:10\r\n+OK\r\n").unwrap();
        assert_eq!(
            val,
            RespValue::Attribute {
                data: Box::new(RespValue::status("OK")),
                attributes: vec![(RespValue::status("ttl"), RespValue::Integer(10))],
            }
        );
    }

    #[test]
    fn partial_data_is_incomplete() {
        assert!(is_incomplete(parse_slice(b"")));
        assert!(is_incomplete(parse_slice(b"+OK")));
        assert!(is_incomplete(parse_slice(b"+OK\r")));
        assert!(is_incomplete(parse_slice(b"$5\r")));
        assert!(is_incomplete(parse_slice(b"*2\r\n:1\r\n")));
        assert!(is_incomplete(parse_slice(b"%1\r\n+k\r\n")));
    }

    #[test]
    fn malformed_framing() {
        assert!(is_protocol(parse_slice(b"?what\r\n")));
        assert!(is_protocol(parse_slice(b"+OK\rX")));
        assert!(is_protocol(parse_slice(b"+\xff\xfe\r\n")));
    }

    #[test]
    fn consumes_exactly_one_reply() {
        let buf = Bytes::from_static(b"+OK\r\n:42\r\n$3\r\nfoo\r\n");
        let (v1, n1) = parse(&buf).unwrap();
        let rest = buf.slice(n1..);
        let (v2, n2) = parse(&rest).unwrap();
        let rest = rest.slice(n2..);
        let (v3, n3) = parse(&rest).unwrap();
        assert_eq!(v1, RespValue::status("OK"));
        assert_eq!(v2, RespValue::Integer(42));
        assert_eq!(v3, RespValue::from("foo"));
        assert_eq!(n1 + n2 + n3, buf.len());
    }

    #[test]
    fn frame_len_matches_parse() {
        let samples: &[&[u8]] = &[
            b"+OK\r\n",
            b"-ERR x\r\n",
            b":5\r\n",
            b"$3\r\nabc\r\n",
            b"$-1\r\n",
            b"*-1\r\n",
            b"*2\r\n:1\r\n*1\r\n$1\r\nz\r\n",
            b"_\r\n",
            b"#t\r\n",
            b",1.5\r\n",
            b"%1\r\n+a\r\n:1\r\n",
            b"|1\r\n+a\r\n:1\r\n+OK\r\n",
            b">2\r\n+pong\r\n$0\r\n\r\n",
        ];
        for sample in samples {
            let (_, consumed) = parse_slice(sample).unwrap();
            assert_eq!(resp_frame_len(sample).unwrap(), consumed, "{sample:?}");
            assert_eq!(consumed, sample.len());
        }
    }

    #[test]
    fn frame_len_incomplete() {
        assert!(matches!(resp_frame_len(b"*2\r\n:1\r\n"), Err(RedisError::Incomplete)));
        assert!(matches!(resp_frame_len(b"$10\r\nabc"), Err(RedisError::Incomplete)));
        assert!(matches!(resp_frame_len(b""), Err(RedisError::Incomplete)));
    }
}
