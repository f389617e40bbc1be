//! RESP serializer.
//!
//! Commands go out as arrays of bulk strings:
//! `*<N>\r\n$<len>\r\narg1\r\n$<len>\r\narg2\r\n…`
//!
//! [`encode_value`] writes any [`RespValue`] in server form. The client never
//! sends those; it exists for test servers and tooling.

use itoa::Buffer;

use crate::cmd::Command;
use crate::resp::types::RespValue;

/// Encode one command.
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let mut buf = Vec::with_capacity(command_capacity(cmd));
    encode_command_into(&mut buf, cmd);
    buf
}

/// Append one encoded command to `buf`.
pub fn encode_command_into(buf: &mut Vec<u8>, cmd: &Command) {
    let tokens = cmd.tokens();
    write_args(buf, tokens.len(), tokens.iter().map(|t| &t[..]));
}

/// Encode multiple commands into a single buffer for pipelined writes.
///
/// Everything is concatenated into one contiguous `Vec<u8>` that goes out in
/// a single `write_all`.
pub fn encode_pipeline(commands: &[Command]) -> Vec<u8> {
    let cap = commands.iter().map(command_capacity).sum();
    let mut buf = Vec::with_capacity(cap);
    for cmd in commands {
        encode_command_into(&mut buf, cmd);
    }
    buf
}

/// Append `value` to `buf` in server-side RESP form (RESP3 types included).
pub fn encode_value(buf: &mut Vec<u8>, value: &RespValue) {
    let mut itoa_buf = Buffer::new();
    match value {
        RespValue::SimpleString(s) => line(buf, b'+', s.as_bytes()),
        RespValue::Error(s) => line(buf, b'-', s.as_bytes()),
        RespValue::Integer(i) => line(buf, b':', itoa_buf.format(*i).as_bytes()),
        RespValue::BulkString(b) => bulk(buf, b'$', b),
        RespValue::Null => buf.extend_from_slice(b"_\r\n"),
        RespValue::Double(d) => {
            let s = if d.is_nan() {
                "nan".to_string()
            } else if d.is_infinite() {
                if *d > 0.0 { "inf" } else { "-inf" }.to_string()
            } else {
                d.to_string()
            };
            line(buf, b',', s.as_bytes());
        }
        RespValue::Boolean(b) => line(buf, b'#', if *b { b"t" } else { b"f" }),
        RespValue::BigNumber(s) => line(buf, b'(', s.as_bytes()),
        RespValue::BulkError(s) => bulk(buf, b'!', s.as_bytes()),
        RespValue::VerbatimString { encoding, data } => {
            let mut content = Vec::with_capacity(encoding.len() + 1 + data.len());
            content.extend_from_slice(encoding.as_bytes());
            content.push(b':');
            content.extend_from_slice(data.as_bytes());
            bulk(buf, b'=', &content);
        }
        RespValue::Array(items) => aggregate(buf, b'*', items),
        RespValue::Set(items) => aggregate(buf, b'~', items),
        RespValue::Push { kind, data } => {
            line(buf, b'>', itoa_buf.format(data.len() + 1).as_bytes());
            bulk(buf, b'$', kind.as_bytes());
            for item in data {
                encode_value(buf, item);
            }
        }
        RespValue::Map(pairs) => map(buf, b'%', pairs),
        RespValue::Attribute { data, attributes } => {
            map(buf, b'|', attributes);
            encode_value(buf, data);
        }
    }
}

/// Append `value` in RESP2 form: RESP2 has no null type, so `Null` is `$-1`.
pub fn encode_value_resp2(buf: &mut Vec<u8>, value: &RespValue) {
    match value {
        RespValue::Null => buf.extend_from_slice(b"$-1\r\n"),
        RespValue::Array(items) => {
            header(buf, b'*', items.len());
            for item in items {
                encode_value_resp2(buf, item);
            }
        }
        other => encode_value(buf, other),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn capacity(lens: impl Iterator<Item = usize>) -> usize {
    // '*' + digits + \r\n, then per arg '$' + digits + \r\n + data + \r\n
    lens.fold(1 + 10 + 2, |cap, len| cap + 1 + 10 + 2 + len + 2)
}

fn command_capacity(cmd: &Command) -> usize {
    capacity(cmd.tokens().iter().map(|t| t.len()))
}

fn write_args<'a>(buf: &mut Vec<u8>, count: usize, args: impl Iterator<Item = &'a [u8]>) {
    header(buf, b'*', count);
    for arg in args {
        bulk(buf, b'$', arg);
    }
}

fn header(buf: &mut Vec<u8>, prefix: u8, n: usize) {
    let mut itoa_buf = Buffer::new();
    line(buf, prefix, itoa_buf.format(n).as_bytes());
}

fn line(buf: &mut Vec<u8>, prefix: u8, body: &[u8]) {
    buf.push(prefix);
    buf.extend_from_slice(body);
    buf.extend_from_slice(b"\r\n");
}

fn bulk(buf: &mut Vec<u8>, prefix: u8, data: &[u8]) {
    header(buf, prefix, data.len());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}

fn aggregate(buf: &mut Vec<u8>, prefix: u8, items: &[RespValue]) {
    header(buf, prefix, items.len());
    for item in items {
        encode_value(buf, item);
    }
}

fn map(buf: &mut Vec<u8>, prefix: u8, pairs: &[(RespValue, RespValue)]) {
    header(buf, prefix, pairs.len());
    for (k, v) in pairs {
        encode_value(buf, k);
        encode_value(buf, v);
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd;
    use crate::resp::parser::parse_slice;
    use bytes::Bytes;

    #[test]
    fn encode_binary_arg_with_crlf() {
        let wire = encode_command(&cmd!("SET", "key", b"v\r\n\x00\xff".as_slice()));
        assert_eq!(wire, b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nv\r\n\x00\xff\r\n");
    }

    #[test]
    fn encode_command_numeric_args() {
        let wire = encode_command(&cmd!("BF.RESERVE", "f", 0.01, 1000));
        assert_eq!(
            wire,
            b"*4\r\n$10\r\nBF.RESERVE\r\n$1\r\nf\r\n$4\r\n0.01\r\n$4\r\n1000\r\n"
        );
    }

    #[test]
    fn encode_large_arg() {
        let big = vec![b'x'; 10_000];
        let wire = encode_command(&cmd!("SET", "key", big));
        assert!(wire.starts_with(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$10000\r\n"));
        assert!(wire.ends_with(b"\r\n"));
    }

    #[test]
    fn pipeline_is_concatenation() {
        let cmds = [cmd!("SET", "a", 1), cmd!("GET", "a"), cmd!("PING")];
        let mut expected = Vec::new();
        for c in &cmds {
            expected.extend_from_slice(&encode_command(c));
        }
        assert_eq!(encode_pipeline(&cmds), expected);
        assert!(encode_pipeline(&[]).is_empty());
    }

    #[test]
    fn encoded_command_parses_back() {
        let wire = encode_command(&cmd!("SET", "hello", "world"));
        let (val, consumed) = parse_slice(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(
            val,
            RespValue::Array(vec![
                RespValue::BulkString(Bytes::from_static(b"SET")),
                RespValue::BulkString(Bytes::from_static(b"hello")),
                RespValue::BulkString(Bytes::from_static(b"world")),
            ])
        );
    }

    #[test]
    fn server_values_decode_to_themselves() {
        let value = RespValue::Array(vec![
            RespValue::status("OK"),
            RespValue::Integer(-5),
            RespValue::bulk(&b"\x00bin\r\n"[..]),
            RespValue::Null,
            RespValue::Error("ERR nested".into()),
            RespValue::Map(vec![(RespValue::from("k"), RespValue::Boolean(true))]),
            RespValue::Push {
                kind: "message".into(),
                data: vec![RespValue::from("ch"), RespValue::from("x")],
            },
            RespValue::Double(1.5),
        ]);
        let mut wire = Vec::new();
        encode_value(&mut wire, &value);
        let (decoded, consumed) = parse_slice(&wire).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, value);
    }

    #[test]
    fn resp2_null_forms() {
        let mut wire = Vec::new();
        encode_value_resp2(&mut wire, &RespValue::Array(vec![RespValue::Null]));
        assert_eq!(wire, b"*1\r\n$-1\r\n");
    }
}
