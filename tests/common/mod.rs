//! Shared helpers for integration tests.
//!
//! [`MockServer`] is a small in-process RESP2 server: strings, counters,
//! pub/sub, MULTI/EXEC and a set-backed stand-in for the Bloom filter
//! commands, plus hooks to misbehave (hang up, stall, send garbage).

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use redlink::config::{ConnectionConfig, RetryPolicy};
use redlink::error::RedisError;
use redlink::resp::writer::encode_value_resp2;
use redlink::resp::{parse, RespValue};
use redlink::Client;

type Published = (String, Bytes);

struct Subscriber {
    conn: usize,
    channel: String,
    tx: mpsc::UnboundedSender<Published>,
}

#[derive(Default)]
struct Shared {
    strings: Mutex<HashMap<Bytes, Bytes>>,
    blooms: Mutex<HashMap<Bytes, HashSet<Bytes>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    accepted: AtomicUsize,
    open: AtomicUsize,
    peak: AtomicUsize,
    hang_up_first: AtomicUsize,
}

pub struct MockServer {
    pub port: u16,
    shared: Arc<Shared>,
}

impl MockServer {
    pub async fn start() -> Self {
        Self::hanging_up_first(0).await
    }

    /// The first `n` connections read one request and close without
    /// answering.
    pub async fn hanging_up_first(n: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared {
            hang_up_first: AtomicUsize::new(n),
            ..Shared::default()
        });

        let accept_shared = shared.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let id = accept_shared.accepted.fetch_add(1, Ordering::SeqCst);
                let hang_up = accept_shared
                    .hang_up_first
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if hang_up {
                    tokio::spawn(hang_up_after_read(socket));
                    continue;
                }
                let now = accept_shared.open.fetch_add(1, Ordering::SeqCst) + 1;
                accept_shared.peak.fetch_max(now, Ordering::SeqCst);
                tokio::spawn(serve(accept_shared.clone(), socket, id));
            }
        });

        Self { port, shared }
    }

    /// Connections accepted so far, including ones hung up on.
    pub fn accepted(&self) -> usize {
        self.shared.accepted.load(Ordering::SeqCst)
    }

    /// Most connections served at the same time.
    pub fn peak_open(&self) -> usize {
        self.shared.peak.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig {
            port: self.port,
            connect_timeout: Duration::from_secs(1),
            read_timeout: Some(Duration::from_secs(2)),
            retry: RetryPolicy {
                backoff: Duration::ZERO,
                ..RetryPolicy::default()
            },
            ..ConnectionConfig::default()
        }
    }

    pub fn client(&self) -> Client {
        Client::new(self.config()).unwrap()
    }
}

async fn hang_up_after_read(mut socket: TcpStream) {
    let mut buf = vec![0u8; 1024];
    let _ = socket.read(&mut buf).await;
}

enum Outcome {
    Replies(Vec<RespValue>),
    Sleep(Duration),
    Garbage,
    Quit,
}

impl From<RespValue> for Outcome {
    fn from(v: RespValue) -> Self {
        Outcome::Replies(vec![v])
    }
}

struct Session {
    id: usize,
    tx: mpsc::UnboundedSender<Published>,
    channels: Vec<String>,
    multi: Option<Vec<Vec<Bytes>>>,
}

async fn serve(shared: Arc<Shared>, mut socket: TcpStream, id: usize) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Published>();
    let mut session = Session {
        id,
        tx,
        channels: Vec::new(),
        multi: None,
    };
    let mut buf = BytesMut::with_capacity(4096);

    'conn: loop {
        loop {
            let pending = Bytes::copy_from_slice(&buf);
            let request = match parse(&pending) {
                Ok((value, used)) => {
                    buf.advance(used);
                    value
                }
                Err(RedisError::Incomplete) => break,
                Err(_) => break 'conn,
            };
            let out = match execute(&shared, &mut session, args(request)) {
                Outcome::Replies(replies) => encode(&replies),
                Outcome::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    encode(&[RespValue::status("OK")])
                }
                Outcome::Garbage => b"?not resp\r\n".to_vec(),
                Outcome::Quit => {
                    let _ = socket.write_all(b"+OK\r\n").await;
                    break 'conn;
                }
            };
            if socket.write_all(&out).await.is_err() {
                break 'conn;
            }
        }

        tokio::select! {
            n = socket.read_buf(&mut buf) => match n {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
            Some((channel, payload)) = rx.recv() => {
                let frame = RespValue::Array(vec![
                    RespValue::bulk("message"),
                    RespValue::bulk(channel),
                    RespValue::BulkString(payload),
                ]);
                if socket.write_all(&encode(&[frame])).await.is_err() {
                    break;
                }
            }
        }
    }

    shared.subscribers.lock().retain(|s| s.conn != id);
    shared.open.fetch_sub(1, Ordering::SeqCst);
}

fn args(request: RespValue) -> Vec<Bytes> {
    match request {
        RespValue::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                RespValue::BulkString(b) => Some(b),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn encode(replies: &[RespValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for reply in replies {
        encode_value_resp2(&mut out, reply);
    }
    out
}

fn text(b: &Bytes) -> String {
    String::from_utf8_lossy(b).into_owned()
}

fn int(n: bool) -> RespValue {
    RespValue::Integer(i64::from(n))
}

fn err(msg: impl Into<String>) -> Outcome {
    RespValue::Error(msg.into()).into()
}

fn execute(shared: &Shared, session: &mut Session, args: Vec<Bytes>) -> Outcome {
    let Some(name) = args.first().map(|n| text(n).to_ascii_uppercase()) else {
        return err("ERR empty command");
    };

    if let Some(queued) = session.multi.as_mut() {
        match name.as_str() {
            "EXEC" => {}
            "MULTI" => return err("ERR MULTI calls can not be nested"),
            _ => {
                queued.push(args);
                return RespValue::status("QUEUED").into();
            }
        }
    }

    match (name.as_str(), &args[1..]) {
        ("PING", []) if !session.channels.is_empty() => {
            RespValue::Array(vec![RespValue::bulk("pong"), RespValue::bulk("")]).into()
        }
        ("PING", []) => RespValue::status("PONG").into(),
        ("ECHO", [msg]) => RespValue::BulkString(msg.clone()).into(),
        ("SET", [key, value, ..]) => {
            shared.strings.lock().insert(key.clone(), value.clone());
            RespValue::status("OK").into()
        }
        ("GET", [key]) => match shared.strings.lock().get(key) {
            Some(v) => RespValue::BulkString(v.clone()).into(),
            None => RespValue::Null.into(),
        },
        ("INCR", [key]) => {
            let mut strings = shared.strings.lock();
            let current = strings
                .get(key)
                .map(|v| text(v).parse::<i64>())
                .unwrap_or(Ok(0));
            match current {
                Ok(n) => {
                    strings.insert(key.clone(), Bytes::from((n + 1).to_string()));
                    RespValue::Integer(n + 1).into()
                }
                Err(_) => err("ERR value is not an integer or out of range"),
            }
        }
        ("PUBLISH", [channel, payload]) => {
            let channel = text(channel);
            let delivered = shared
                .subscribers
                .lock()
                .iter()
                .filter(|s| s.channel == channel)
                .filter(|s| s.tx.send((channel.clone(), payload.clone())).is_ok())
                .count();
            RespValue::Integer(delivered as i64).into()
        }
        ("SUBSCRIBE", channels) if !channels.is_empty() => {
            let mut replies = Vec::new();
            for channel in channels.iter().map(text) {
                if !session.channels.contains(&channel) {
                    session.channels.push(channel.clone());
                    shared.subscribers.lock().push(Subscriber {
                        conn: session.id,
                        channel: channel.clone(),
                        tx: session.tx.clone(),
                    });
                }
                replies.push(RespValue::Array(vec![
                    RespValue::bulk("subscribe"),
                    RespValue::bulk(channel),
                    RespValue::Integer(session.channels.len() as i64),
                ]));
            }
            Outcome::Replies(replies)
        }
        ("UNSUBSCRIBE", channels) => {
            let targets: Vec<String> = if channels.is_empty() {
                session.channels.clone()
            } else {
                channels.iter().map(text).collect()
            };
            if targets.is_empty() {
                return RespValue::Array(vec![
                    RespValue::bulk("unsubscribe"),
                    RespValue::Null,
                    RespValue::Integer(0),
                ])
                .into();
            }
            let mut replies = Vec::new();
            for channel in targets {
                session.channels.retain(|c| *c != channel);
                shared
                    .subscribers
                    .lock()
                    .retain(|s| !(s.conn == session.id && s.channel == channel));
                replies.push(RespValue::Array(vec![
                    RespValue::bulk("unsubscribe"),
                    RespValue::bulk(channel),
                    RespValue::Integer(session.channels.len() as i64),
                ]));
            }
            Outcome::Replies(replies)
        }
        ("MULTI", []) => {
            session.multi = Some(Vec::new());
            RespValue::status("OK").into()
        }
        ("EXEC", []) => {
            let Some(queued) = session.multi.take() else {
                return err("ERR EXEC without MULTI");
            };
            let mut results = Vec::with_capacity(queued.len());
            for cmd in queued {
                match execute(shared, session, cmd) {
                    Outcome::Replies(mut r) if !r.is_empty() => results.push(r.remove(0)),
                    _ => results.push(RespValue::Error("ERR not allowed in MULTI".into())),
                }
            }
            RespValue::Array(results).into()
        }
        ("BF.RESERVE", [key, _error_rate, _capacity, ..]) => {
            let mut blooms = shared.blooms.lock();
            if blooms.contains_key(key) {
                return err("ERR item exists");
            }
            blooms.insert(key.clone(), HashSet::new());
            RespValue::status("OK").into()
        }
        ("BF.ADD", [key, item]) => {
            int(shared.blooms.lock().entry(key.clone()).or_default().insert(item.clone())).into()
        }
        ("BF.MADD", [key, items @ ..]) if !items.is_empty() => {
            let mut blooms = shared.blooms.lock();
            let filter = blooms.entry(key.clone()).or_default();
            RespValue::Array(items.iter().map(|i| int(filter.insert(i.clone()))).collect()).into()
        }
        ("BF.EXISTS", [key, item]) => {
            int(shared.blooms.lock().get(key).is_some_and(|f| f.contains(item))).into()
        }
        ("BF.MEXISTS", [key, items @ ..]) if !items.is_empty() => {
            let blooms = shared.blooms.lock();
            let filter = blooms.get(key);
            RespValue::Array(
                items
                    .iter()
                    .map(|i| int(filter.is_some_and(|f| f.contains(i))))
                    .collect(),
            )
            .into()
        }
        ("BF.CARD", [key]) => {
            let n = shared.blooms.lock().get(key).map_or(0, |f| f.len());
            RespValue::Integer(n as i64).into()
        }
        ("DEBUG", [sub, rest @ ..]) => match (text(sub).to_ascii_uppercase().as_str(), rest) {
            ("SLEEP", [secs]) => match text(secs).parse::<f64>() {
                Ok(s) => Outcome::Sleep(Duration::from_secs_f64(s)),
                Err(_) => err("ERR invalid sleep"),
            },
            ("GARBAGE", []) => Outcome::Garbage,
            _ => err("ERR unknown DEBUG subcommand"),
        },
        ("QUIT", []) => Outcome::Quit,
        _ => err(format!("ERR unknown command '{name}'")),
    }
}
