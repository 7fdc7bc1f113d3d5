use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use bytes::Bytes;
use futures::{lock::Mutex, stream::LocalBoxStream, Stream, StreamExt};
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use super::*;

/// Failures while reading a turbo stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("the stream ended before the root value was received")]
    Empty,
    #[error("failed to read the stream: {0}")]
    Stream(String),
    #[error("the stream is not valid utf-8")]
    Utf8,
    #[error("invalid json in stream: {0}")]
    Json(String),
    #[error("invalid entry at index {0}")]
    InvalidEntry(i64),
    #[error("reference to missing entry {0}")]
    MissingEntry(i64),
    #[error("unknown type tag {0:?}")]
    UnknownType(String),
    #[error("circular reference through entry {0}")]
    Cycle(usize),
    #[error("unexpected line in stream: {0:?}")]
    UnexpectedLine(String),
    #[error("the stream ended before promise {0} settled")]
    Unsettled(u64),
}

/// The outcome of a promise carried by the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    Resolved(TurboValue),
    Rejected(TurboValue),
}

impl Settled {
    pub fn into_result(self) -> Result<TurboValue, TurboValue> {
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Rejected(value) => Err(value),
        }
    }
}

/// A promise found while decoding.
///
/// Clones refer to the same promise.  Awaiting [`Deferred::settled`]
/// drives the underlying stream forward until the promise settles or the
/// stream ends.
#[derive(Clone)]
pub struct Deferred {
    id: u64,
    inner: DeferredInner,
}

#[derive(Clone)]
enum DeferredInner {
    Stream(Rc<Shared>),
    Ready(Rc<Settled>),
}

impl Deferred {
    /// A promise that has already settled.
    pub fn ready(id: u64, settled: Settled) -> Self {
        Self {
            id,
            inner: DeferredInner::Ready(Rc::new(settled)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn settled(&self) -> Result<Settled, DecodeError> {
        let shared = match &self.inner {
            DeferredInner::Ready(settled) => return Ok(Settled::clone(settled)),
            DeferredInner::Stream(shared) => shared,
        };
        loop {
            if let Some(settled) = shared.lookup(self.id)? {
                return Ok(settled);
            }
            let mut reader = shared.reader.lock().await;
            // another waiter may have read the line while we waited for the lock
            if shared.is_settled(self.id) {
                continue;
            }
            match reader.next_line().await? {
                Some(line) => shared.apply(&line)?,
                None => return Err(DecodeError::Unsettled(self.id)),
            }
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("id", &self.id)
            .field("ready", &matches!(self.inner, DeferredInner::Ready(_)))
            .finish()
    }
}

/// A decoded root value, together with the rest of its stream.
pub struct Decoded {
    pub value: TurboValue,
    shared: Rc<Shared>,
}

impl Decoded {
    /// Read the remainder of the stream so every outstanding promise
    /// settles.
    pub async fn done(&self) -> Result<(), DecodeError> {
        let mut reader = self.shared.reader.lock().await;
        while let Some(line) = reader.next_line().await? {
            self.shared.apply(&line)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Decoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoded")
            .field("value", &self.value)
            .finish()
    }
}

/// Decode the root value of a turbo stream.
///
/// Only the first line is read before returning; promises inside the
/// value pull the remaining lines when awaited.
pub async fn decode<S, E>(stream: S) -> Result<Decoded, DecodeError>
where
    S: Stream<Item = Result<Bytes, E>> + 'static,
    E: fmt::Display,
{
    let stream = stream
        .map(|chunk| chunk.map_err(|e| DecodeError::Stream(e.to_string())))
        .boxed_local();
    let mut reader = LineReader::new(stream);
    let line = reader.next_line().await?.ok_or(DecodeError::Empty)?;
    let parsed = parse_json(&line)?;

    let shared = Rc::new(Shared {
        reader: Mutex::new(reader),
        table: RefCell::new(Table::default()),
    });
    let root = shared.table.borrow_mut().unflatten(parsed)?;
    let value = shared.hydrate_root(root)?;
    Ok(Decoded { value, shared })
}

fn parse_json(line: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(line).map_err(|e| DecodeError::Json(e.to_string()))
}

struct LineReader {
    stream: LocalBoxStream<'static, Result<Bytes, DecodeError>>,
    buffer: Vec<u8>,
    /// How much of `buffer` is known to hold no newline.
    scanned: usize,
    exhausted: bool,
}

impl LineReader {
    fn new(stream: LocalBoxStream<'static, Result<Bytes, DecodeError>>) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            scanned: 0,
            exhausted: false,
        }
    }

    async fn next_line(&mut self) -> Result<Option<String>, DecodeError> {
        loop {
            let newline = self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n');
            if let Some(offset) = newline {
                let pos = self.scanned + offset;
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                line.pop();
                self.scanned = 0;
                if line.is_empty() {
                    continue;
                }
                return String::from_utf8(line).map(Some).map_err(|_| DecodeError::Utf8);
            }
            if self.exhausted {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let line = std::mem::take(&mut self.buffer);
                self.scanned = 0;
                return String::from_utf8(line).map(Some).map_err(|_| DecodeError::Utf8);
            }
            self.scanned = self.buffer.len();
            match self.stream.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => self.exhausted = true,
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Resolved(i64),
    Rejected(i64),
}

#[derive(Default)]
struct Table {
    entries: Vec<Value>,
    settled: HashMap<u64, Outcome>,
}

impl Table {
    /// Append the entries of one line, returning the index of its value.
    fn unflatten(&mut self, parsed: Value) -> Result<i64, DecodeError> {
        match parsed {
            Value::Number(n) => match n.as_i64() {
                Some(index) if index < 0 => Ok(index),
                _ => Err(DecodeError::Json(format!("expected a constant, got {n}"))),
            },
            Value::Array(items) if !items.is_empty() => {
                let start = self.entries.len() as i64;
                self.entries.extend(items);
                Ok(start)
            }
            other => Err(DecodeError::Json(format!("expected an entry table, got {other}"))),
        }
    }
}

struct Shared {
    reader: Mutex<LineReader>,
    table: RefCell<Table>,
}

impl Shared {
    fn is_settled(&self, id: u64) -> bool {
        self.table.borrow().settled.contains_key(&id)
    }

    fn lookup(self: &Rc<Self>, id: u64) -> Result<Option<Settled>, DecodeError> {
        let outcome = match self.table.borrow().settled.get(&id) {
            Some(outcome) => *outcome,
            None => return Ok(None),
        };
        Ok(Some(match outcome {
            Outcome::Resolved(index) => Settled::Resolved(self.hydrate_root(index)?),
            Outcome::Rejected(index) => Settled::Rejected(self.hydrate_root(index)?),
        }))
    }

    fn apply(&self, line: &str) -> Result<(), DecodeError> {
        let unexpected = || DecodeError::UnexpectedLine(line.to_string());
        let rejected = match line.as_bytes().first() {
            Some(b'P') => false,
            Some(b'E') => true,
            _ => return Err(unexpected()),
        };
        let (id, json) = line[1..].split_once(':').ok_or_else(unexpected)?;
        let id: u64 = id.parse().map_err(|_| unexpected())?;
        let parsed = parse_json(json)?;

        let mut table = self.table.borrow_mut();
        let index = table.unflatten(parsed)?;
        let outcome = if rejected {
            Outcome::Rejected(index)
        } else {
            Outcome::Resolved(index)
        };
        table.settled.insert(id, outcome);
        Ok(())
    }

    fn hydrate_root(self: &Rc<Self>, index: i64) -> Result<TurboValue, DecodeError> {
        let table = self.table.borrow();
        Hydrator {
            shared: self,
            table: &table,
            visiting: Vec::new(),
            hydrated: HashMap::new(),
        }
        .hydrate(index)
    }
}

struct Hydrator<'a> {
    shared: &'a Rc<Shared>,
    table: &'a Table,
    visiting: Vec<usize>,
    /// Entries already built, so shared references are hydrated once.
    hydrated: HashMap<usize, TurboValue>,
}

impl Hydrator<'_> {
    fn hydrate(&mut self, index: i64) -> Result<TurboValue, DecodeError> {
        if index < 0 {
            return constant(index);
        }
        let at = index as usize;
        let entry = self
            .table
            .entries
            .get(at)
            .ok_or(DecodeError::MissingEntry(index))?;
        if let Some(value) = self.hydrated.get(&at) {
            return Ok(value.clone());
        }
        if self.visiting.contains(&at) {
            return Err(DecodeError::Cycle(at));
        }
        self.visiting.push(at);
        let value = self.hydrate_entry(index, entry);
        self.visiting.pop();
        let value = value?;
        self.hydrated.insert(at, value.clone());
        Ok(value)
    }

    fn hydrate_entry(&mut self, index: i64, entry: &Value) -> Result<TurboValue, DecodeError> {
        Ok(match entry {
            Value::Null => TurboValue::Null,
            Value::Bool(b) => TurboValue::Bool(*b),
            Value::Number(n) => TurboValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => TurboValue::String(s.clone()),
            Value::Array(items) => match items.first() {
                Some(Value::String(tag)) => self.hydrate_typed(index, tag, &items[1..])?,
                _ => TurboValue::Array(Rc::new(self.hydrate_all(index, items)?)),
            },
            Value::Object(map) => {
                let mut object = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    let key_index = key
                        .strip_prefix('_')
                        .and_then(|k| k.parse::<i64>().ok())
                        .ok_or(DecodeError::InvalidEntry(index))?;
                    let key = self.hydrate_key(index, key_index)?;
                    let value = self.hydrate(reference(index, value)?)?;
                    object.insert(key, value);
                }
                TurboValue::Object(Rc::new(object))
            }
        })
    }

    fn hydrate_all(&mut self, index: i64, refs: &[Value]) -> Result<Vec<TurboValue>, DecodeError> {
        refs.iter()
            .map(|value| self.hydrate(reference(index, value)?))
            .collect()
    }

    fn hydrate_key(&mut self, index: i64, key_index: i64) -> Result<String, DecodeError> {
        match self.hydrate(key_index)? {
            TurboValue::String(key) => Ok(key),
            _ => Err(DecodeError::InvalidEntry(index)),
        }
    }

    fn hydrate_typed(
        &mut self,
        index: i64,
        tag: &str,
        args: &[Value],
    ) -> Result<TurboValue, DecodeError> {
        let invalid = || DecodeError::InvalidEntry(index);
        let string_arg = |at: usize| -> Result<String, DecodeError> {
            args.get(at)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(invalid)
        };
        Ok(match tag {
            TYPE_BIGINT => TurboValue::BigInt(string_arg(0)?),
            TYPE_DATE => TurboValue::Date(
                args.first()
                    .map(|v| v.as_f64().unwrap_or(f64::NAN))
                    .ok_or_else(invalid)?,
            ),
            TYPE_ERROR => TurboValue::Error {
                message: args
                    .first()
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                kind: args.get(1).and_then(Value::as_str).map(str::to_string),
            },
            TYPE_MAP => {
                if args.len() % 2 != 0 {
                    return Err(invalid());
                }
                let mut entries = Vec::with_capacity(args.len() / 2);
                for pair in args.chunks(2) {
                    let key = self.hydrate(reference(index, &pair[0])?)?;
                    let value = self.hydrate(reference(index, &pair[1])?)?;
                    entries.push((key, value));
                }
                TurboValue::Map(Rc::new(entries))
            }
            TYPE_NULL_OBJECT => {
                if args.len() % 2 != 0 {
                    return Err(invalid());
                }
                let mut object = IndexMap::with_capacity(args.len() / 2);
                for pair in args.chunks(2) {
                    let key = self.hydrate_key(index, reference(index, &pair[0])?)?;
                    let value = self.hydrate(reference(index, &pair[1])?)?;
                    object.insert(key, value);
                }
                TurboValue::Object(Rc::new(object))
            }
            TYPE_PROMISE => {
                let id = args.first().and_then(Value::as_u64).ok_or_else(invalid)?;
                TurboValue::Promise(Deferred {
                    id,
                    inner: DeferredInner::Stream(self.shared.clone()),
                })
            }
            TYPE_REGEXP => TurboValue::RegExp {
                source: string_arg(0)?,
                flags: args
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            TYPE_SET => TurboValue::Set(Rc::new(self.hydrate_all(index, args)?)),
            TYPE_URL => TurboValue::Url(string_arg(0)?),
            TYPE_SYMBOL => TurboValue::Symbol(string_arg(0)?),
            TYPE_PREVIOUS_RESOLVED => {
                let value = self.hydrate(reference(index, args.first().ok_or_else(invalid)?)?)?;
                TurboValue::Promise(Deferred::ready(index as u64, Settled::Resolved(value)))
            }
            other => return Err(DecodeError::UnknownType(other.to_string())),
        })
    }
}

fn reference(index: i64, value: &Value) -> Result<i64, DecodeError> {
    value.as_i64().ok_or(DecodeError::InvalidEntry(index))
}

fn constant(index: i64) -> Result<TurboValue, DecodeError> {
    Ok(match index {
        HOLE | UNDEFINED => TurboValue::Undefined,
        NULL => TurboValue::Null,
        NAN => TurboValue::Number(f64::NAN),
        POSITIVE_INFINITY => TurboValue::Number(f64::INFINITY),
        NEGATIVE_INFINITY => TurboValue::Number(f64::NEG_INFINITY),
        NEGATIVE_ZERO => TurboValue::Number(-0.0),
        other => return Err(DecodeError::InvalidEntry(other)),
    })
}
