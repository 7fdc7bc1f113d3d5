use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use super::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("promises cannot be encoded into a single line")]
    Deferred,
}

/// Encode a fully settled value as the root line of a turbo stream.
pub fn encode(value: &TurboValue) -> Result<String, EncodeError> {
    let mut encoder = Encoder::default();
    let root = encoder.flatten(value)?;
    if root < 0 {
        Ok(format!("{root}\n"))
    } else {
        Ok(format!("[{}]\n", encoder.entries.join(",")))
    }
}

#[derive(Default)]
struct Encoder {
    entries: Vec<String>,
    strings: HashMap<String, i64>,
}

impl Encoder {
    fn push(&mut self, entry: String) -> i64 {
        self.entries.push(entry);
        self.entries.len() as i64 - 1
    }

    fn string(&mut self, s: &str) -> i64 {
        if let Some(index) = self.strings.get(s) {
            return *index;
        }
        let index = self.push(json_string(s));
        self.strings.insert(s.to_string(), index);
        index
    }

    fn number(&mut self, n: f64) -> i64 {
        if n.is_nan() {
            NAN
        } else if n == f64::INFINITY {
            POSITIVE_INFINITY
        } else if n == f64::NEG_INFINITY {
            NEGATIVE_INFINITY
        } else if n == 0.0 && n.is_sign_negative() {
            NEGATIVE_ZERO
        } else {
            self.push(json_number(n))
        }
    }

    // containers claim their index before their members so the root stays
    // at index 0
    fn container(
        &mut self,
        build: impl FnOnce(&mut Self) -> Result<String, EncodeError>,
    ) -> Result<i64, EncodeError> {
        let at = self.push(String::new());
        let entry = build(self)?;
        self.entries[at as usize] = entry;
        Ok(at)
    }

    fn tagged<'v>(
        &mut self,
        tag: &str,
        members: impl IntoIterator<Item = &'v TurboValue>,
    ) -> Result<i64, EncodeError> {
        let members: Vec<_> = members.into_iter().collect();
        self.container(|encoder| {
            let mut parts = vec![json_string(tag)];
            for member in members {
                parts.push(encoder.flatten(member)?.to_string());
            }
            Ok(format!("[{}]", parts.join(",")))
        })
    }

    fn literal(&mut self, tag: &str, args: &[&str]) -> i64 {
        let mut parts = vec![json_string(tag)];
        parts.extend(args.iter().map(|arg| json_string(arg)));
        self.push(format!("[{}]", parts.join(",")))
    }

    fn flatten(&mut self, value: &TurboValue) -> Result<i64, EncodeError> {
        Ok(match value {
            TurboValue::Undefined => UNDEFINED,
            TurboValue::Null => NULL,
            TurboValue::Bool(b) => self.push(b.to_string()),
            TurboValue::Number(n) => self.number(*n),
            TurboValue::String(s) => self.string(s),
            TurboValue::BigInt(digits) => self.literal(TYPE_BIGINT, &[digits.as_str()]),
            TurboValue::Date(ms) => {
                let entry = format!("[{},{}]", json_string(TYPE_DATE), json_number(*ms));
                self.push(entry)
            }
            TurboValue::RegExp { source, flags } => {
                self.literal(TYPE_REGEXP, &[source.as_str(), flags.as_str()])
            }
            TurboValue::Symbol(description) => self.literal(TYPE_SYMBOL, &[description.as_str()]),
            TurboValue::Url(href) => self.literal(TYPE_URL, &[href.as_str()]),
            TurboValue::Error { message, kind } => match kind {
                Some(kind) => self.literal(TYPE_ERROR, &[message.as_str(), kind.as_str()]),
                None => self.literal(TYPE_ERROR, &[message.as_str()]),
            },
            TurboValue::Array(items) => self.container(|encoder| {
                let refs = items
                    .iter()
                    .map(|item| encoder.flatten(item).map(|i| i.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(format!("[{}]", refs.join(",")))
            })?,
            TurboValue::Object(map) => self.container(|encoder| {
                let mut fields = Vec::with_capacity(map.len());
                for (key, value) in map.iter() {
                    let key = encoder.string(key);
                    let value = encoder.flatten(value)?;
                    fields.push(format!("\"_{key}\":{value}"));
                }
                Ok(format!("{{{}}}", fields.join(",")))
            })?,
            TurboValue::Map(entries) => {
                self.tagged(TYPE_MAP, entries.iter().flat_map(|(k, v)| [k, v]))?
            }
            TurboValue::Set(items) => self.tagged(TYPE_SET, items.iter())?,
            TurboValue::Promise(_) => return Err(EncodeError::Deferred),
        })
    }
}

fn json_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn json_number(n: f64) -> String {
    serde_json::Number::from_f64(n)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "null".to_string())
}
