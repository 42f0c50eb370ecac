//! Wire envelopes and the newline-delimited JSON codec.
//!
//! Every message is one compact JSON object followed by `\n`. Requests look like
//! `{"command": "...", "data": {...}}`; responses carry a `type` discriminator.

use std::{cmp, io};

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::codec::{Decoder, Encoder};

use crate::models::user::Identity;

/// Inbound envelope.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Request {
    #[serde(default)]
    pub command: String,
    #[serde(default = "empty_object")]
    pub data: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl Request {
    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            data,
        }
    }

    /// Parses one framed line. Anything that is not a JSON object envelope yields `None`.
    pub fn parse_line(line: &[u8]) -> Option<Self> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }

        let value: Value = serde_json::from_slice(line).ok()?;
        if !value.is_object() {
            return None;
        }

        let mut request: Request = serde_json::from_value(value).ok()?;
        if request.data.is_null() {
            request.data = empty_object();
        }
        Some(request)
    }
}

/// Outbound envelope.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Error {
        message: String,
    },
    DataResponse {
        data: Value,
    },
    LoginSuccess {
        user: Identity,
    },
    LoginFail {
        message: String,
    },
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Response::Ok {
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    /// `OK` with additional top-level fields. Non-object `extra` values are ignored.
    pub fn ok_with(message: impl Into<String>, extra: Value) -> Self {
        let extra = match extra {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Response::Ok {
            message: Some(message.into()),
            extra,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn data(data: Value) -> Self {
        Response::DataResponse { data }
    }
}

/// Splits the byte stream at `\n` and decodes each line into a [`Request`].
///
/// Lines that are not valid envelopes are dropped without a reply. Lines longer than
/// `max_frame_bytes` are dropped as well, up to and including their terminating newline.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    max_frame_bytes: usize,
    next_index: usize,
    discarding: bool,
}

impl JsonLineCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Default for JsonLineCodec {
    fn default() -> Self {
        Self::new(1024 * 1024)
    }
}

impl Decoder for JsonLineCodec {
    type Item = Request;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Request>, io::Error> {
        loop {
            if self.discarding {
                match buf.iter().position(|b| *b == b'\n') {
                    Some(pos) => {
                        buf.advance(pos + 1);
                        self.discarding = false;
                        continue;
                    }
                    None => {
                        buf.clear();
                        return Ok(None);
                    }
                }
            }

            let read_to = cmp::min(self.max_frame_bytes.saturating_add(1), buf.len());
            match buf[self.next_index..read_to].iter().position(|b| *b == b'\n') {
                Some(offset) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    match Request::parse_line(&line[..end]) {
                        Some(request) => return Ok(Some(request)),
                        None => tracing::debug!(bytes = end, "Discarding malformed frame"),
                    }
                }
                None if buf.len() > self.max_frame_bytes => {
                    tracing::warn!(
                        limit = self.max_frame_bytes,
                        "Frame exceeds size limit, discarding until next newline"
                    );
                    self.next_index = 0;
                    self.discarding = true;
                }
                None => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Request>, io::Error> {
        // An unterminated trailing fragment is never a complete message.
        let decoded = self.decode(buf)?;
        if decoded.is_none() {
            buf.clear();
            self.next_index = 0;
        }
        Ok(decoded)
    }
}

impl Encoder<Response> for JsonLineCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), io::Error> {
        let json = serde_json::to_vec(&item).map_err(io::Error::other)?;
        dst.reserve(json.len() + 1);
        dst.extend_from_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}
