use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::LengthDelimitedCodec;

// Command type identifiers
pub const CMD_PING: u8 = 0x00;
pub const CMD_GET: u8 = 0x01;
pub const CMD_SET: u8 = 0x02;
pub const CMD_INCR: u8 = 0x03;
pub const CMD_RPUSH: u8 = 0x04;
pub const CMD_RPUSH_MANY: u8 = 0x05;
pub const CMD_LRANGE: u8 = 0x06;
pub const CMD_EXPIRE: u8 = 0x07;
pub const CMD_EXISTS: u8 = 0x08;
pub const CMD_FLUSHDB: u8 = 0x09;

// Response type identifiers
pub const RESP_PONG: u8 = 0x00;
pub const RESP_OK: u8 = 0x01;
pub const RESP_VALUE: u8 = 0x02;
pub const RESP_NOT_FOUND: u8 = 0x03;
pub const RESP_ERROR: u8 = 0x04;
pub const RESP_INTEGER: u8 = 0x05;
pub const RESP_LIST: u8 = 0x06;

/// Default upper bound on a single frame
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Length-delimited framing with a 4-byte big-endian length prefix.
/// Both ends must use the same settings.
pub fn codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(max_frame_bytes)
        .new_codec()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    Get { key: String },
    Set { key: String, value: Bytes },
    Incr { key: String },
    RPush { key: String, value: Bytes },
    RPushMany { entries: Vec<(String, Bytes)> },
    LRange { key: String, start: i64, stop: i64 },
    Expire { key: String, ttl_ms: u64 },
    Exists { key: String },
    FlushDb,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Pong,
    Ok,
    Value { value: Bytes },
    NotFound,
    Error { msg: String },
    Integer { value: i64 },
    List { values: Vec<Bytes> },
}

impl Request {
    /// Encode a Request into Bytes for transmission
    ///
    /// Format (all integers big-endian, `key` = [key_len: u32][key bytes]):
    /// - PING / FLUSHDB: [cmd]
    /// - GET / INCR / EXISTS: [cmd][key]
    /// - SET / RPUSH: [cmd][key_len: u32][value_len: u32][key bytes][value bytes]
    /// - RPUSH_MANY: [cmd][count: u32] then count x (key_len, value_len, key, value)
    /// - LRANGE: [cmd][key][start: i64][stop: i64]
    /// - EXPIRE: [cmd][key][ttl_ms: u64]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Request::Ping => buf.put_u8(CMD_PING),
            Request::FlushDb => buf.put_u8(CMD_FLUSHDB),
            Request::Get { key } => {
                buf.put_u8(CMD_GET);
                put_key(&mut buf, key);
            }
            Request::Incr { key } => {
                buf.put_u8(CMD_INCR);
                put_key(&mut buf, key);
            }
            Request::Exists { key } => {
                buf.put_u8(CMD_EXISTS);
                put_key(&mut buf, key);
            }
            Request::Set { key, value } => {
                buf.put_u8(CMD_SET);
                put_pair(&mut buf, key, value);
            }
            Request::RPush { key, value } => {
                buf.put_u8(CMD_RPUSH);
                put_pair(&mut buf, key, value);
            }
            Request::RPushMany { entries } => {
                buf.put_u8(CMD_RPUSH_MANY);
                buf.put_u32(entries.len() as u32);
                for (key, value) in entries {
                    put_pair(&mut buf, key, value);
                }
            }
            Request::LRange { key, start, stop } => {
                buf.put_u8(CMD_LRANGE);
                put_key(&mut buf, key);
                buf.put_i64(*start);
                buf.put_i64(*stop);
            }
            Request::Expire { key, ttl_ms } => {
                buf.put_u8(CMD_EXPIRE);
                put_key(&mut buf, key);
                buf.put_u64(*ttl_ms);
            }
        }

        buf.freeze()
    }

    /// Decode a Request from Bytes received from the network
    ///
    /// This is called AFTER LengthDelimitedCodec has extracted the frame,
    /// so we receive a complete message as Bytes
    pub fn decode(mut buf: Bytes) -> Result<Self, String> {
        if buf.is_empty() {
            return Err("Empty buffer".to_string());
        }

        let cmd = buf.get_u8();

        let request = match cmd {
            CMD_PING => Request::Ping,
            CMD_FLUSHDB => Request::FlushDb,
            CMD_GET => Request::Get {
                key: read_key(&mut buf, "GET")?,
            },
            CMD_INCR => Request::Incr {
                key: read_key(&mut buf, "INCR")?,
            },
            CMD_EXISTS => Request::Exists {
                key: read_key(&mut buf, "EXISTS")?,
            },
            CMD_SET => {
                let (key, value) = read_pair(&mut buf, "SET")?;
                Request::Set { key, value }
            }
            CMD_RPUSH => {
                let (key, value) = read_pair(&mut buf, "RPUSH")?;
                Request::RPush { key, value }
            }
            CMD_RPUSH_MANY => {
                let count = read_u32(&mut buf, "RPUSH_MANY", "entry count")? as usize;
                // Each entry needs at least its two length fields
                if buf.remaining() < count.saturating_mul(8) {
                    return Err(format!(
                        "Invalid RPUSH_MANY: {} entries announced, {} bytes left",
                        count,
                        buf.remaining()
                    ));
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(read_pair(&mut buf, "RPUSH_MANY")?);
                }
                Request::RPushMany { entries }
            }
            CMD_LRANGE => {
                let key = read_key(&mut buf, "LRANGE")?;
                if buf.remaining() < 16 {
                    return Err("Invalid LRANGE: missing start/stop".to_string());
                }
                let start = buf.get_i64();
                let stop = buf.get_i64();
                Request::LRange { key, start, stop }
            }
            CMD_EXPIRE => {
                let key = read_key(&mut buf, "EXPIRE")?;
                if buf.remaining() < 8 {
                    return Err("Invalid EXPIRE: missing ttl".to_string());
                }
                let ttl_ms = buf.get_u64();
                Request::Expire { key, ttl_ms }
            }
            _ => return Err(format!("Unknown command: 0x{:02X}", cmd)),
        };

        if buf.has_remaining() {
            return Err(format!(
                "Trailing {} byte(s) after command 0x{:02X}",
                buf.remaining(),
                cmd
            ));
        }

        Ok(request)
    }
}

impl Response {
    /// Encode a Response into Bytes for transmission
    ///
    /// Format:
    /// - PONG: [0x00]
    /// - OK: [0x01]
    /// - VALUE: [0x02][value_len: u32][value bytes]
    /// - NOT_FOUND: [0x03]
    /// - ERROR: [0x04][msg_len: u32][msg bytes]
    /// - INTEGER: [0x05][value: i64]
    /// - LIST: [0x06][count: u32] then count x [len: u32][bytes]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();

        match self {
            Response::Pong => buf.put_u8(RESP_PONG),
            Response::Ok => buf.put_u8(RESP_OK),
            Response::NotFound => buf.put_u8(RESP_NOT_FOUND),
            Response::Value { value } => {
                buf.put_u8(RESP_VALUE);
                put_blob(&mut buf, value);
            }
            Response::Error { msg } => {
                buf.put_u8(RESP_ERROR);
                put_blob(&mut buf, msg.as_bytes());
            }
            Response::Integer { value } => {
                buf.put_u8(RESP_INTEGER);
                buf.put_i64(*value);
            }
            Response::List { values } => {
                buf.put_u8(RESP_LIST);
                buf.put_u32(values.len() as u32);
                for value in values {
                    put_blob(&mut buf, value);
                }
            }
        }

        buf.freeze()
    }

    /// Decode a Response from Bytes received from the network
    pub fn decode(mut buf: Bytes) -> Result<Self, String> {
        if buf.is_empty() {
            return Err("Empty buffer".to_string());
        }

        let resp_type = buf.get_u8();

        match resp_type {
            RESP_PONG => Ok(Response::Pong),
            RESP_OK => Ok(Response::Ok),
            RESP_NOT_FOUND => Ok(Response::NotFound),
            RESP_VALUE => Ok(Response::Value {
                value: read_blob(&mut buf, "VALUE")?,
            }),
            RESP_ERROR => {
                let msg_bytes = read_blob(&mut buf, "ERROR")?;
                let msg = String::from_utf8_lossy(&msg_bytes).to_string();
                Ok(Response::Error { msg })
            }
            RESP_INTEGER => {
                if buf.remaining() < 8 {
                    return Err("Invalid INTEGER: missing value".to_string());
                }
                Ok(Response::Integer {
                    value: buf.get_i64(),
                })
            }
            RESP_LIST => {
                let count = read_u32(&mut buf, "LIST", "item count")? as usize;
                if buf.remaining() < count.saturating_mul(4) {
                    return Err(format!(
                        "Invalid LIST: {} items announced, {} bytes left",
                        count,
                        buf.remaining()
                    ));
                }
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(read_blob(&mut buf, "LIST")?);
                }
                Ok(Response::List { values })
            }
            _ => Err(format!("Unknown response type: 0x{:02X}", resp_type)),
        }
    }
}

fn put_key(buf: &mut BytesMut, key: &str) {
    put_blob(buf, key.as_bytes());
}

fn put_blob(buf: &mut BytesMut, blob: &[u8]) {
    buf.put_u32(blob.len() as u32);
    buf.put_slice(blob);
}

fn put_pair(buf: &mut BytesMut, key: &str, value: &[u8]) {
    buf.put_u32(key.len() as u32);
    buf.put_u32(value.len() as u32);
    buf.put_slice(key.as_bytes());
    buf.put_slice(value);
}

fn read_u32(buf: &mut Bytes, cmd: &str, what: &str) -> Result<u32, String> {
    if buf.remaining() < 4 {
        return Err(format!("Invalid {cmd}: missing {what}"));
    }
    Ok(buf.get_u32())
}

fn read_blob(buf: &mut Bytes, cmd: &str) -> Result<Bytes, String> {
    let len = read_u32(buf, cmd, "length")? as usize;
    if buf.remaining() < len {
        return Err(format!(
            "Invalid {cmd}: expected {} bytes, got {}",
            len,
            buf.remaining()
        ));
    }
    Ok(buf.copy_to_bytes(len))
}

fn utf8_key(raw: Bytes, cmd: &str) -> Result<String, String> {
    String::from_utf8(raw.to_vec()).map_err(|e| format!("Invalid {cmd} key UTF-8: {e}"))
}

fn read_key(buf: &mut Bytes, cmd: &str) -> Result<String, String> {
    let raw = read_blob(buf, cmd)?;
    utf8_key(raw, cmd)
}

fn read_pair(buf: &mut Bytes, cmd: &str) -> Result<(String, Bytes), String> {
    if buf.remaining() < 8 {
        return Err(format!("Invalid {cmd}: missing key/value length fields"));
    }
    let key_len = buf.get_u32() as usize;
    let value_len = buf.get_u32() as usize;

    if buf.remaining() < key_len.saturating_add(value_len) {
        return Err(format!(
            "Invalid {cmd}: expected {} bytes, got {}",
            key_len.saturating_add(value_len),
            buf.remaining()
        ));
    }

    // Zero-copy slices of the frame
    let key = utf8_key(buf.copy_to_bytes(key_len), cmd)?;
    let value = buf.copy_to_bytes(value_len);
    Ok((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_encode_decode() {
        let decoded = Request::decode(Request::Ping.encode()).unwrap();
        assert_eq!(decoded, Request::Ping);
    }

    #[test]
    fn test_rpush_many_encode_decode() {
        let req = Request::RPushMany {
            entries: vec![
                ("Cache.store:inputs".to_string(), Bytes::from("(\"foo\",)")),
                ("Cache.store:outputs".to_string(), Bytes::from("some-key")),
            ],
        };
        assert_eq!(Request::decode(req.encode()).unwrap(), req);
    }

    #[test]
    fn test_lrange_negative_indices_survive_the_wire() {
        let req = Request::LRange {
            key: "letters".to_string(),
            start: -2,
            stop: -1,
        };
        assert_eq!(Request::decode(req.encode()).unwrap(), req);
    }

    #[test]
    fn test_set_layout() {
        let req = Request::Set {
            key: "k".to_string(),
            value: Bytes::from("vv"),
        };
        let encoded = req.encode();
        assert_eq!(
            encoded.as_ref(),
            &[CMD_SET, 0, 0, 0, 1, 0, 0, 0, 2, b'k', b'v', b'v']
        );
    }

    #[test]
    fn test_truncated_request_is_rejected() {
        let encoded = Request::Expire {
            key: "page".to_string(),
            ttl_ms: 10_000,
        }
        .encode();
        let truncated = encoded.slice(..encoded.len() - 3);

        let err = Request::decode(truncated).unwrap_err();
        assert!(err.contains("EXPIRE"), "{err}");
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut raw = BytesMut::from(Request::Ping.encode().as_ref());
        raw.put_u8(0xAA);
        assert!(Request::decode(raw.freeze()).is_err());
    }

    #[test]
    fn test_unknown_command() {
        let err = Request::decode(Bytes::from_static(&[0x7F])).unwrap_err();
        assert_eq!(err, "Unknown command: 0x7F");
    }

    #[test]
    fn test_rpush_many_rejects_oversized_count() {
        let mut raw = BytesMut::new();
        raw.put_u8(CMD_RPUSH_MANY);
        raw.put_u32(u32::MAX);
        assert!(Request::decode(raw.freeze()).is_err());
    }

    #[test]
    fn test_response_list_encode_decode() {
        let resp = Response::List {
            values: vec![Bytes::from("a"), Bytes::new(), Bytes::from_static(&[0xff])],
        };
        assert_eq!(Response::decode(resp.encode()).unwrap(), resp);
    }

    #[test]
    fn test_response_integer_encode_decode() {
        let resp = Response::Integer { value: -7 };
        assert_eq!(Response::decode(resp.encode()).unwrap(), resp);
    }

    #[test]
    fn test_response_error_is_lossy_utf8() {
        let mut raw = BytesMut::new();
        raw.put_u8(RESP_ERROR);
        raw.put_u32(2);
        raw.put_slice(&[0xff, b'!']);

        match Response::decode(raw.freeze()).unwrap() {
            Response::Error { msg } => assert!(msg.ends_with('!')),
            other => panic!("Expected Error, got {other:?}"),
        }
    }
}
