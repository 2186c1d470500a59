//! Socket.IO (v5) over Engine.IO (v4) text framing.
//!
//! Only the subset a supplier needs over the WebSocket transport:
//!
//! ```text
//! Engine.IO frame   <type digit><data>
//!     0 open  {"sid", "pingInterval", "pingTimeout"}
//!     1 close
//!     2 ping / 3 pong
//!     4 message → Socket.IO packet
//!
//! Socket.IO packet  <type digit>[/<namespace>,][<ack id>][<json>]
//!     0 connect, 1 disconnect, 2 event, 3 ack, 4 connect_error
//! ```
//!
//! Binary packets (5, 6) are not used by the supplier protocol and are
//! rejected.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Server pushes work with this event.
pub const REQUEST_EVENT: &str = "supplier:request";

/// Reply event for a given correlation reference.
pub fn reply_event(reference: &str) -> String {
    format!("supplier:reply:{}", reference)
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("unknown Engine.IO packet type {0:?}")]
    UnknownEngineType(char),

    #[error("unknown Socket.IO packet type {0:?}")]
    UnknownSocketType(char),

    #[error("binary Socket.IO packets are not supported")]
    Binary,

    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    #[error("invalid packet JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Engine.IO OPEN handshake data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenHandshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenHandshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let data = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(serde_json::from_str(data)?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(data.to_string()),
            '3' => EnginePacket::Pong(data.to_string()),
            '4' => EnginePacket::Message(data.to_string()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => return Err(ProtocolError::UnknownEngineType(other)),
        })
    }

    pub fn encode(&self) -> String {
        match self {
            // Clients never send OPEN; kept for symmetry in tests and mocks.
            EnginePacket::Open(hs) => format!(
                r#"0{{"sid":{},"upgrades":[],"pingInterval":{},"pingTimeout":{}}}"#,
                Value::String(hs.sid.clone()),
                hs.ping_interval,
                hs.ping_timeout
            ),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    pub fn event(namespace: &str, name: impl Into<String>, args: Vec<Value>) -> Self {
        SocketPacket::Event {
            namespace: namespace.to_string(),
            id: None,
            name: name.into(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    pub fn decode(payload: &str) -> Result<Self, ProtocolError> {
        let mut chars = payload.chars();
        let kind = chars.next().ok_or(ProtocolError::Empty)?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::Binary);
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let ns = &rest[..end];
            rest = rest.get(end + 1..).unwrap_or("");
            ns.to_string()
        } else {
            "/".to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            Some(rest[..digits].parse::<u64>().map_err(|_| ProtocolError::Malformed("ack id"))?)
        } else {
            None
        };
        let json = &rest[digits..];
        let data: Option<Value> = if json.is_empty() {
            None
        } else {
            Some(serde_json::from_str(json)?)
        };

        Ok(match kind {
            '0' => SocketPacket::Connect { namespace, data },
            '1' => SocketPacket::Disconnect { namespace },
            '2' => {
                let mut args = match data {
                    Some(Value::Array(args)) => args,
                    _ => return Err(ProtocolError::Malformed("event without argument array")),
                };
                if args.is_empty() {
                    return Err(ProtocolError::Malformed("event without name"));
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    _ => return Err(ProtocolError::Malformed("event name is not a string")),
                };
                SocketPacket::Event {
                    namespace,
                    id,
                    name,
                    args,
                }
            }
            '3' => {
                let id = id.ok_or(ProtocolError::Malformed("ack without id"))?;
                let args = match data {
                    Some(Value::Array(args)) => args,
                    _ => Vec::new(),
                };
                SocketPacket::Ack { namespace, id, args }
            }
            '4' => SocketPacket::ConnectError { namespace, data },
            other => return Err(ProtocolError::UnknownSocketType(other)),
        })
    }

    pub fn encode(&self) -> String {
        let (kind, id, data) = match self {
            SocketPacket::Connect { data, .. } => ('0', None, data.clone()),
            SocketPacket::Disconnect { .. } => ('1', None, None),
            SocketPacket::Event { id, name, args, .. } => {
                let mut array = Vec::with_capacity(args.len() + 1);
                array.push(Value::String(name.clone()));
                array.extend(args.iter().cloned());
                ('2', *id, Some(Value::Array(array)))
            }
            SocketPacket::Ack { id, args, .. } => ('3', Some(*id), Some(Value::Array(args.clone()))),
            SocketPacket::ConnectError { data, .. } => ('4', None, data.clone()),
        };

        let mut out = String::new();
        out.push(kind);
        let namespace = self.namespace();
        if namespace != "/" {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = data {
            out.push_str(&data.to_string());
        }
        out
    }

    /// Full WebSocket text frame for this packet.
    pub fn to_frame(&self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let packet =
            EnginePacket::decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#)
                .unwrap();
        assert_eq!(
            packet,
            EnginePacket::Open(OpenHandshake {
                sid: "abc".into(),
                ping_interval: 25000,
                ping_timeout: 20000,
            })
        );
    }

    #[test]
    fn test_ping_pong() {
        assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(EnginePacket::Pong(String::new()).encode(), "3");
        assert!(matches!(EnginePacket::decode("9"), Err(ProtocolError::UnknownEngineType('9'))));
        assert!(matches!(EnginePacket::decode(""), Err(ProtocolError::Empty)));
    }

    #[test]
    fn test_connect_with_auth() {
        let packet = SocketPacket::Connect {
            namespace: "/supplier".into(),
            data: Some(json!({"supplierId": "cltAAA"})),
        };
        assert_eq!(packet.encode(), r#"0/supplier,{"supplierId":"cltAAA"}"#);
        assert_eq!(packet.to_frame(), r#"40/supplier,{"supplierId":"cltAAA"}"#);

        let bare = SocketPacket::Connect {
            namespace: "/supplier".into(),
            data: None,
        };
        assert_eq!(bare.encode(), "0/supplier,");
    }

    #[test]
    fn test_decode_connect_ack() {
        let packet = SocketPacket::decode(r#"0/supplier,{"sid":"xyz"}"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Connect {
                namespace: "/supplier".into(),
                data: Some(json!({"sid": "xyz"})),
            }
        );
    }

    #[test]
    fn test_decode_request_event() {
        let packet = SocketPacket::decode(
            r#"2/supplier,["supplier:request",{"method":"topup","ref":"r1","payload":{"trxId":"T1"}}]"#,
        )
        .unwrap();

        match packet {
            SocketPacket::Event { namespace, id, name, args } => {
                assert_eq!(namespace, "/supplier");
                assert_eq!(id, None);
                assert_eq!(name, REQUEST_EVENT);
                assert_eq!(args[0]["ref"], "r1");
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_decode_event_with_ack_id_on_root_namespace() {
        let packet = SocketPacket::decode(r#"212["ping",1]"#).unwrap();
        assert_eq!(
            packet,
            SocketPacket::Event {
                namespace: "/".into(),
                id: Some(12),
                name: "ping".into(),
                args: vec![json!(1)],
            }
        );
    }

    #[test]
    fn test_encode_reply_event() {
        let packet = SocketPacket::event("/supplier", reply_event("r1"), vec![json!({"ok": true})]);
        assert_eq!(packet.to_frame(), r#"42/supplier,["supplier:reply:r1",{"ok":true}]"#);
    }

    #[test]
    fn test_rejects_binary_and_bad_events() {
        assert!(matches!(SocketPacket::decode("51-/supplier,[]"), Err(ProtocolError::Binary)));
        assert!(SocketPacket::decode("2/supplier,{}").is_err());
        assert!(SocketPacket::decode("2/supplier,[]").is_err());
        assert!(SocketPacket::decode("2/supplier,[1]").is_err());
    }

    #[test]
    fn test_decode_connect_error_and_disconnect() {
        let err = SocketPacket::decode(r#"4/supplier,{"message":"unknown supplier"}"#).unwrap();
        assert!(matches!(err, SocketPacket::ConnectError { data: Some(_), .. }));

        let bye = SocketPacket::decode("1/supplier,").unwrap();
        assert_eq!(bye, SocketPacket::Disconnect { namespace: "/supplier".into() });
    }
}
