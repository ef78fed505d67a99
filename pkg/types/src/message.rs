use serde::{Deserialize, Serialize};

/// Kind of message exchanged between replicas for mutual exclusion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Request,
    Reply,
}

/// Message posted to a peer's `/internal/message` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub timestamp: u64,
    pub node_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_uppercase() {
        let msg = PeerMessage {
            kind: MessageKind::Request,
            timestamp: 4,
            node_id: "server1".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "REQUEST");
        assert_eq!(json["timestamp"], 4);
        assert_eq!(json["node_id"], "server1");
    }

    #[test]
    fn reply_parses_from_wire_form() {
        let msg: PeerMessage =
            serde_json::from_str(r#"{"type":"REPLY","timestamp":9,"node_id":"server2"}"#).unwrap();
        assert_eq!(msg.kind, MessageKind::Reply);
        assert_eq!(msg.timestamp, 9);
    }
}
