//! Message codec
//!
//! Builds and parses the seven protocol message types into and out of the
//! transport payload. The payload is a small JSON envelope holding the type
//! tag and a flat set of named string parameters:
//!
//! ```text
//! {"messageType":1,"fields":{"nodeIndex":"3","positionInfo":"120.00,40.50,100.00,UAV","timestamp":"12.5"}}
//! ```
//!
//! Positions travel as a single `positionInfo` parameter, `"x,y,z,ROLE"` with
//! two decimals, so beacons stay readable by peers that split on commas.

use super::packet::{
    Beacon, DataRelay, MeshData, MessageType, NodeAddress, Position, ProtocolMessage, Role,
    RouteReply, RouteRequest, SensorData,
};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

const NODE_INDEX: &str = "nodeIndex";
const TIMESTAMP: &str = "timestamp";
const POSITION_INFO: &str = "positionInfo";
const SOURCE_UAV: &str = "sourceUAV";
const DATA: &str = "data";
const FINAL_DESTINATION: &str = "finalDestination";
const HOP_COUNT: &str = "hopCount";
const DESTINATION: &str = "destination";
const ORIGINATOR: &str = "originator";
const SEQUENCE_NUMBER: &str = "sequenceNumber";
const TTL: &str = "ttl";

type Fields = BTreeMap<String, String>;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "messageType")]
    message_type: u8,
    #[serde(default)]
    fields: Fields,
}

/// Encoder/decoder between [`ProtocolMessage`] and wire bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageCodec;

impl MessageCodec {
    /// Encode a message into a transport payload
    pub fn encode(message: &ProtocolMessage) -> Result<Vec<u8>, CodecError> {
        let mut fields = Fields::new();
        match message {
            ProtocolMessage::NeighborDiscovery(b) | ProtocolMessage::NeighborResponse(b) => {
                fields.insert(NODE_INDEX.into(), b.node_index.to_string());
                fields.insert(TIMESTAMP.into(), b.timestamp.to_string());
                fields.insert(POSITION_INFO.into(), format_position_info(&b.position, b.role));
            }
            ProtocolMessage::SensorData(d) => {
                fields.insert(SOURCE_UAV.into(), d.source_node.to_string());
                fields.insert(DATA.into(), d.payload.clone());
            }
            ProtocolMessage::DataRelay(r) => {
                fields.insert(SOURCE_UAV.into(), r.source_node.to_string());
                fields.insert(DATA.into(), r.payload.clone());
                fields.insert(FINAL_DESTINATION.into(), r.final_destination.clone());
                fields.insert(HOP_COUNT.into(), r.hop_count.to_string());
            }
            ProtocolMessage::RouteRequest(r) => {
                fields.insert(DESTINATION.into(), r.destination.to_string());
                fields.insert(ORIGINATOR.into(), r.originator.to_string());
                fields.insert(SEQUENCE_NUMBER.into(), r.sequence_number.to_string());
                fields.insert(HOP_COUNT.into(), r.hop_count.to_string());
                fields.insert(TTL.into(), r.ttl.to_string());
            }
            ProtocolMessage::RouteReply(r) => {
                fields.insert(DESTINATION.into(), r.destination.to_string());
                fields.insert(ORIGINATOR.into(), r.originator.to_string());
                fields.insert(HOP_COUNT.into(), r.hop_count.to_string());
            }
            ProtocolMessage::MeshData(m) => {
                fields.insert(SOURCE_UAV.into(), m.source_node.to_string());
                fields.insert(DATA.into(), m.payload.clone());
                fields.insert(DESTINATION.into(), m.destination.to_string());
                fields.insert(TTL.into(), m.ttl.to_string());
            }
        }

        let envelope = Envelope {
            message_type: message.message_type() as u8,
            fields,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Decode a transport payload. Any missing or unparsable field is an error.
    pub fn decode(bytes: &[u8]) -> Result<ProtocolMessage, CodecError> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        let message_type = MessageType::from_u8(envelope.message_type)
            .ok_or(CodecError::UnknownMessageType(envelope.message_type))?;
        let f = &envelope.fields;

        let message = match message_type {
            MessageType::NeighborDiscovery => ProtocolMessage::NeighborDiscovery(parse_beacon(f)?),
            MessageType::NeighborResponse => ProtocolMessage::NeighborResponse(parse_beacon(f)?),
            MessageType::SensorData => ProtocolMessage::SensorData(SensorData {
                source_node: parse_field(f, SOURCE_UAV)?,
                payload: field(f, DATA)?.to_string(),
            }),
            MessageType::DataRelay => ProtocolMessage::DataRelay(DataRelay {
                source_node: parse_field(f, SOURCE_UAV)?,
                payload: field(f, DATA)?.to_string(),
                final_destination: field(f, FINAL_DESTINATION)?.to_string(),
                hop_count: parse_field(f, HOP_COUNT)?,
            }),
            MessageType::RouteRequest => ProtocolMessage::RouteRequest(RouteRequest {
                destination: parse_field(f, DESTINATION)?,
                originator: parse_field(f, ORIGINATOR)?,
                sequence_number: parse_field(f, SEQUENCE_NUMBER)?,
                hop_count: parse_field(f, HOP_COUNT)?,
                ttl: parse_field(f, TTL)?,
            }),
            MessageType::RouteReply => ProtocolMessage::RouteReply(RouteReply {
                destination: parse_field(f, DESTINATION)?,
                originator: parse_field(f, ORIGINATOR)?,
                hop_count: parse_field(f, HOP_COUNT)?,
            }),
            MessageType::MeshData => ProtocolMessage::MeshData(MeshData {
                source_node: parse_field(f, SOURCE_UAV)?,
                payload: field(f, DATA)?.to_string(),
                destination: parse_field(f, DESTINATION)?,
                ttl: parse_field(f, TTL)?,
            }),
        };

        Ok(message)
    }
}

/// Format a position as `"x,y,z,ROLE"` with two decimals
pub fn format_position_info(position: &Position, role: Role) -> String {
    format!(
        "{:.2},{:.2},{:.2},{}",
        position.x,
        position.y,
        position.z,
        role.as_str()
    )
}

/// Parse a `"x,y,z,ROLE"` string. Extra trailing tokens are ignored.
pub fn parse_position_info(value: &str) -> Result<(Position, Role), CodecError> {
    let invalid = || CodecError::InvalidField {
        field: POSITION_INFO,
        value: value.to_string(),
    };

    let tokens: Vec<&str> = value.split(',').collect();
    if tokens.len() < 4 {
        return Err(invalid());
    }

    let coord = |s: &str| s.trim().parse::<f64>().ok().filter(|v| v.is_finite());
    let x = coord(tokens[0]).ok_or_else(invalid)?;
    let y = coord(tokens[1]).ok_or_else(invalid)?;
    let z = coord(tokens[2]).ok_or_else(invalid)?;

    Ok((Position::new(x, y, z), Role::from_token(tokens[3])))
}

fn parse_beacon(fields: &Fields) -> Result<Beacon, CodecError> {
    let (position, role) = parse_position_info(field(fields, POSITION_INFO)?)?;
    Ok(Beacon {
        node_index: parse_field(fields, NODE_INDEX)?,
        timestamp: parse_field(fields, TIMESTAMP)?,
        position,
        role,
    })
}

fn field<'a>(fields: &'a Fields, name: &'static str) -> Result<&'a str, CodecError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or(CodecError::MissingField(name))
}

fn parse_field<T: FromStr>(fields: &Fields, name: &'static str) -> Result<T, CodecError> {
    let raw = field(fields, name)?;
    raw.trim().parse().map_err(|_| CodecError::InvalidField {
        field: name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_info_format() {
        let pos = Position::new(120.0, 40.456, 99.999);
        assert_eq!(format_position_info(&pos, Role::Uav), "120.00,40.46,100.00,UAV");
        assert_eq!(
            format_position_info(&Position::default(), Role::Gcs),
            "0.00,0.00,0.00,GCS"
        );
    }

    #[test]
    fn test_position_info_parse() {
        let (pos, role) = parse_position_info("400.00,0.00,50.25,GCS").unwrap();
        assert_eq!(pos, Position::new(400.0, 0.0, 50.25));
        assert_eq!(role, Role::Gcs);

        assert!(parse_position_info("1.0,2.0,3.0").is_err());
        assert!(parse_position_info("a,2.0,3.0,UAV").is_err());
        assert!(parse_position_info("NaN,2.0,3.0,UAV").is_err());
    }

    #[test]
    fn test_beacon_roundtrip() {
        let msg = ProtocolMessage::NeighborDiscovery(Beacon {
            node_index: 4,
            timestamp: 12.5,
            position: Position::new(400.0, 0.0, 80.0),
            role: Role::Gcs,
        });
        let bytes = MessageCodec::encode(&msg).unwrap();
        assert_eq!(MessageCodec::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_route_request_roundtrip() {
        let msg = ProtocolMessage::RouteRequest(RouteRequest {
            destination: NodeAddress::new(10, 0, 0, 1),
            originator: NodeAddress::new(10, 0, 0, 5),
            sequence_number: 7,
            hop_count: 0,
            ttl: 5,
        });
        let bytes = MessageCodec::encode(&msg).unwrap();
        assert_eq!(MessageCodec::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_envelope_layout() {
        let msg = ProtocolMessage::SensorData(SensorData {
            source_node: 2,
            payload: "UAV_2_SENSOR".into(),
        });
        let bytes = MessageCodec::encode(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["messageType"], 3);
        assert_eq!(value["fields"]["sourceUAV"], "2");
        assert_eq!(value["fields"]["data"], "UAV_2_SENSOR");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            MessageCodec::decode(b"not json"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            MessageCodec::decode(br#"{"messageType":42,"fields":{}}"#),
            Err(CodecError::UnknownMessageType(42))
        ));
    }

    #[test]
    fn test_decode_missing_and_invalid_fields() {
        let missing = br#"{"messageType":6,"fields":{"destination":"10.0.0.1","originator":"10.0.0.2"}}"#;
        assert!(matches!(
            MessageCodec::decode(missing),
            Err(CodecError::MissingField("hopCount"))
        ));

        let invalid = br#"{"messageType":7,"fields":{"sourceUAV":"1","data":"x","destination":"nowhere","ttl":"3"}}"#;
        assert!(matches!(
            MessageCodec::decode(invalid),
            Err(CodecError::InvalidField { field: "destination", .. })
        ));

        let negative_ttl = br#"{"messageType":5,"fields":{"destination":"10.0.0.1","originator":"10.0.0.2","sequenceNumber":"1","hopCount":"0","ttl":"-1"}}"#;
        assert!(MessageCodec::decode(negative_ttl).is_err());
    }
}
