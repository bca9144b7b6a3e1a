//! JSON wire codec for [`Envelope`]
//!
//! The datagram is a flat object
//! `{type, origin_id, origin_address, origin_name, lamport, payload}`.
//! The payload schema is chosen by `type`; anything that does not fit is a
//! decode error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;

use crate::error::{ParleyError, ParleyResult};
use crate::membership::PeerId;
use crate::message::{Envelope, Message, MessageKind};

#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    kind: MessageKind,
    origin_id: Option<PeerId>,
    origin_address: SocketAddr,
    origin_name: String,
    lamport: u64,
    #[serde(default)]
    payload: Value,
}

pub fn encode(envelope: &Envelope) -> ParleyResult<Vec<u8>> {
    let payload = match &envelope.message {
        Message::Heartbeat | Message::Election | Message::Ok | Message::PeersRequest => Value::Null,
        Message::TimeRequest => Value::Object(serde_json::Map::new()),
        Message::Join(p) => serde_json::to_value(p)?,
        Message::AssignId(p) => serde_json::to_value(p)?,
        Message::Coordinator(p) | Message::PeersUpdate(p) | Message::PeersResponse(p) => {
            serde_json::to_value(p)?
        }
        Message::Chat(p) => serde_json::to_value(p)?,
        Message::TimeResponse(p) => serde_json::to_value(p)?,
        Message::TimeAdjust(p) => serde_json::to_value(p)?,
        Message::KickVoteStart(p) => serde_json::to_value(p)?,
        Message::KickVote(p) => serde_json::to_value(p)?,
        Message::KickResult(p) => serde_json::to_value(p)?,
        Message::Goodbye(p) => serde_json::to_value(p)?,
        Message::History(entries) => serde_json::to_value(entries)?,
    };

    let wire = WireEnvelope {
        kind: envelope.kind(),
        origin_id: envelope.origin_id,
        origin_address: envelope.origin_address,
        origin_name: envelope.origin_name.clone(),
        lamport: envelope.lamport,
        payload,
    };

    Ok(serde_json::to_vec(&wire)?)
}

pub fn decode(bytes: &[u8]) -> ParleyResult<Envelope> {
    let wire: WireEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| ParleyError::decode(format!("malformed envelope: {}", e)))?;

    // Every receiver computes max(local, lamport) + 1
    if wire.lamport == u64::MAX {
        return Err(ParleyError::decode("lamport timestamp out of range"));
    }

    let kind = wire.kind;
    let payload = wire.payload;

    let message = match kind {
        MessageKind::Join => Message::Join(payload_as(kind, payload)?),
        MessageKind::AssignId => Message::AssignId(payload_as(kind, payload)?),
        MessageKind::Heartbeat => Message::Heartbeat,
        MessageKind::Election => Message::Election,
        MessageKind::Ok => Message::Ok,
        MessageKind::Coordinator => Message::Coordinator(payload_as(kind, payload)?),
        MessageKind::Chat => Message::Chat(payload_as(kind, payload)?),
        MessageKind::TimeRequest => Message::TimeRequest,
        MessageKind::TimeResponse => Message::TimeResponse(payload_as(kind, payload)?),
        MessageKind::TimeAdjust => Message::TimeAdjust(payload_as(kind, payload)?),
        MessageKind::KickVoteStart => Message::KickVoteStart(payload_as(kind, payload)?),
        MessageKind::KickVote => Message::KickVote(payload_as(kind, payload)?),
        MessageKind::KickResult => Message::KickResult(payload_as(kind, payload)?),
        MessageKind::PeersUpdate => Message::PeersUpdate(payload_as(kind, payload)?),
        MessageKind::PeersRequest => Message::PeersRequest,
        MessageKind::PeersResponse => Message::PeersResponse(payload_as(kind, payload)?),
        MessageKind::Goodbye => Message::Goodbye(payload_as(kind, payload)?),
        MessageKind::History => Message::History(payload_as(kind, payload)?),
    };

    Ok(Envelope {
        origin_id: wire.origin_id,
        origin_address: wire.origin_address,
        origin_name: wire.origin_name,
        lamport: wire.lamport,
        message,
    })
}

fn payload_as<T: DeserializeOwned>(kind: MessageKind, payload: Value) -> ParleyResult<T> {
    serde_json::from_value(payload)
        .map_err(|e| ParleyError::decode(format!("bad {} payload: {}", kind, e)))
}
