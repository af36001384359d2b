//! Peer protocol messages: a fixed-width 12-byte ASCII command prefix
//! followed by a deterministic binary encoding of the command's payload.

use ember_core::error::NetworkError;

/// Width of the zero-padded ASCII command prefix.
pub const COMMAND_LEN: usize = 12;

/// Hard ceiling on a single frame's payload, guarding against a peer that
/// sends a bogus length and never stops. Comfortably above a mined block's
/// realistic size.
pub const MAX_PAYLOAD_LEN: usize = 32 * 1024 * 1024;

fn bincode_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

fn command_to_bytes(cmd: &str) -> [u8; COMMAND_LEN] {
    let mut bytes = [0u8; COMMAND_LEN];
    let cmd_bytes = cmd.as_bytes();
    bytes[..cmd_bytes.len()].copy_from_slice(cmd_bytes);
    bytes
}

fn bytes_to_command(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

/// Whether an [`Inv`]/[`GetData`] entry is a block hash or a transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub enum Kind {
    Block,
    Tx,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Version {
    pub version: u32,
    pub best_height: u64,
    pub from: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Addr {
    pub addr_list: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct GetBlocks {
    pub from: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct Inv {
    pub from: String,
    pub kind: Kind,
    pub items: Vec<[u8; 32]>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct GetData {
    pub from: String,
    pub kind: Kind,
    /// Binary, not hex — matches `Inv::items` entries.
    pub id: [u8; 32],
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct BlockPayload {
    pub from: String,
    pub serialized_block: Vec<u8>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxPayload {
    pub from: String,
    pub serialized_tx: Vec<u8>,
}

/// One peer-protocol message, tagged by its 12-byte command.
#[derive(Debug, Clone)]
pub enum Message {
    Version(Version),
    Addr(Addr),
    GetBlocks(GetBlocks),
    Inv(Inv),
    GetData(GetData),
    Block(BlockPayload),
    Tx(TxPayload),
}

impl Message {
    fn command(&self) -> &'static str {
        match self {
            Message::Version(_) => "version",
            Message::Addr(_) => "addr",
            Message::GetBlocks(_) => "getblocks",
            Message::Inv(_) => "inv",
            Message::GetData(_) => "getdata",
            Message::Block(_) => "block",
            Message::Tx(_) => "tx",
        }
    }

    /// Encode as a 12-byte command prefix plus the payload's bincode bytes.
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        let payload = match self {
            Message::Version(p) => bincode::encode_to_vec(p, bincode_config()),
            Message::Addr(p) => bincode::encode_to_vec(p, bincode_config()),
            Message::GetBlocks(p) => bincode::encode_to_vec(p, bincode_config()),
            Message::Inv(p) => bincode::encode_to_vec(p, bincode_config()),
            Message::GetData(p) => bincode::encode_to_vec(p, bincode_config()),
            Message::Block(p) => bincode::encode_to_vec(p, bincode_config()),
            Message::Tx(p) => bincode::encode_to_vec(p, bincode_config()),
        }
        .map_err(|e| NetworkError::ProtocolDecode(e.to_string()))?;

        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(NetworkError::FrameTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut frame = Vec::with_capacity(COMMAND_LEN + payload.len());
        frame.extend_from_slice(&command_to_bytes(self.command()));
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a full frame (12-byte command prefix + payload).
    pub fn decode(frame: &[u8]) -> Result<Message, NetworkError> {
        if frame.len() < COMMAND_LEN {
            return Err(NetworkError::Truncated);
        }
        let command = bytes_to_command(&frame[..COMMAND_LEN]);
        let payload = &frame[COMMAND_LEN..];

        fn decode_payload<T: bincode::Decode<()>>(payload: &[u8]) -> Result<T, NetworkError> {
            bincode::decode_from_slice(payload, bincode_config())
                .map(|(value, _)| value)
                .map_err(|e| NetworkError::ProtocolDecode(e.to_string()))
        }

        Ok(match command.as_str() {
            "version" => Message::Version(decode_payload(payload)?),
            "addr" => Message::Addr(decode_payload(payload)?),
            "getblocks" => Message::GetBlocks(decode_payload(payload)?),
            "inv" => Message::Inv(decode_payload(payload)?),
            "getdata" => Message::GetData(decode_payload(payload)?),
            "block" => Message::Block(decode_payload(payload)?),
            "tx" => Message::Tx(decode_payload(payload)?),
            other => return Err(NetworkError::UnknownCommand(other.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_round_trip() {
        assert_eq!(bytes_to_command(&command_to_bytes("tx")), "tx");
        assert_eq!(bytes_to_command(&command_to_bytes("getblocks")), "getblocks");
    }

    #[test]
    fn version_round_trip() {
        let msg = Message::Version(Version { version: 1, best_height: 42, from: "localhost:3000".into() });
        let frame = msg.encode().unwrap();
        match Message::decode(&frame).unwrap() {
            Message::Version(v) => {
                assert_eq!(v.version, 1);
                assert_eq!(v.best_height, 42);
                assert_eq!(v.from, "localhost:3000");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn inv_round_trip_with_binary_items() {
        let msg = Message::Inv(Inv { from: "a".into(), kind: Kind::Block, items: vec![[7u8; 32]] });
        let frame = msg.encode().unwrap();
        match Message::decode(&frame).unwrap() {
            Message::Inv(inv) => {
                assert_eq!(inv.kind, Kind::Block);
                assert_eq!(inv.items[0], [7u8; 32]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn getdata_id_is_binary_not_hex() {
        let msg = Message::GetData(GetData { from: "a".into(), kind: Kind::Tx, id: [9u8; 32] });
        let frame = msg.encode().unwrap();
        match Message::decode(&frame).unwrap() {
            Message::GetData(gd) => assert_eq!(gd.id, [9u8; 32]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        let err = Message::decode(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, NetworkError::Truncated));
    }

    #[test]
    fn decode_rejects_unknown_command() {
        let mut frame = command_to_bytes("bogus").to_vec();
        frame.extend_from_slice(&[1, 2, 3]);
        let err = Message::decode(&frame).unwrap_err();
        assert!(matches!(err, NetworkError::UnknownCommand(_)));
    }

    #[test]
    fn block_and_tx_payloads_round_trip() {
        let block_msg = Message::Block(BlockPayload { from: "a".into(), serialized_block: vec![1, 2, 3] });
        let frame = block_msg.encode().unwrap();
        match Message::decode(&frame).unwrap() {
            Message::Block(b) => assert_eq!(b.serialized_block, vec![1, 2, 3]),
            _ => panic!("wrong variant"),
        }

        let tx_msg = Message::Tx(TxPayload { from: "a".into(), serialized_tx: vec![4, 5] });
        let frame = tx_msg.encode().unwrap();
        match Message::decode(&frame).unwrap() {
            Message::Tx(t) => assert_eq!(t.serialized_tx, vec![4, 5]),
            _ => panic!("wrong variant"),
        }
    }
}
