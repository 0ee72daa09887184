//! wire codec for the remote pool program
//!
//! binary layouts for the insertion event, the deposit/withdraw/root
//! instructions, and the fixed-offset account states. all integers are
//! little-endian on the wire; hash values travel as 32-byte big-endian
//! field representations.

use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, Nullifier, NullifierHash, Secret};
use crate::utxo::TokenKind;
use crate::{PoolError, Result, ROOT_HISTORY_SIZE};

/// 8-byte tag emitted in front of every leaf-insertion event record
pub const LEAF_INSERTED_EVENT: [u8; 8] = [0x9d, 0x1b, 0x42, 0xf0, 0x6a, 0x7c, 0x21, 0x58];

/// operation discriminators, first 8 bytes of every instruction
pub const OP_DEPOSIT_NATIVE: [u8; 8] = [0x6c, 0x51, 0x4e, 0x75, 0x7d, 0x9b, 0x38, 0xc8];
pub const OP_DEPOSIT_TOKEN: [u8; 8] = [0xe0, 0x00, 0xc6, 0xaf, 0xc6, 0x2f, 0x69, 0xcc];
pub const OP_WITHDRAW_NATIVE: [u8; 8] = [0x22, 0xb4, 0x7f, 0x12, 0x83, 0x90, 0x5e, 0x01];
pub const OP_WITHDRAW_TOKEN: [u8; 8] = [0x57, 0x0c, 0xd3, 0x8e, 0x44, 0xa1, 0x96, 0x3b];
pub const OP_UPDATE_ROOT: [u8; 8] = [0xb1, 0x3a, 0x02, 0xea, 0x9f, 0x66, 0x4d, 0x27];

/// shortest well-formed event: discriminator + index + commitment + payload length
pub const EVENT_MIN_LEN: usize = 8 + 8 + 32 + 4;
/// upper bound on the encrypted payload; larger lengths are treated as garbage
pub const MAX_PAYLOAD_LEN: usize = 10_000;

/// one commitment insertion as observed in transaction logs
///
/// layout: 8-byte discriminator, u64 LE leaf index, 32-byte commitment,
/// u32 LE payload length, payload, u64 LE amount, 1-byte optional tag,
/// 32-byte mint when the tag is set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafEvent {
    pub index: u64,
    pub commitment: Commitment,
    pub encrypted_output: Vec<u8>,
    pub amount: u64,
    pub mint: Option<[u8; 32]>,
}

impl LeafEvent {
    /// parse a log record; None for anything malformed
    ///
    /// undersized records and out-of-range payload lengths are skipped
    /// rather than erroring: logs carry unrelated records too.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < EVENT_MIN_LEN || data[..8] != LEAF_INSERTED_EVENT {
            return None;
        }

        let index = u64::from_le_bytes(data[8..16].try_into().ok()?);
        let commitment = Commitment(data[16..48].try_into().ok()?);
        let payload_len = u32::from_le_bytes(data[48..52].try_into().ok()?) as usize;

        if payload_len == 0
            || payload_len > MAX_PAYLOAD_LEN
            || EVENT_MIN_LEN + payload_len > data.len()
        {
            return None;
        }
        let encrypted_output = data[52..52 + payload_len].to_vec();

        let mut offset = 52 + payload_len;
        let amount = if data.len() >= offset + 8 {
            let v = u64::from_le_bytes(data[offset..offset + 8].try_into().ok()?);
            offset += 8;
            v
        } else {
            0
        };

        let mint = match data.get(offset) {
            Some(1) if data.len() >= offset + 1 + 32 => {
                Some(data[offset + 1..offset + 33].try_into().ok()?)
            }
            _ => None,
        };

        Some(Self {
            index,
            commitment,
            encrypted_output,
            amount,
            mint,
        })
    }

    /// encode with the same layout; used by tests and ledger emulators
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(EVENT_MIN_LEN + self.encrypted_output.len() + 41);
        out.extend_from_slice(&LEAF_INSERTED_EVENT);
        out.extend_from_slice(&self.index.to_le_bytes());
        out.extend_from_slice(&self.commitment.0);
        out.extend_from_slice(&(self.encrypted_output.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.encrypted_output);
        out.extend_from_slice(&self.amount.to_le_bytes());
        match self.mint {
            Some(mint) => {
                out.push(1);
                out.extend_from_slice(&mint);
            }
            None => out.push(0),
        }
        out
    }
}

/// public inputs of a withdrawal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawInputs {
    pub nullifier_hash: NullifierHash,
    /// tree root the inclusion proof was generated against
    pub state_root: [u8; 32],
    /// change commitment, or the all-zero sentinel when fully spent
    pub new_commitment: Commitment,
}

/// deposit instruction data
///
/// discriminator + 32-byte commitment + u32 LE payload length + payload
/// + u64 LE amount + u64 LE leaf index
pub fn encode_deposit(
    token: &TokenKind,
    commitment: &Commitment,
    encrypted_output: &[u8],
    amount: u64,
    leaf_index: u64,
) -> Vec<u8> {
    let disc = match token {
        TokenKind::Native => OP_DEPOSIT_NATIVE,
        TokenKind::Token { .. } => OP_DEPOSIT_TOKEN,
    };
    let mut out = Vec::with_capacity(8 + 32 + 4 + encrypted_output.len() + 16);
    out.extend_from_slice(&disc);
    out.extend_from_slice(&commitment.0);
    out.extend_from_slice(&(encrypted_output.len() as u32).to_le_bytes());
    out.extend_from_slice(encrypted_output);
    out.extend_from_slice(&amount.to_le_bytes());
    out.extend_from_slice(&leaf_index.to_le_bytes());
    out
}

/// withdraw instruction data
///
/// discriminator + nullifier hash + state root + new commitment +
/// recipient + u64 LE post-fee amount + u64 LE fee
pub fn encode_withdraw(
    token: &TokenKind,
    inputs: &WithdrawInputs,
    recipient: &[u8; 32],
    amount_after_fee: u64,
    fee: u64,
) -> Vec<u8> {
    let disc = match token {
        TokenKind::Native => OP_WITHDRAW_NATIVE,
        TokenKind::Token { .. } => OP_WITHDRAW_TOKEN,
    };
    let mut out = Vec::with_capacity(8 + 32 * 4 + 16);
    out.extend_from_slice(&disc);
    out.extend_from_slice(&inputs.nullifier_hash.0);
    out.extend_from_slice(&inputs.state_root);
    out.extend_from_slice(&inputs.new_commitment.0);
    out.extend_from_slice(recipient);
    out.extend_from_slice(&amount_after_fee.to_le_bytes());
    out.extend_from_slice(&fee.to_le_bytes());
    out
}

/// root-update instruction data: discriminator + 32-byte root
pub fn encode_update_root(root: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(40);
    out.extend_from_slice(&OP_UPDATE_ROOT);
    out.extend_from_slice(root);
    out
}

/// authoritative tree state read from the remote ledger account
///
/// layout: 8-byte header, 32-byte authority, u64 LE next index, 32-byte
/// current root, 32 x 32-byte root-history ring, u64 LE ring cursor,
/// height byte, layout-version byte
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerState {
    pub authority: [u8; 32],
    pub next_index: u64,
    pub current_root: [u8; 32],
    pub root_history: Vec<[u8; 32]>,
    pub root_history_index: u64,
    pub height: u8,
    pub version: u8,
}

impl LedgerState {
    pub const LEN: usize = 8 + 32 + 8 + 32 + 32 * ROOT_HISTORY_SIZE + 8 + 1 + 1;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(PoolError::Codec(format!(
                "ledger account too short: {} < {}",
                data.len(),
                Self::LEN
            )));
        }

        let mut offset = 8;
        let authority: [u8; 32] = data[offset..offset + 32].try_into().unwrap();
        offset += 32;
        let next_index = u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap());
        offset += 8;
        let current_root: [u8; 32] = data[offset..offset + 32].try_into().unwrap();
        offset += 32;

        let mut root_history = Vec::with_capacity(ROOT_HISTORY_SIZE);
        for i in 0..ROOT_HISTORY_SIZE {
            let start = offset + i * 32;
            root_history.push(data[start..start + 32].try_into().unwrap());
        }
        offset += 32 * ROOT_HISTORY_SIZE;

        let root_history_index = u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap());
        offset += 8;

        Ok(Self {
            authority,
            next_index,
            current_root,
            root_history,
            root_history_index,
            height: data[offset],
            version: data[offset + 1],
        })
    }

    /// true if `root` is the current root or still in the ring buffer
    pub fn knows_root(&self, root: &[u8; 32]) -> bool {
        self.current_root == *root || self.root_history.iter().any(|r| r == root)
    }
}

/// pool configuration account, fixed offsets
///
/// layout: 8-byte header, 32-byte admin, 32-byte relayer authority,
/// u16 LE fee basis points, 32-byte fee recipient
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfigState {
    pub admin: [u8; 32],
    pub relayer_authority: [u8; 32],
    pub fee_bps: u16,
    pub fee_recipient: [u8; 32],
}

impl PoolConfigState {
    pub const LEN: usize = 8 + 32 + 32 + 2 + 32;

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(PoolError::Codec(format!(
                "pool config too short: {} < {}",
                data.len(),
                Self::LEN
            )));
        }
        Ok(Self {
            admin: data[8..40].try_into().unwrap(),
            relayer_authority: data[40..72].try_into().unwrap(),
            fee_bps: u16::from_le_bytes(data[72..74].try_into().unwrap()),
            fee_recipient: data[74..106].try_into().unwrap(),
        })
    }
}

/// note plaintext carried as the "encrypted" output blob
///
/// encryption of this blob is the wallet's concern; the pool only needs
/// an opaque, deduplicatable byte string per insertion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SealedNote {
    pub value: u64,
    pub nullifier: Nullifier,
    pub secret: Secret,
    pub leaf_index: u64,
}

impl SealedNote {
    pub fn seal(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| PoolError::Codec(e.to_string()))
    }

    pub fn unseal(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| PoolError::Codec(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(mint: Option<[u8; 32]>) -> LeafEvent {
        LeafEvent {
            index: 7,
            commitment: Commitment([0xab; 32]),
            encrypted_output: vec![1, 2, 3, 4, 5],
            amount: 1_000_000,
            mint,
        }
    }

    #[test]
    fn test_event_roundtrip_native() {
        let event = sample_event(None);
        assert_eq!(LeafEvent::parse(&event.encode()).unwrap(), event);
    }

    #[test]
    fn test_event_roundtrip_with_mint() {
        let event = sample_event(Some([0xcd; 32]));
        assert_eq!(LeafEvent::parse(&event.encode()).unwrap(), event);
    }

    #[test]
    fn test_undersized_record_skipped() {
        assert!(LeafEvent::parse(&[0u8; 51]).is_none());
        let mut data = sample_event(None).encode();
        data.truncate(EVENT_MIN_LEN - 1);
        assert!(LeafEvent::parse(&data).is_none());
    }

    #[test]
    fn test_wrong_discriminator_skipped() {
        let mut data = sample_event(None).encode();
        data[0] ^= 0xff;
        assert!(LeafEvent::parse(&data).is_none());
    }

    #[test]
    fn test_bad_payload_length_skipped() {
        let mut data = sample_event(None).encode();
        // claim a payload longer than the record
        data[48..52].copy_from_slice(&(u32::MAX).to_le_bytes());
        assert!(LeafEvent::parse(&data).is_none());

        // zero-length payload is also rejected
        let mut data = sample_event(None).encode();
        data[48..52].copy_from_slice(&0u32.to_le_bytes());
        assert!(LeafEvent::parse(&data).is_none());
    }

    #[test]
    fn test_deposit_encoding_layout() {
        let commitment = Commitment([0x11; 32]);
        let payload = vec![9u8; 6];
        let data = encode_deposit(&TokenKind::Native, &commitment, &payload, 500, 3);

        assert_eq!(&data[..8], &OP_DEPOSIT_NATIVE);
        assert_eq!(&data[8..40], &commitment.0);
        assert_eq!(u32::from_le_bytes(data[40..44].try_into().unwrap()), 6);
        assert_eq!(&data[44..50], payload.as_slice());
        assert_eq!(u64::from_le_bytes(data[50..58].try_into().unwrap()), 500);
        assert_eq!(u64::from_le_bytes(data[58..66].try_into().unwrap()), 3);
        assert_eq!(data.len(), 66);
    }

    #[test]
    fn test_withdraw_encoding_layout() {
        let inputs = WithdrawInputs {
            nullifier_hash: NullifierHash([0x22; 32]),
            state_root: [0x33; 32],
            new_commitment: Commitment::ZERO,
        };
        let data = encode_withdraw(&TokenKind::Native, &inputs, &[0x44; 32], 975, 25);

        assert_eq!(&data[..8], &OP_WITHDRAW_NATIVE);
        assert_eq!(&data[8..40], &[0x22; 32]);
        assert_eq!(&data[40..72], &[0x33; 32]);
        assert_eq!(&data[72..104], &[0u8; 32]);
        assert_eq!(&data[104..136], &[0x44; 32]);
        assert_eq!(u64::from_le_bytes(data[136..144].try_into().unwrap()), 975);
        assert_eq!(u64::from_le_bytes(data[144..152].try_into().unwrap()), 25);
    }

    #[test]
    fn test_ledger_state_parse() {
        let mut data = vec![0u8; LedgerState::LEN];
        data[8..40].fill(0xaa); // authority
        data[40..48].copy_from_slice(&42u64.to_le_bytes()); // next_index
        data[48..80].fill(0xbb); // current root
        let ring_start = 80;
        data[ring_start..ring_start + 32].fill(0xcc); // history slot 0
        let cursor_at = ring_start + 32 * ROOT_HISTORY_SIZE;
        data[cursor_at..cursor_at + 8].copy_from_slice(&5u64.to_le_bytes());
        data[cursor_at + 8] = 20; // height
        data[cursor_at + 9] = 1; // version

        let state = LedgerState::parse(&data).unwrap();
        assert_eq!(state.authority, [0xaa; 32]);
        assert_eq!(state.next_index, 42);
        assert_eq!(state.current_root, [0xbb; 32]);
        assert_eq!(state.root_history[0], [0xcc; 32]);
        assert_eq!(state.root_history_index, 5);
        assert_eq!(state.height, 20);
        assert_eq!(state.version, 1);

        assert!(state.knows_root(&[0xbb; 32]));
        assert!(state.knows_root(&[0xcc; 32]));
        assert!(!state.knows_root(&[0xdd; 32]));

        assert!(LedgerState::parse(&data[..100]).is_err());
    }

    #[test]
    fn test_pool_config_parse() {
        let mut data = vec![0u8; PoolConfigState::LEN];
        data[8..40].fill(1);
        data[40..72].fill(2);
        data[72..74].copy_from_slice(&25u16.to_le_bytes());
        data[74..106].fill(3);

        let config = PoolConfigState::parse(&data).unwrap();
        assert_eq!(config.admin, [1u8; 32]);
        assert_eq!(config.relayer_authority, [2u8; 32]);
        assert_eq!(config.fee_bps, 25);
        assert_eq!(config.fee_recipient, [3u8; 32]);
    }

    #[test]
    fn test_sealed_note_roundtrip() {
        let note = SealedNote {
            value: 777,
            nullifier: Nullifier([4u8; 32]),
            secret: Secret([5u8; 32]),
            leaf_index: 12,
        };
        assert_eq!(SealedNote::unseal(&note.seal().unwrap()).unwrap(), note);
        assert!(SealedNote::unseal(&[1, 2, 3]).is_err());
    }
}
