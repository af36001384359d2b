//! Protocol constants.

/// Fixed mining difficulty: the target is `2^(256 - DIFFICULTY)`.
///
/// The spec carries no difficulty-adjustment algorithm (Non-goal), so this
/// never changes across the life of a chain.
pub const DIFFICULTY: u32 = 12;

/// Fixed reward paid to the sole output of every coinbase transaction.
pub const COINBASE_REWARD: u64 = 100;

/// Number of trailing bytes of a coinbase payload used for a caller-supplied
/// note vs. a random nonce. See [`crate::types::Transaction::coinbase`].
pub const COINBASE_NONCE_LEN: usize = 24;

/// Width, in bytes, of a RIPEMD-160 public-key hash.
pub const PUBKEY_HASH_LEN: usize = 20;

/// 12-byte zero-padded ASCII command field used to frame peer messages.
pub const COMMAND_LEN: usize = 12;
