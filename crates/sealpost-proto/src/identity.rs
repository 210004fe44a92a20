//! Hashed, temporally scoped identities.
//!
//! A principal (an email address, a phone number, an account handle) never
//! appears on the wire. Peers exchange a [`HashedIdentity`] instead: the
//! authority that vouches for the principal, the SHA-256 of the principal and
//! the temporal frame whose key material the sender used.
//!
//! # Canonical encoding
//!
//! ```text
//! [authority ordinal: 1][sha256(principal): 32][temporal frame: 8, big-endian]
//! ```
//!
//! The encoding is fixed at 41 bytes. It is what gets signed, hashed into the
//! body signature and used as the identity key by the identity-based schemes,
//! so it must stay bit-exact.
//!
//! # Equality
//!
//! Derived equality compares all three fields. [`HashedIdentity::equals_stable`]
//! ignores the frame and is used to match a recipient block written in any
//! epoch against one of our own identities.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::errors::{ProtocolError, Result};

/// Size of the principal digest.
pub const IDENTITY_HASH_SIZE: usize = 32;

/// Size of the canonical [`HashedIdentity`] encoding.
pub const HASHED_IDENTITY_SIZE: usize = 1 + IDENTITY_HASH_SIZE + 8;

/// The authority that vouches for a principal.
///
/// The discriminant is the wire ordinal and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Authority {
    /// Email address
    Email = 0,
    /// Phone number
    Phone = 1,
    /// OpenID URL
    OpenId = 2,
    /// Twitter handle
    Twitter = 3,
    /// Facebook account id
    Facebook = 4,
    /// Device-local identity, never addressable over the network
    Local = 5,
    /// Stanford university account
    Stanford = 6,
}

impl Authority {
    /// Every authority in ordinal order.
    pub const ALL: [Self; 7] = [
        Self::Email,
        Self::Phone,
        Self::OpenId,
        Self::Twitter,
        Self::Facebook,
        Self::Local,
        Self::Stanford,
    ];

    /// Wire ordinal.
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Authority for a wire ordinal. `None` for unknown ordinals.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }

    /// Whether messages may be addressed to this authority.
    ///
    /// Only [`Authority::Local`] is excluded.
    pub const fn is_network_addressable(self) -> bool {
        !matches!(self, Self::Local)
    }

    /// Short lowercase name, used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::OpenId => "openid",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Local => "local",
            Self::Stanford => "stanford",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute the temporal frame containing `unix_secs`.
///
/// Frames are consecutive windows of `period_secs` starting at the Unix epoch.
/// A zero period is treated as one second.
pub fn temporal_frame(unix_secs: u64, period_secs: u64) -> i64 {
    let frame = unix_secs / period_secs.max(1);
    i64::try_from(frame).unwrap_or(i64::MAX)
}

/// Identity with the temporal frame stripped.
///
/// Two hashed identities are stably equal iff their stable keys are equal.
/// Stores key long-lived records (identity rows, sequence counters) by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableKey {
    /// Vouching authority
    pub authority: Authority,
    /// SHA-256 of the principal
    pub hash: [u8; IDENTITY_HASH_SIZE],
}

/// Authority-tagged, time-scoped digest of a principal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashedIdentity {
    authority: Authority,
    hash: [u8; IDENTITY_HASH_SIZE],
    temporal_frame: i64,
}

impl HashedIdentity {
    /// Build from an already computed hash.
    ///
    /// The caller is trusted: nothing checks that `hash` really is the digest
    /// of some principal.
    pub const fn new(authority: Authority, hash: [u8; IDENTITY_HASH_SIZE], temporal_frame: i64) -> Self {
        Self { authority, hash, temporal_frame }
    }

    /// Hash `principal` and bind it to `temporal_frame`.
    pub fn from_principal(authority: Authority, principal: &str, temporal_frame: i64) -> Self {
        Self::new(authority, hash_principal(principal), temporal_frame)
    }

    /// Parse the canonical 41-byte encoding.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CorruptIdentity` if the length is wrong or the
    ///   authority ordinal is unknown
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HASHED_IDENTITY_SIZE {
            return Err(ProtocolError::CorruptIdentity {
                reason: format!("expected {HASHED_IDENTITY_SIZE} bytes, got {}", bytes.len()),
            });
        }

        let authority = Authority::from_ordinal(bytes[0]).ok_or_else(|| {
            ProtocolError::CorruptIdentity { reason: format!("unknown authority ordinal {}", bytes[0]) }
        })?;

        let mut hash = [0u8; IDENTITY_HASH_SIZE];
        hash.copy_from_slice(&bytes[1..=IDENTITY_HASH_SIZE]);

        let mut frame = [0u8; 8];
        frame.copy_from_slice(&bytes[1 + IDENTITY_HASH_SIZE..]);

        Ok(Self::new(authority, hash, i64::from_be_bytes(frame)))
    }

    /// Canonical 41-byte encoding.
    pub fn to_bytes(&self) -> [u8; HASHED_IDENTITY_SIZE] {
        let mut out = [0u8; HASHED_IDENTITY_SIZE];
        out[0] = self.authority.ordinal();
        out[1..=IDENTITY_HASH_SIZE].copy_from_slice(&self.hash);
        out[1 + IDENTITY_HASH_SIZE..].copy_from_slice(&self.temporal_frame.to_be_bytes());
        out
    }

    /// Vouching authority.
    pub const fn authority(&self) -> Authority {
        self.authority
    }

    /// SHA-256 of the principal.
    pub const fn hash(&self) -> &[u8; IDENTITY_HASH_SIZE] {
        &self.hash
    }

    /// Temporal frame of the key material.
    pub const fn temporal_frame(&self) -> i64 {
        self.temporal_frame
    }

    /// Same identity bound to another frame.
    #[must_use]
    pub const fn at(&self, temporal_frame: i64) -> Self {
        Self { temporal_frame, ..*self }
    }

    /// Equality ignoring the temporal frame.
    pub fn equals_stable(&self, other: &Self) -> bool {
        self.authority == other.authority && self.hash == other.hash
    }

    /// Frame-independent key for this identity.
    pub const fn stable_key(&self) -> StableKey {
        StableKey { authority: self.authority, hash: self.hash }
    }
}

impl fmt::Debug for HashedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashedIdentity({self})")
    }
}

impl fmt::Display for HashedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.authority, hex::encode(&self.hash[..4]), self.temporal_frame)
    }
}

/// A hashed identity whose principal we know.
///
/// Only a party that already knows the principal can build one, since the hash
/// is one-way. Used for our own personas and for contacts we addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    principal: String,
    hashed: HashedIdentity,
}

impl Identity {
    /// Hash `principal` under `authority` at `temporal_frame`.
    pub fn new(authority: Authority, principal: impl Into<String>, temporal_frame: i64) -> Self {
        let principal = principal.into();
        let hashed = HashedIdentity::from_principal(authority, &principal, temporal_frame);
        Self { principal, hashed }
    }

    /// Cleartext principal.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Hashed form, suitable for the wire.
    pub const fn hashed(&self) -> &HashedIdentity {
        &self.hashed
    }

    /// Vouching authority.
    pub const fn authority(&self) -> Authority {
        self.hashed.authority()
    }

    /// Temporal frame of the key material.
    pub const fn temporal_frame(&self) -> i64 {
        self.hashed.temporal_frame()
    }

    /// Same principal bound to another frame. The hash is not recomputed.
    #[must_use]
    pub fn at(&self, temporal_frame: i64) -> Self {
        Self { principal: self.principal.clone(), hashed: self.hashed.at(temporal_frame) }
    }
}

impl From<Identity> for HashedIdentity {
    fn from(identity: Identity) -> Self {
        identity.hashed
    }
}

impl From<&Identity> for HashedIdentity {
    fn from(identity: &Identity) -> Self {
        identity.hashed
    }
}

fn hash_principal(principal: &str) -> [u8; IDENTITY_HASH_SIZE] {
    Sha256::digest(principal.as_bytes()).into()
}
