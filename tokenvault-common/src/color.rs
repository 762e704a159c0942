//! Color identifiers and colored scripts
//!
//! A color identifier is a one-byte kind tag followed by a 32-byte SHA-256
//! payload. Reissuable colors hash the script the issuer controls, so every
//! reissue of the same script yields the same color. Non-reissuable and NFT
//! colors hash the outpoint consumed by the issuing transaction, which makes
//! them single-use.
//!
//! A colored output script prefixes an ordinary script with the color:
//!
//! ```text
//! 0x21 <33-byte color id> OP_COLOR <base script>
//! ```
//!
//! # Example
//!
//! ```
//! use tokenvault_common::color::{ColorIdentifier, TokenKind};
//! use bitcoin::blockdata::script::ScriptBuf;
//!
//! let script = ScriptBuf::from_bytes(vec![0x51]);
//! let color = ColorIdentifier::reissuable(&script);
//! assert_eq!(color.kind().unwrap(), TokenKind::Reissuable);
//! assert!(color.valid());
//! assert_eq!(ColorIdentifier::from_hex(&color.to_hex()).unwrap(), color);
//! ```

use bitcoin::blockdata::script::{Script, ScriptBuf};
use bitcoin::consensus::encode::serialize;
use bitcoin::OutPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{ContractError, ContractResult};

/// Length of a color payload in bytes
pub const COLOR_PAYLOAD_LEN: usize = 32;

/// Length of a color identifier (tag and payload) in bytes
pub const COLOR_ID_LEN: usize = 1 + COLOR_PAYLOAD_LEN;

/// The OP_COLOR opcode
pub const OP_COLOR: u8 = 0xbc;

/// Push opcode for the 33-byte color identifier
const COLOR_PUSH: u8 = COLOR_ID_LEN as u8;

/// Length of the colored prefix that precedes the base script
const COLORED_PREFIX_LEN: usize = 1 + COLOR_ID_LEN + 1;

/// The three kinds of colored tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Color derived from a script; can be issued again by its controller
    Reissuable,
    /// Color derived from a spent outpoint; issued exactly once
    NonReissuable,
    /// Non-reissuable color with a supply of one
    Nft,
}

impl TokenKind {
    /// Look up a kind from its one-byte tag
    pub fn from_tag(tag: u8) -> ContractResult<Self> {
        match tag {
            0xc1 => Ok(TokenKind::Reissuable),
            0xc2 => Ok(TokenKind::NonReissuable),
            0xc3 => Ok(TokenKind::Nft),
            other => Err(ContractError::UnsupportedTokenType(other)),
        }
    }

    /// The one-byte tag written in front of the color payload
    pub fn tag(self) -> u8 {
        match self {
            TokenKind::Reissuable => 0xc1,
            TokenKind::NonReissuable => 0xc2,
            TokenKind::Nft => 0xc3,
        }
    }
}

impl From<TokenKind> for u8 {
    fn from(kind: TokenKind) -> Self {
        kind.tag()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Reissuable => write!(f, "reissuable"),
            TokenKind::NonReissuable => write!(f, "non_reissuable"),
            TokenKind::Nft => write!(f, "nft"),
        }
    }
}

/// The value a color identifier is derived from
#[derive(Debug, Clone, Copy)]
pub enum ColorSource<'a> {
    /// A script controlled by the issuer
    Script(&'a Script),
    /// The outpoint consumed by the issuing transaction
    OutPoint(&'a OutPoint),
}

/// Deterministic tag identifying a colored token
///
/// The tag and payload are kept raw so that identifiers parsed from untrusted
/// bytes can be inspected with [`ColorIdentifier::valid`] instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorIdentifier {
    tag: u8,
    payload: Vec<u8>,
}

impl ColorIdentifier {
    /// Derive a color identifier of `kind` from `source`
    ///
    /// Reissuable colors require a script source, the other kinds an outpoint.
    pub fn derive(kind: TokenKind, source: ColorSource<'_>) -> ContractResult<Self> {
        match (kind, source) {
            (TokenKind::Reissuable, ColorSource::Script(script)) => Ok(Self::reissuable(script)),
            (TokenKind::NonReissuable, ColorSource::OutPoint(outpoint)) => {
                Ok(Self::non_reissuable(outpoint))
            }
            (TokenKind::Nft, ColorSource::OutPoint(outpoint)) => Ok(Self::nft(outpoint)),
            (kind, _) => Err(ContractError::invalid_argument(format!(
                "color of kind {} cannot be derived from this source",
                kind
            ))),
        }
    }

    /// Color controlled by `script`
    pub fn reissuable(script: &Script) -> Self {
        Self::from_digest(TokenKind::Reissuable, script.as_bytes())
    }

    /// Single-issue color bound to the consumed `outpoint`
    pub fn non_reissuable(outpoint: &OutPoint) -> Self {
        Self::from_digest(TokenKind::NonReissuable, &serialize(outpoint))
    }

    /// NFT color bound to the consumed `outpoint`
    pub fn nft(outpoint: &OutPoint) -> Self {
        Self::from_digest(TokenKind::Nft, &serialize(outpoint))
    }

    fn from_digest(kind: TokenKind, data: &[u8]) -> Self {
        Self {
            tag: kind.tag(),
            payload: Sha256::digest(data).to_vec(),
        }
    }

    /// Build an identifier from raw parts without validation
    pub fn from_parts(tag: u8, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    /// Parse the raw bytes of an identifier (tag followed by payload)
    pub fn parse_from_payload(bytes: &[u8]) -> ContractResult<Self> {
        match bytes.split_first() {
            Some((tag, payload)) => Ok(Self::from_parts(*tag, payload.to_vec())),
            None => Err(ContractError::invalid_argument("color identifier is empty")),
        }
    }

    /// Raw bytes of this identifier (tag followed by payload)
    pub fn to_payload(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.payload.len());
        bytes.push(self.tag);
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parse a hex-encoded identifier
    pub fn from_hex(s: &str) -> ContractResult<Self> {
        let bytes = hex::decode(s)?;
        Self::parse_from_payload(&bytes)
    }

    /// Hex encoding of [`ColorIdentifier::to_payload`]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_payload())
    }

    pub fn tag(&self) -> u8 {
        self.tag
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The token kind encoded in the tag
    pub fn kind(&self) -> ContractResult<TokenKind> {
        TokenKind::from_tag(self.tag)
    }

    /// True when the tag is recognized and the payload is 32 bytes
    pub fn valid(&self) -> bool {
        self.payload.len() == COLOR_PAYLOAD_LEN && TokenKind::from_tag(self.tag).is_ok()
    }
}

impl fmt::Display for ColorIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ColorIdentifier {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ColorIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ColorIdentifier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Prefix `base` with `color`, producing a colored script
pub fn colored_script(color: &ColorIdentifier, base: &Script) -> ScriptBuf {
    let mut bytes = Vec::with_capacity(COLORED_PREFIX_LEN + base.len());
    bytes.push(COLOR_PUSH);
    bytes.extend_from_slice(&color.to_payload());
    bytes.push(OP_COLOR);
    bytes.extend_from_slice(base.as_bytes());
    ScriptBuf::from_bytes(bytes)
}

/// Split a colored script into its color and base script
///
/// Returns `None` for uncolored scripts.
pub fn split_colored_script(script: &Script) -> Option<(ColorIdentifier, ScriptBuf)> {
    let bytes = script.as_bytes();
    if bytes.len() < COLORED_PREFIX_LEN
        || bytes[0] != COLOR_PUSH
        || bytes[COLORED_PREFIX_LEN - 1] != OP_COLOR
    {
        return None;
    }
    let color = ColorIdentifier::from_parts(bytes[1], bytes[2..1 + COLOR_ID_LEN].to_vec());
    let base = ScriptBuf::from_bytes(bytes[COLORED_PREFIX_LEN..].to_vec());
    Some((color, base))
}

/// The color carried by a script, if any
pub fn color_of(script: &Script) -> Option<ColorIdentifier> {
    split_colored_script(script).map(|(color, _)| color)
}

/// The script with any color prefix removed
pub fn uncolored_script(script: &Script) -> ScriptBuf {
    split_colored_script(script)
        .map(|(_, base)| base)
        .unwrap_or_else(|| script.to_owned())
}
