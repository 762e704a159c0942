use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::{OutPoint, Txid};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use std::str::FromStr;
use tokenvault_common::color::{
    color_of, colored_script, split_colored_script, uncolored_script, ColorIdentifier,
    ColorSource, TokenKind, OP_COLOR,
};
use tokenvault_common::error::ContractError;

const FIXTURE_COLOR: &str = "c150ad685ec8638543b2356cb1071cf834fb1c84f5fa3a71699c3ed7167dfcdbb3";
const FIXTURE_SCRIPT: &str = "76a914234113b860822e68f9715d1957af28b8f5117ee288ac";

fn p2pkh() -> ScriptBuf {
    ScriptBuf::from_bytes(hex::decode(FIXTURE_SCRIPT).unwrap())
}

fn outpoint(vout: u32) -> OutPoint {
    OutPoint::new(
        Txid::from_str("1111111111111111111111111111111111111111111111111111111111111111").unwrap(),
        vout,
    )
}

#[test]
fn test_token_kind_tags() {
    assert_eq!(TokenKind::from_tag(0xc1).unwrap(), TokenKind::Reissuable);
    assert_eq!(TokenKind::from_tag(0xc2).unwrap(), TokenKind::NonReissuable);
    assert_eq!(TokenKind::from_tag(0xc3).unwrap(), TokenKind::Nft);
    assert_eq!(u8::from(TokenKind::Nft), 0xc3);
    assert_eq!(
        TokenKind::from_tag(0x99).unwrap_err(),
        ContractError::UnsupportedTokenType(0x99)
    );
}

#[test]
fn test_reissuable_color_is_script_hash() {
    let color = ColorIdentifier::reissuable(&p2pkh());
    assert_eq!(color.tag(), 0xc1);
    assert_eq!(color.payload().len(), 32);
    assert!(color.valid());

    // Same script, same color
    assert_eq!(ColorIdentifier::reissuable(&p2pkh()), color);

    let other = ScriptBuf::from_bytes(vec![0x51]);
    assert_ne!(ColorIdentifier::reissuable(&other), color);
}

#[test]
fn test_outpoint_colors_depend_on_kind_and_outpoint() {
    let non_reissuable = ColorIdentifier::non_reissuable(&outpoint(0));
    let nft = ColorIdentifier::nft(&outpoint(0));

    assert_eq!(non_reissuable.kind().unwrap(), TokenKind::NonReissuable);
    assert_eq!(nft.kind().unwrap(), TokenKind::Nft);
    // Same hash, different tag
    assert_eq!(non_reissuable.payload(), nft.payload());
    assert_ne!(non_reissuable, nft);

    assert_ne!(ColorIdentifier::non_reissuable(&outpoint(1)), non_reissuable);
}

#[test]
fn test_derive_checks_source() {
    let script = p2pkh();
    let point = outpoint(0);

    assert_eq!(
        ColorIdentifier::derive(TokenKind::Reissuable, ColorSource::Script(&script)).unwrap(),
        ColorIdentifier::reissuable(&script)
    );
    assert_eq!(
        ColorIdentifier::derive(TokenKind::Nft, ColorSource::OutPoint(&point)).unwrap(),
        ColorIdentifier::nft(&point)
    );
    assert!(matches!(
        ColorIdentifier::derive(TokenKind::Reissuable, ColorSource::OutPoint(&point)),
        Err(ContractError::InvalidArgument(_))
    ));
    assert!(matches!(
        ColorIdentifier::derive(TokenKind::NonReissuable, ColorSource::Script(&script)),
        Err(ContractError::InvalidArgument(_))
    ));
}

#[test]
fn test_fixture_color_hex() {
    let color = ColorIdentifier::from_hex(FIXTURE_COLOR).unwrap();
    assert!(color.valid());
    assert_eq!(color.kind().unwrap(), TokenKind::Reissuable);
    assert_eq!(color.to_hex(), FIXTURE_COLOR);
    assert_eq!(color.to_string(), FIXTURE_COLOR);
    assert_eq!(ColorIdentifier::from_str(FIXTURE_COLOR).unwrap(), color);
}

#[test]
fn test_valid_is_false_for_malformed_identifiers() {
    let unknown_tag = ColorIdentifier::from_parts(0x99, vec![0u8; 32]);
    assert!(!unknown_tag.valid());
    assert_eq!(
        unknown_tag.kind().unwrap_err(),
        ContractError::UnsupportedTokenType(0x99)
    );

    let short = ColorIdentifier::from_parts(0xc1, vec![0u8; 31]);
    assert!(!short.valid());

    let long = ColorIdentifier::from_parts(0xc2, vec![0u8; 33]);
    assert!(!long.valid());
}

#[test]
fn test_from_hex_rejects_garbage() {
    assert!(matches!(
        ColorIdentifier::from_hex("zz"),
        Err(ContractError::InvalidArgument(_))
    ));
    assert!(matches!(
        ColorIdentifier::from_hex(""),
        Err(ContractError::InvalidArgument(_))
    ));
}

#[test]
fn test_serde_uses_hex() {
    let color = ColorIdentifier::from_hex(FIXTURE_COLOR).unwrap();
    let json = serde_json::to_string(&color).unwrap();
    assert_eq!(json, format!("\"{}\"", FIXTURE_COLOR));
    let back: ColorIdentifier = serde_json::from_str(&json).unwrap();
    assert_eq!(back, color);
}

#[test]
fn test_colored_script_layout() {
    let color = ColorIdentifier::from_hex(FIXTURE_COLOR).unwrap();
    let script = colored_script(&color, &p2pkh());
    let bytes = script.as_bytes();

    assert_eq!(bytes.len(), 1 + 33 + 1 + 25);
    assert_eq!(bytes[0], 0x21);
    assert_eq!(&bytes[1..34], color.to_payload().as_slice());
    assert_eq!(bytes[34], OP_COLOR);
    assert_eq!(&bytes[35..], p2pkh().as_bytes());

    let (parsed, base) = split_colored_script(&script).unwrap();
    assert_eq!(parsed, color);
    assert_eq!(base, p2pkh());
    assert_eq!(color_of(&script), Some(color));
    assert_eq!(uncolored_script(&script), p2pkh());
}

#[test]
fn test_uncolored_script_is_left_alone() {
    assert!(split_colored_script(&p2pkh()).is_none());
    assert_eq!(color_of(&p2pkh()), None);
    assert_eq!(uncolored_script(&p2pkh()), p2pkh());
    assert!(color_of(&ScriptBuf::new()).is_none());
}

#[derive(Clone, Debug)]
struct Payload([u8; 32], TokenKind);

impl Arbitrary for Payload {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut bytes = [0u8; 32];
        for b in bytes.iter_mut() {
            *b = u8::arbitrary(g);
        }
        let kind = *g
            .choose(&[TokenKind::Reissuable, TokenKind::NonReissuable, TokenKind::Nft])
            .unwrap();
        Payload(bytes, kind)
    }
}

#[quickcheck]
fn hex_encoding_reconstructs_identifier(payload: Payload) -> bool {
    let color = ColorIdentifier::from_parts(payload.1.tag(), payload.0.to_vec());
    let parsed = ColorIdentifier::from_hex(&color.to_hex()).unwrap();
    parsed == color && parsed.valid() && parsed.kind().unwrap() == payload.1
}

#[quickcheck]
fn colored_script_always_splits_back(payload: Payload, base: Vec<u8>) -> bool {
    let color = ColorIdentifier::from_parts(payload.1.tag(), payload.0.to_vec());
    let base = ScriptBuf::from_bytes(base);
    match split_colored_script(&colored_script(&color, &base)) {
        Some((c, b)) => c == color && b == base,
        None => false,
    }
}
