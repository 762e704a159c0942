mod common;

use bitcoin::blockdata::script::ScriptBuf;
use common::{outpoint, Fixture, ALICE, BOB};
use tokenvault_common::color::{color_of, ColorIdentifier, TokenKind};
use tokenvault_common::error::ContractError;
use tokenvault_common::types::Receiver;
use tokenvault_core::{ReissuableTokenStore, Token, WalletAdapter};

const FIXTURE_PAYLOAD: &str = "c150ad685ec8638543b2356cb1071cf834fb1c84f5fa3a71699c3ed7167dfcdbb376a914234113b860822e68f9715d1957af28b8f5117ee288ac";

fn colored_total(tx: &bitcoin::Transaction, color: &ColorIdentifier) -> u64 {
    tx.output
        .iter()
        .filter(|o| color_of(&o.script_pubkey).as_ref() == Some(color))
        .map(|o| o.value)
        .sum()
}

/// Alice issues `amount` of a reissuable token and the ledger confirms it
fn issued(fixture: &Fixture, amount: u64) -> Token {
    let (token, _) = Token::issue(&fixture.ctx(), ALICE, TokenKind::Reissuable, amount, 1).unwrap();
    fixture.wallet.finalize_all();
    token
}

#[test]
fn test_payload_round_trip() {
    let payload = hex::decode(FIXTURE_PAYLOAD).unwrap();
    let token = Token::parse_from_payload(&payload).unwrap();

    assert_eq!(
        token.color_id().to_hex(),
        "c150ad685ec8638543b2356cb1071cf834fb1c84f5fa3a71699c3ed7167dfcdbb3"
    );
    assert_eq!(token.kind().unwrap(), TokenKind::Reissuable);
    assert_eq!(
        hex::encode(token.script_pubkey().unwrap().as_bytes()),
        "76a914234113b860822e68f9715d1957af28b8f5117ee288ac"
    );
    assert_eq!(token.to_payload().unwrap(), payload);
}

#[test]
fn test_payload_errors() {
    assert!(matches!(
        Token::parse_from_payload(&[0xc1; 10]),
        Err(ContractError::InvalidArgument(_))
    ));

    let token = Token::new(ColorIdentifier::nft(&outpoint(1, 0)), None);
    assert_eq!(
        token.to_payload().unwrap_err(),
        ContractError::invalid_argument("script_pubkey should not be empty")
    );

}

#[test]
fn test_color_only_payload_has_no_script() {
    let payload = hex::decode(&FIXTURE_PAYLOAD[..66]).unwrap();
    let token = Token::parse_from_payload(&payload).unwrap();

    assert_eq!(
        token.color_id().to_hex(),
        "c150ad685ec8638543b2356cb1071cf834fb1c84f5fa3a71699c3ed7167dfcdbb3"
    );
    let missing = ContractError::invalid_argument("script_pubkey should not be empty");
    assert_eq!(token.script_pubkey().unwrap_err(), missing);
    assert_eq!(token.to_payload().unwrap_err(), missing);
    assert_eq!(token, Token::new(token.color_id().clone(), None));
}

#[test]
fn test_issue_reissuable() {
    let fixture = Fixture::new();
    let (token, txs) =
        Token::issue(&fixture.ctx(), ALICE, TokenKind::Reissuable, 1_000, 1).unwrap();

    assert_eq!(txs.len(), 1);
    assert_eq!(token.kind().unwrap(), TokenKind::Reissuable);
    let script = token.script_pubkey().unwrap();
    assert_eq!(&ColorIdentifier::reissuable(script), token.color_id());
    assert_eq!(fixture.store.script_pubkey(token.color_id()).unwrap().as_ref(), Some(script));

    assert_eq!(colored_total(&txs[0], token.color_id()), 1_000);
    assert_eq!(token.amount(&fixture.ctx(), ALICE).unwrap(), 0, "Issuance is not finalized yet");
    fixture.wallet.finalize_all();
    assert_eq!(token.amount(&fixture.ctx(), ALICE).unwrap(), 1_000);
}

#[test]
fn test_issue_non_reissuable_with_split() {
    let fixture = Fixture::new();
    let (token, txs) =
        Token::issue(&fixture.ctx(), ALICE, TokenKind::NonReissuable, 1_000, 3).unwrap();

    let first_input = txs[0].input[0].previous_output;
    assert_eq!(token.color_id(), &ColorIdentifier::non_reissuable(&first_input));

    let amounts: Vec<u64> = txs[0]
        .output
        .iter()
        .filter(|o| color_of(&o.script_pubkey).is_some())
        .map(|o| o.value)
        .collect();
    assert_eq!(amounts, vec![334, 333, 333]);
    assert!(fixture.store.is_empty(), "Only reissuable tokens are recorded");
}

#[test]
fn test_issue_nft() {
    let fixture = Fixture::new();
    let (token, txs) = Token::issue(&fixture.ctx(), ALICE, TokenKind::Nft, 5, 1).unwrap();

    assert_eq!(token.kind().unwrap(), TokenKind::Nft);
    assert_eq!(colored_total(&txs[0], token.color_id()), 1, "An NFT is a single unit");
    assert_eq!(
        token.color_id(),
        &ColorIdentifier::nft(&txs[0].input[0].previous_output)
    );

    assert!(matches!(
        Token::issue(&fixture.ctx(), ALICE, TokenKind::Nft, 1, 2),
        Err(ContractError::InvalidSplit(_))
    ));
}

#[test]
fn test_issue_argument_errors() {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();

    assert!(matches!(
        Token::issue(&ctx, ALICE, TokenKind::Reissuable, 0, 1),
        Err(ContractError::InvalidAmount(_))
    ));
    assert!(matches!(
        Token::issue(&ctx, ALICE, TokenKind::Reissuable, 100, 0),
        Err(ContractError::InvalidSplit(_))
    ));
    assert_eq!(
        Token::issue(&ctx, ALICE, 0x99u8, 100, 1).unwrap_err(),
        ContractError::UnsupportedTokenType(0x99)
    );
    assert!(matches!(
        Token::issue(&ctx, BOB, TokenKind::Reissuable, 100, 1),
        Err(ContractError::InsufficientFunds { .. })
    ));
    assert!(fixture.wallet.broadcast_log().is_empty(), "Nothing is broadcast on failure");
}

#[test]
fn test_issue_with_raw_tag() {
    let fixture = Fixture::new();
    let (token, _) = Token::issue(&fixture.ctx(), ALICE, 0xc2u8, 10, 1).unwrap();
    assert_eq!(token.kind().unwrap(), TokenKind::NonReissuable);
}

#[test]
fn test_reissue_through_funding_transaction() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);

    let (reissued, txs) = token.reissue(&fixture.ctx(), ALICE, 500, 2).unwrap();
    assert_eq!(txs.len(), 2, "The issuing output was spent, so a funding transaction is needed");
    assert_eq!(reissued.color_id(), token.color_id());
    assert_eq!(colored_total(&txs[1], token.color_id()), 500);
    assert_eq!(colored_total(&txs[0], token.color_id()), 0);

    fixture.wallet.finalize_all();
    assert_eq!(token.amount(&fixture.ctx(), ALICE).unwrap(), 1_500);
}

#[test]
fn test_reissue_spends_output_at_token_script() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);
    fixture
        .wallet
        .add_utxo_at_script(ALICE, outpoint(7, 0), token.script_pubkey().unwrap().clone(), 5_000, true)
        .unwrap();

    let (_, txs) = token.reissue(&fixture.ctx(), ALICE, 250, 1).unwrap();
    assert_eq!(txs.len(), 1);
    assert!(txs[0]
        .input
        .iter()
        .any(|i| i.previous_output == outpoint(7, 0)));
}

#[test]
fn test_reissue_uses_recorded_script() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);

    // The store supplies the script when the token carries none
    let bare = Token::new(token.color_id().clone(), None);
    let (reissued, _) = bare.reissue(&fixture.ctx(), ALICE, 10, 1).unwrap();
    assert_eq!(reissued.script_pubkey().unwrap(), token.script_pubkey().unwrap());
}

#[test]
fn test_reissue_errors() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);
    let ctx = fixture.ctx();

    assert!(matches!(
        token.reissue(&ctx, ALICE, 0, 1),
        Err(ContractError::InvalidAmount(_))
    ));
    assert!(matches!(
        token.reissue(&ctx, BOB, 10, 1),
        Err(ContractError::UnknownScriptPubkey(_))
    ));

    let (nft, _) = Token::issue(&ctx, ALICE, TokenKind::Nft, 1, 1).unwrap();
    assert!(matches!(
        nft.reissue(&ctx, ALICE, 1, 1),
        Err(ContractError::InvalidTokenType(_))
    ));

    let unknown = Token::new(ColorIdentifier::reissuable(&ScriptBuf::from_bytes(vec![0x51])), None);
    assert!(matches!(
        unknown.reissue(&ctx, ALICE, 10, 1),
        Err(ContractError::UnknownScriptPubkey(_))
    ));
}

#[test]
fn test_transfer_conserves_supply() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);
    let bob_address = fixture.address(BOB);

    let (_, txs) = token.transfer(&fixture.ctx(), ALICE, &bob_address, 300).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(colored_total(&txs[0], token.color_id()), 1_000);

    fixture.wallet.finalize_all();
    assert_eq!(token.amount(&fixture.ctx(), ALICE).unwrap(), 700);
    assert_eq!(token.amount(&fixture.ctx(), BOB).unwrap(), 300);
}

#[test]
fn test_transfer_errors() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);
    let ctx = fixture.ctx();
    let bob_address = fixture.address(BOB);

    assert_eq!(
        token.transfer(&ctx, ALICE, &bob_address, 1_001).unwrap_err(),
        ContractError::InsufficientTokens {
            color_id: token.color_id().to_hex(),
            needed: 1_001,
            available: 1_000,
        }
    );
    assert!(matches!(
        token.transfer(&ctx, ALICE, &bob_address, 0),
        Err(ContractError::InvalidAmount(_))
    ));
    assert!(matches!(
        token.transfer(&ctx, ALICE, "not-an-address", 10),
        Err(ContractError::InvalidAddress(_))
    ));
    assert!(matches!(
        token.transfer(&ctx, ALICE, "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2", 10),
        Err(ContractError::InvalidAddress(_))
    ));
}

#[test]
fn test_transfer_without_uncolored_funds() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);
    token
        .transfer(&fixture.ctx(), ALICE, &fixture.address(BOB), 300)
        .unwrap();
    fixture.wallet.finalize_all();

    // Bob holds tokens but nothing to pay the fee with
    let alice_address = fixture.address(ALICE);
    assert!(matches!(
        token.transfer(&fixture.ctx(), BOB, &alice_address, 100),
        Err(ContractError::InsufficientFunds { .. })
    ));
}

#[test]
fn test_multi_transfer() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);
    let receivers = vec![
        Receiver::new(fixture.address(BOB), 100),
        Receiver::new(fixture.address(BOB), 200),
    ];

    let (_, txs) = token.multi_transfer(&fixture.ctx(), ALICE, &receivers).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].output[0].value, 100);
    assert_eq!(txs[0].output[1].value, 200);

    fixture.wallet.finalize_all();
    assert_eq!(token.amount(&fixture.ctx(), BOB).unwrap(), 300);
    assert_eq!(token.amount(&fixture.ctx(), ALICE).unwrap(), 700);

    assert!(matches!(
        token.multi_transfer(&fixture.ctx(), ALICE, &[]),
        Err(ContractError::InvalidAmount(_))
    ));
}

#[test]
fn test_burn() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 1_000);

    let txs = token.burn(&fixture.ctx(), ALICE, 400).unwrap();
    assert_eq!(colored_total(&txs[0], token.color_id()), 600);
    fixture.wallet.finalize_all();
    assert_eq!(token.amount(&fixture.ctx(), ALICE).unwrap(), 600);

    let txs = token.burn(&fixture.ctx(), ALICE, 600).unwrap();
    assert_eq!(colored_total(&txs[0], token.color_id()), 0);
    assert!(
        txs[0].output.iter().any(|o| color_of(&o.script_pubkey).is_none()),
        "A burn keeps an uncolored output"
    );
    fixture.wallet.finalize_all();
    assert_eq!(token.amount(&fixture.ctx(), ALICE).unwrap(), 0);

    assert!(matches!(
        token.burn(&fixture.ctx(), ALICE, 1),
        Err(ContractError::InsufficientTokens { .. })
    ));
}

#[test]
fn test_amount_respects_finalized_toggle() {
    let fixture = Fixture::new();
    let token = issued(&fixture, 200_000);
    let (_, _) = token.reissue(&fixture.ctx(), ALICE, 100_000, 1).unwrap();

    let strict = fixture.ctx();
    let relaxed = fixture.ctx().with_only_finalized(false);
    assert_eq!(token.amount(&strict, ALICE).unwrap(), 200_000);
    assert_eq!(token.amount(&relaxed, ALICE).unwrap(), 300_000);

    let balances = fixture.wallet.balances(ALICE, false).unwrap();
    assert_eq!(balances[&token.color_id().to_hex()], 300_000);
}

#[test]
fn test_single_large_utxo_issue_is_stable() {
    let fixture = Fixture::new();
    fixture.wallet.fund(BOB, 100_000_000).unwrap();
    let ctx = fixture.ctx();
    let planner = tokenvault_core::TransactionPlanner::new(&ctx);

    let (first, plan) = planner.issue(BOB, TokenKind::Reissuable, 1_000, 1).unwrap();
    let (second, _) = planner.issue(BOB, TokenKind::Reissuable, 1_000, 1).unwrap();
    assert_eq!(first.color_id(), second.color_id());
    assert!(fixture
        .wallet
        .owns_script(BOB, first.script_pubkey().unwrap())
        .unwrap());

    let txs = plan.execute(&fixture.wallet, None).unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].output[0].value, 1_000);
    assert_eq!(color_of(&txs[0].output[0].script_pubkey).as_ref(), Some(first.color_id()));
}

#[test]
fn test_reissue_and_burn_without_uncolored_funds() {
    let fixture = Fixture::new();
    let ctx = fixture.ctx();

    // Bob controls the token script but holds no uncolored coins
    let script = fixture.wallet.receive_script(BOB, None).unwrap();
    let bob_token = Token::new(ColorIdentifier::reissuable(&script), Some(script));
    assert!(matches!(
        bob_token.reissue(&ctx, BOB, 10, 1),
        Err(ContractError::InsufficientFunds { .. })
    ));

    // Bob holds tokens only
    let token = issued(&fixture, 1_000);
    token.transfer(&ctx, ALICE, &fixture.address(BOB), 300).unwrap();
    fixture.wallet.finalize_all();
    assert!(matches!(
        token.burn(&ctx, BOB, 100),
        Err(ContractError::InsufficientFunds { .. })
    ));
    assert_eq!(token.amount(&ctx, BOB).unwrap(), 300);
}
