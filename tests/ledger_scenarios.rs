use cardwars::access::Role;
use cardwars::battle::{BattleEvent, WinnerPolicy};
use cardwars::config::LedgerConfig;
use cardwars::ledger::LedgerEvent;
use cardwars::runtime::{Call, Receipt, Runtime};
use cardwars::{Address, LedgerError};

const OWNER: Address = Address::new([0x01; 20]);
const RESOLVER: Address = Address::new([0xbb; 20]);
const ALICE: Address = Address::new([0xa1; 20]);
const BOB: Address = Address::new([0xb0; 20]);

fn deploy() -> Runtime {
    deploy_with(LedgerConfig::default())
}

fn deploy_with(config: LedgerConfig) -> Runtime {
    let rt = Runtime::deploy(&config, OWNER, RESOLVER, WinnerPolicy::ScoreWeighted, Some(99))
        .unwrap();
    for account in [OWNER, ALICE, BOB] {
        rt.fund(account, 1_000_000 * rt.mint_price()).unwrap();
    }
    rt
}

fn mint(rt: &Runtime, caller: Address) -> u64 {
    match rt
        .execute(caller, Call::Mint { payment: rt.mint_price() })
        .unwrap()
    {
        Receipt::Minted { id } => id,
        other => panic!("unexpected receipt {other:?}"),
    }
}

#[test]
fn mints_a_single_card() {
    let rt = deploy();
    assert_eq!(mint(&rt, OWNER), 0);
    assert_eq!(rt.balance_of(&OWNER, 0), 1);
    assert_eq!(rt.total_supply(), 1);
    assert_eq!(
        rt.ledger_events().last(),
        Some(&LedgerEvent::Minted { id: 0, minter: OWNER })
    );
}

#[test]
fn mints_a_batch_of_one_hundred() {
    let rt = deploy();
    let price = rt.mint_price();
    let receipt = rt
        .execute(OWNER, Call::MintBatch { count: 100, payment: 100 * price })
        .unwrap();
    assert_eq!(receipt, Receipt::BatchMinted { first_id: 0, last_id: 99 });
    for id in 0..100 {
        assert_eq!(rt.balance_of(&OWNER, id), 1);
    }
    assert_eq!(rt.total_supply(), 100);
    assert_eq!(
        rt.ledger_events().last(),
        Some(&LedgerEvent::BatchMinted { first_id: 0, last_id: 99, minter: OWNER })
    );
}

#[test]
fn supply_cap_holds_for_single_and_batch_mints() {
    let rt = deploy_with(LedgerConfig {
        max_supply: 50,
        ..LedgerConfig::default()
    });
    let price = rt.mint_price();
    let cap = rt.max_supply();

    let err = rt
        .execute(OWNER, Call::MintBatch { count: cap + 1, payment: (cap as u128 + 1) * price })
        .unwrap_err();
    assert!(matches!(err, LedgerError::SupplyExceeded { .. }));
    assert_eq!(rt.total_supply(), 0);

    rt.execute(OWNER, Call::MintBatch { count: cap, payment: cap as u128 * price })
        .unwrap();
    let err = rt.execute(OWNER, Call::Mint { payment: price }).unwrap_err();
    assert!(matches!(err, LedgerError::SupplyExceeded { .. }));
    assert_eq!(rt.total_supply(), cap);
}

#[test]
fn underpayment_is_rejected() {
    let rt = deploy();
    let price = rt.mint_price();
    assert!(matches!(
        rt.execute(OWNER, Call::Mint { payment: price - 1 }),
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert!(matches!(
        rt.execute(OWNER, Call::MintBatch { count: 100, payment: 100 * price - 1 }),
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert_eq!(
        rt.execute(OWNER, Call::MintBatch { count: 0, payment: 0 }),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(rt.total_supply(), 0);
    assert_eq!(rt.accumulated_funds(), 0);
}

#[test]
fn burn_is_limited_to_admins_and_friends() {
    let rt = deploy();
    mint(&rt, OWNER);
    rt.execute(OWNER, Call::Burn { owner: OWNER, id: 0 }).unwrap();
    assert_eq!(rt.balance_of(&OWNER, 0), 0);
    assert_eq!(rt.total_supply(), 0);

    rt.execute(OWNER, Call::GrantRole { role: Role::Friend, principal: ALICE })
        .unwrap();
    let alice_card = mint(&rt, ALICE);
    rt.execute(ALICE, Call::Burn { owner: ALICE, id: alice_card })
        .unwrap();

    let bob_card = mint(&rt, BOB);
    assert!(matches!(
        rt.execute(BOB, Call::Burn { owner: BOB, id: bob_card }),
        Err(LedgerError::Unauthorized { .. })
    ));
    assert_eq!(rt.balance_of(&BOB, bob_card), 1);
}

#[test]
fn burn_edge_cases() {
    let rt = deploy();
    assert_eq!(
        rt.execute(OWNER, Call::Burn { owner: OWNER, id: 0 }),
        Err(LedgerError::NothingToBurn)
    );
    mint(&rt, OWNER);
    assert_eq!(
        rt.execute(OWNER, Call::Burn { owner: Address::ZERO, id: 0 }),
        Err(LedgerError::ZeroAddress)
    );
    rt.execute(OWNER, Call::Burn { owner: OWNER, id: 0 }).unwrap();
    assert_eq!(
        rt.execute(OWNER, Call::Burn { owner: OWNER, id: 0 }),
        Err(LedgerError::NothingToBurn)
    );
}

#[test]
fn withdraw_pays_the_admin_once() {
    let rt = deploy();
    let price = rt.mint_price();
    mint(&rt, ALICE);
    let before = rt.native_balance(&OWNER);

    assert_eq!(
        rt.execute(ALICE, Call::Withdraw),
        Err(LedgerError::Unauthorized {
            caller: ALICE,
            action: "withdraw funds"
        })
    );
    assert_eq!(rt.execute(OWNER, Call::Withdraw).unwrap(), Receipt::Withdrawn { amount: price });
    assert_eq!(rt.native_balance(&OWNER) - before, price);
    assert_eq!(rt.accumulated_funds(), 0);
    assert_eq!(
        rt.ledger_events().last(),
        Some(&LedgerEvent::Withdrawn { amount: price, receiver: OWNER })
    );
    assert_eq!(rt.execute(OWNER, Call::Withdraw), Err(LedgerError::NothingToWithdraw));
}

#[test]
fn withdraw_to_refusing_admin_keeps_funds() {
    let rt = deploy();
    mint(&rt, ALICE);
    let funds = rt.accumulated_funds();
    rt.refuse_payments(OWNER);
    assert!(matches!(
        rt.execute(OWNER, Call::Withdraw),
        Err(LedgerError::TransferFailed { .. })
    ));
    assert_eq!(rt.accumulated_funds(), funds);
}

#[test]
fn only_admin_sets_the_price() {
    let rt = deploy();
    let new_price = 25_000_000_000_000_000;
    rt.execute(OWNER, Call::SetMintPrice { tier: 0, price: new_price })
        .unwrap();
    assert_eq!(rt.mint_price(), new_price);
    assert!(matches!(
        rt.execute(ALICE, Call::SetMintPrice { tier: 0, price: 1 }),
        Err(LedgerError::Unauthorized { .. })
    ));
    assert_eq!(rt.mint_price(), new_price);
}

#[test]
fn score_setters() {
    let rt = deploy();
    rt.execute(OWNER, Call::SetScore { id: 0, value: 50 }).unwrap();
    assert_eq!(rt.score(0), 50);

    rt.execute(OWNER, Call::GrantRole { role: Role::Friend, principal: ALICE })
        .unwrap();
    rt.execute(ALICE, Call::SetScore { id: 0, value: 51 }).unwrap();
    assert_eq!(rt.score(0), 51);

    assert!(matches!(
        rt.execute(BOB, Call::SetScore { id: 0, value: 52 }),
        Err(LedgerError::Unauthorized { .. })
    ));
    assert_eq!(rt.score(0), 51);
}

#[test]
fn uri_and_supply_queries() {
    let rt = deploy();
    let base = LedgerConfig::default().base_uri;
    assert_eq!(rt.uri(0), format!("{base}0.json"));
    mint(&rt, OWNER);
    assert_eq!(rt.total_supply(), 1);
}

#[test]
fn battle_scores_the_winner() {
    let rt = deploy();
    let first = mint(&rt, OWNER);
    let second = mint(&rt, OWNER);

    let receipt = rt
        .execute(OWNER, Call::Battle { first_id: first, second_id: second })
        .unwrap();
    let Receipt::BattleCompleted { winner_id, loser_id, winner_score } = receipt else {
        panic!("unexpected receipt {receipt:?}");
    };
    assert!([first, second].contains(&winner_id));
    assert_eq!(winner_score, 1);
    assert_eq!(rt.score(winner_id), 1);
    assert_eq!(rt.score(loser_id), 0);
    assert_eq!(rt.total_supply(), 1);

    let events = rt.battle_events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        BattleEvent::BattleCompleted {
            first_id: first,
            second_id: second,
            winner_id,
            caller: OWNER,
        }
    );
}

#[test]
fn battle_requires_ownership_of_both_cards() {
    let rt = deploy();
    let first = mint(&rt, OWNER);
    let second = mint(&rt, ALICE);
    let before = rt.snapshot();

    assert_eq!(
        rt.execute(OWNER, Call::Battle { first_id: first, second_id: second }),
        Err(LedgerError::NotOwner { owner: OWNER, id: second })
    );
    assert_eq!(rt.snapshot(), before);
    assert!(rt.battle_events().is_empty());
}

#[test]
fn revoked_resolver_cannot_battle() {
    let rt = deploy();
    let first = mint(&rt, OWNER);
    let second = mint(&rt, OWNER);
    rt.execute(OWNER, Call::RevokeRole { role: Role::Friend, principal: RESOLVER })
        .unwrap();

    assert!(matches!(
        rt.execute(OWNER, Call::Battle { first_id: first, second_id: second }),
        Err(LedgerError::Unauthorized { caller, .. }) if caller == RESOLVER
    ));
    assert_eq!(rt.total_supply(), 2);
}
