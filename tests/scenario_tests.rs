//! End-to-end scenarios against the full stack: vault, order book, delayed
//! request market, and the oracle feed. Each test scripts one user journey
//! and pins the externally observable outcome, including error strings.

use primitive_types::U256;
use vault_core::*;

const DOLLAR: TokenId = TokenId(0);
const BNB: TokenId = TokenId(1);

const OWNER: AccountId = AccountId(0);
const ROUTER: CallerId = CallerId(1);
const ORDER_BOOK: CallerId = CallerId(2);
const MARKET: CallerId = CallerId(3);

fn usd(v: u64) -> Usd {
    U256::from(v) * U256::exp10(6)
}

fn price18(v: u64) -> Price {
    U256::from(v) * U256::exp10(18)
}

fn feed_answer(dollars: u64) -> i128 {
    dollars as i128 * 100_000_000
}

fn setup(bnb_price: u64) -> (Vault, OrderBook, Market) {
    let mut feed = PriceFeed::new();
    feed.config_token(DOLLAR, 8, 6);
    feed.config_token(BNB, 8, 18);
    feed.push_round(DOLLAR, feed_answer(1), 0).unwrap();
    feed.push_round(BNB, feed_answer(bnb_price), 0).unwrap();

    let mut vault = Vault::new(
        OWNER,
        DOLLAR,
        VaultParams::default(),
        feed,
        TokenLedger::new("USD", 6),
        TokenLedger::new("USDG", 18),
    );
    vault.set_whitelisted_token(OWNER, BNB, true).unwrap();
    vault.set_plugin(OWNER, ROUTER, true).unwrap();
    vault.set_plugin(OWNER, ORDER_BOOK, true).unwrap();
    vault.set_plugin(OWNER, MARKET, true).unwrap();

    (vault, OrderBook::new(ORDER_BOOK), Market::new(MARKET))
}

fn mint_dollars(vault: &mut Vault, account: AccountId, amount: Usd) {
    vault.dollar_mut().mint(Holder::Account(account), amount);
}

fn set_bnb_price(vault: &mut Vault, dollars: u64) {
    let now = vault.time().as_secs();
    for _ in 0..3 {
        vault
            .price_feed_mut()
            .push_round(BNB, feed_answer(dollars), now)
            .unwrap();
    }
}

fn open_long(vault: &mut Vault, account: AccountId, amount_in: Usd, size_delta: Usd) {
    vault
        .dollar_mut()
        .transfer(Holder::Account(account), Holder::Plugin(ROUTER), amount_in)
        .unwrap();
    vault
        .increase_position(ROUTER, account, BNB, amount_in, size_delta, Side::Long)
        .unwrap();
}

#[test]
fn untriggered_limit_increase_is_rejected() {
    let (mut vault, mut book, _) = setup(300);
    let user = AccountId(1);
    mint_dollars(&mut vault, user, usd(600));

    vault.buy_usdg(user, usd(400)).unwrap();
    assert_eq!(
        vault.usdg().balance_of(Holder::Account(user)),
        U256::from(400u64) * U256::exp10(18)
    );

    let index = book
        .create_increase_order(
            &mut vault,
            user,
            BNB,
            usd(200),
            usd(400),
            Side::Long,
            price18(180),
            false,
        )
        .unwrap();
    assert_eq!(index, 1);

    // feed reports 300, the order waits for a dip to 180
    let err = book
        .execute_increase_order(&mut vault, user, index)
        .unwrap_err();
    assert_eq!(err.to_string(), "OrderBook: invalid price for execution");

    // nothing was consumed
    assert!(book.increase_order(user, index).is_some());
    assert!(vault.position(&vault.position_key(user, BNB, Side::Long)).is_none());
}

#[test]
fn limit_increase_executes_after_price_moves() {
    let (mut vault, mut book, _) = setup(300);
    let user = AccountId(1);
    mint_dollars(&mut vault, user, usd(600));
    vault.buy_usdg(user, usd(400)).unwrap();

    let index = book
        .create_increase_order(
            &mut vault,
            user,
            BNB,
            usd(200),
            usd(400),
            Side::Long,
            price18(180),
            false,
        )
        .unwrap();

    set_bnb_price(&mut vault, 180);
    book.execute_increase_order(&mut vault, user, index).unwrap();

    // the order is gone and the position exists at the new mark
    assert!(book.increase_order(user, index).is_none());
    let position = vault
        .position(&vault.position_key(user, BNB, Side::Long))
        .unwrap();
    assert_eq!(position.size, usd(400));
    assert_eq!(position.entry_price, price18(180));

    let executed = book
        .events()
        .iter()
        .any(|e| matches!(e.payload, EventPayload::ExecuteIncreaseOrder(_)));
    assert!(executed, "ExecuteIncreaseOrder must be emitted");
}

#[test]
fn cancelling_a_nonexistent_order_fails() {
    let (mut vault, mut book, _) = setup(300);
    let user = AccountId(1);
    mint_dollars(&mut vault, user, usd(600));

    book.create_increase_order(
        &mut vault,
        user,
        BNB,
        usd(100),
        usd(200),
        Side::Long,
        price18(180),
        false,
    )
    .unwrap();

    let err = book.cancel_increase_order(&mut vault, user, 2).unwrap_err();
    assert_eq!(err.to_string(), "OrderBook: non-existent order");

    // index 1 still cancels cleanly and refunds the escrow
    book.cancel_increase_order(&mut vault, user, 1).unwrap();
    assert_eq!(vault.dollar().balance_of(Holder::Account(user)), usd(600));
}

#[test]
fn market_request_expires_after_max_time_delay() {
    let (mut vault, _, mut market) = setup(300);
    let lp = AccountId(1);
    let user = AccountId(2);
    mint_dollars(&mut vault, lp, usd(5_000));
    mint_dollars(&mut vault, user, usd(500));
    vault.buy_usdg(lp, usd(5_000)).unwrap();

    market.set_max_time_delay(&vault, 300);
    let key = market
        .create_increase_position(&mut vault, user, BNB, usd(200), usd(400), Side::Long)
        .unwrap();

    vault.advance_time(600);
    let err = market
        .execute_increase_position(&mut vault, &key)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Market::executeIncreasePosition Request has expired"
    );

    // expired requests still cancel with a refund
    assert!(market.cancel_increase_position(&mut vault, &key).unwrap());
    assert_eq!(vault.dollar().balance_of(Holder::Account(user)), usd(500));

    // executing the now-deleted request is a silent no-op
    assert!(!market.execute_increase_position(&mut vault, &key).unwrap());
}

#[test]
fn collapsed_price_liquidates_the_long() {
    let (mut vault, _, _) = setup(200);
    let lp = AccountId(1);
    let user = AccountId(2);
    mint_dollars(&mut vault, lp, usd(5_000));
    mint_dollars(&mut vault, user, usd(100));
    vault.buy_usdg(lp, usd(5_000)).unwrap();

    // 10x long at mark 200, the user commits everything they have
    open_long(&mut vault, user, usd(100), usd(1_000));
    let key = vault.position_key(user, BNB, Side::Long);

    set_bnb_price(&mut vault, 100);
    assert!(vault.can_liquidate(&key).unwrap());
    assert_eq!(
        vault.liquidation_state(&key).unwrap(),
        LiquidationState::LossesExceedCollateral
    );

    vault.liquidate_position(user, BNB, Side::Long).unwrap();

    // collateral is retained: the account ends with nothing
    assert_eq!(
        vault.dollar().balance_of(Holder::Account(user)),
        U256::zero()
    );
    assert!(vault.position(&key).is_none());
    assert_eq!(vault.reserved_amount(), U256::zero());
}

#[test]
fn take_profit_decrease_order_round_trip() {
    let (mut vault, mut book, _) = setup(300);
    let lp = AccountId(1);
    let user = AccountId(2);
    mint_dollars(&mut vault, lp, usd(20_000));
    mint_dollars(&mut vault, user, usd(1_000));
    vault.buy_usdg(lp, usd(20_000)).unwrap();
    open_long(&mut vault, user, usd(1_000), usd(3_000));

    // take profit on a third of the position once the mark clears 330
    let index = book
        .create_decrease_order(
            &mut vault,
            user,
            BNB,
            usd(1_000),
            U256::zero(),
            Side::Long,
            price18(330),
            true,
        )
        .unwrap();

    // closing a long validates against the conservative min price, still 300
    let err = book
        .execute_decrease_order(&mut vault, user, index)
        .unwrap_err();
    assert_eq!(err.to_string(), "OrderBook: invalid price for execution");

    set_bnb_price(&mut vault, 340);
    book.execute_decrease_order(&mut vault, user, index).unwrap();
    assert!(book.decrease_order(user, index).is_none());

    let position = vault
        .position(&vault.position_key(user, BNB, Side::Long))
        .unwrap();
    assert_eq!(position.size, usd(2_000));
    // a third of the 40/300 move was realised
    assert!(!position.realised_pnl.negative);
    assert!(position.realised_pnl.magnitude > U256::zero());
}

#[test]
fn orders_update_in_place_but_escrow_is_immutable() {
    let (mut vault, mut book, _) = setup(300);
    let user = AccountId(1);
    mint_dollars(&mut vault, user, usd(500));

    let index = book
        .create_increase_order(
            &mut vault,
            user,
            BNB,
            usd(200),
            usd(400),
            Side::Long,
            price18(180),
            false,
        )
        .unwrap();

    book.update_increase_order(&mut vault, user, index, usd(600), price18(250), false)
        .unwrap();
    let order = book.increase_order(user, index).unwrap();
    assert_eq!(order.size_delta, usd(600));
    assert_eq!(order.trigger_price, price18(250));
    assert_eq!(order.amount, usd(200), "escrow must be untouched");

    // a stranger's update lands on their own (empty) order space
    let err = book
        .update_increase_order(&mut vault, AccountId(9), index, usd(1), price18(1), true)
        .unwrap_err();
    assert_eq!(err.to_string(), "OrderBook: non-existent order");
}

#[test]
fn delayed_decrease_request_executes() {
    let (mut vault, _, mut market) = setup(300);
    let lp = AccountId(1);
    let user = AccountId(2);
    mint_dollars(&mut vault, lp, usd(20_000));
    mint_dollars(&mut vault, user, usd(1_000));
    vault.buy_usdg(lp, usd(20_000)).unwrap();
    open_long(&mut vault, user, usd(1_000), usd(2_000));

    let key = market
        .create_decrease_position(&mut vault, user, BNB, U256::zero(), usd(2_000), Side::Long)
        .unwrap();
    vault.advance_time(60);
    assert!(market.execute_decrease_position(&mut vault, &key).unwrap());

    // full close: the user got their collateral back minus both fee legs
    assert!(vault
        .position(&vault.position_key(user, BNB, Side::Long))
        .is_none());
    let fee_legs = U256::from(2_000_000u64) * U256::from(2u64);
    assert_eq!(
        vault.dollar().balance_of(Holder::Account(user)),
        usd(1_000) - fee_legs
    );

    // expired decrease requests report their own entry point
    let stale = market
        .create_decrease_position(&mut vault, user, BNB, U256::zero(), usd(1), Side::Long)
        .unwrap();
    vault.advance_time(600);
    let err = market
        .execute_decrease_position(&mut vault, &stale)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Market::executeDecreasePosition Request has expired"
    );
}

#[test]
fn small_profits_inside_the_min_profit_window_are_clamped() {
    let (mut vault, _, _) = setup(300);
    let mut params = VaultParams::default().with_min_profit(BNB, 10_000); // 1%
    params.min_profit_time = 3_600;
    vault.set_params(OWNER, params).unwrap();

    let lp = AccountId(1);
    let user = AccountId(2);
    mint_dollars(&mut vault, lp, usd(10_000));
    mint_dollars(&mut vault, user, usd(500));
    vault.buy_usdg(lp, usd(10_000)).unwrap();
    open_long(&mut vault, user, usd(500), usd(1_000));

    set_bnb_price(&mut vault, 301); // a 0.33% blip
    let key = vault.position_key(user, BNB, Side::Long);
    let position = vault.position(&key).unwrap().clone();

    let (has_profit, delta) = vault
        .get_delta(
            BNB,
            position.size,
            position.entry_price,
            Side::Long,
            position.last_increased_time,
        )
        .unwrap();
    assert!(has_profit);
    assert_eq!(delta, U256::zero(), "blip inside the window is worth nothing");

    vault.advance_time(3_601);
    let (_, delta) = vault
        .get_delta(
            BNB,
            position.size,
            position.entry_price,
            Side::Long,
            position.last_increased_time,
        )
        .unwrap();
    assert_eq!(delta, U256::from(3_333_333u64));
}

#[test]
fn profitable_position_cannot_be_liquidated() {
    let (mut vault, _, _) = setup(200);
    let lp = AccountId(1);
    let user = AccountId(2);
    mint_dollars(&mut vault, lp, usd(5_000));
    mint_dollars(&mut vault, user, usd(100));
    vault.buy_usdg(lp, usd(5_000)).unwrap();

    open_long(&mut vault, user, usd(100), usd(1_000));
    let key = vault.position_key(user, BNB, Side::Long);

    set_bnb_price(&mut vault, 220);
    assert!(!vault.can_liquidate(&key).unwrap());

    let err = vault
        .liquidate_position(user, BNB, Side::Long)
        .unwrap_err();
    assert_eq!(err.to_string(), "Vault: position cannot be liquidated");
    assert!(vault.position(&key).is_some());
}
