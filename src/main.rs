//! Settlement Engine Simulation.
//!
//! Walks the full lifecycle of the vault: liquidity onboarding, plugin
//! mediated positions, conditional orders, delayed market requests, funding
//! accrual, and a liquidation when the price collapses.

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

fn feed_answer(dollars: u64) -> i128 {
    dollars as i128 * 100_000_000 // 8 feed decimals
}

fn setup() -> (Vault, OrderBook, Market) {
    let mut feed = PriceFeed::new();
    feed.config_token(DOLLAR, 8, 6);
    feed.config_token(BNB, 8, 18);
    feed.push_round(DOLLAR, feed_answer(1), 0).unwrap();
    feed.push_round(BNB, feed_answer(300), 0).unwrap();

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

    let order_book = OrderBook::new(ORDER_BOOK);
    let market = Market::new(MARKET);
    (vault, order_book, market)
}

fn fund(vault: &mut Vault, account: AccountId, amount: Usd) {
    vault.dollar_mut().mint(Holder::Account(account), amount);
}

/// Route a direct plugin-mediated increase: escrow to the router, forward.
fn open_position(
    vault: &mut Vault,
    account: AccountId,
    amount_in: Usd,
    size_delta: Usd,
    side: Side,
) -> Result<(), VaultError> {
    vault
        .dollar_mut()
        .transfer(Holder::Account(account), Holder::Plugin(ROUTER), amount_in)
        .map_err(VaultError::from)?;
    vault.increase_position(ROUTER, account, BNB, amount_in, size_delta, side)
}

fn set_bnb_price(vault: &mut Vault, dollars: u64) {
    // push three rounds so the whole lookback window agrees
    let now = vault.time().as_secs();
    for _ in 0..3 {
        vault
            .price_feed_mut()
            .push_round(BNB, feed_answer(dollars), now)
            .unwrap();
    }
}

fn main() {
    println!("Settlement Engine Simulation");
    println!("Single dollar pool, oracle-marked positions, full lifecycle\n");

    scenario_1_liquidity_onboarding();
    scenario_2_position_lifecycle();
    scenario_3_conditional_orders();
    scenario_4_delayed_requests();
    scenario_5_funding_accrual();
    scenario_6_liquidation();

    println!("\nAll scenarios completed.");
}

/// LPs buy USDG; the pool grows dollar for dollar.
fn scenario_1_liquidity_onboarding() {
    println!("Scenario 1: Liquidity Onboarding\n");

    let (mut vault, _, _) = setup();
    let mut lp = LiquidityManager::default();
    let alice = AccountId(1);
    fund(&mut vault, alice, usd(10_000));

    let minted = lp.add_liquidity(&mut vault, alice, usd(10_000)).unwrap();
    println!("  alice deposited $10000, minted {minted} USDG wei");
    println!("  pool amount: {}", vault.pool_amount());

    vault.advance_time(DEFAULT_COOLDOWN);
    let redeemed = lp
        .remove_liquidity(&mut vault, alice, minted / U256::from(2u64))
        .unwrap();
    println!("  alice redeemed half: {redeemed} dollar units");
    println!("  pool amount after redemption: {}\n", vault.pool_amount());
}

/// Open a long, ride a rally, close at a profit.
fn scenario_2_position_lifecycle() {
    println!("Scenario 2: Position Lifecycle\n");

    let (mut vault, _, _) = setup();
    let mut lp = LiquidityManager::default();
    let alice = AccountId(1);
    let bob = AccountId(2);
    fund(&mut vault, alice, usd(50_000));
    fund(&mut vault, bob, usd(1_000));
    lp.add_liquidity(&mut vault, alice, usd(50_000)).unwrap();

    open_position(&mut vault, bob, usd(1_000), usd(5_000), Side::Long).unwrap();
    let key = vault.position_key(bob, BNB, Side::Long);
    let position = vault.position(&key).unwrap().clone();
    println!(
        "  bob long: size={} collateral={} entry={}",
        position.size, position.collateral, position.entry_price
    );

    set_bnb_price(&mut vault, 330);
    let (has_profit, delta) = vault
        .get_delta(
            BNB,
            position.size,
            position.entry_price,
            Side::Long,
            position.last_increased_time,
        )
        .unwrap();
    println!("  price 300 -> 330, profit={has_profit} delta={delta}");

    let size = vault.position(&key).unwrap().size;
    let paid = vault
        .decrease_position(ROUTER, bob, BNB, U256::zero(), size, Side::Long)
        .unwrap();
    println!("  full close paid out {paid} dollar units");
    println!("  position exists after close: {}\n", vault.position(&key).is_some());
}

/// A limit order only fires once its trigger condition holds.
fn scenario_3_conditional_orders() {
    println!("Scenario 3: Conditional Orders\n");

    let (mut vault, mut book, _) = setup();
    let mut lp = LiquidityManager::default();
    let alice = AccountId(1);
    let bob = AccountId(2);
    fund(&mut vault, alice, usd(20_000));
    fund(&mut vault, bob, usd(500));
    lp.add_liquidity(&mut vault, alice, usd(20_000)).unwrap();

    let index = book
        .create_increase_order(
            &mut vault,
            bob,
            BNB,
            usd(200),
            usd(400),
            Side::Long,
            U256::from(180u64) * U256::exp10(18),
            false,
        )
        .unwrap();
    println!("  bob placed a buy-the-dip order, trigger at 180");

    match book.execute_increase_order(&mut vault, bob, index) {
        Err(err) => println!("  execute at 300 rejected: {err}"),
        Ok(()) => unreachable!("order must not fire above its trigger"),
    }

    set_bnb_price(&mut vault, 180);
    book.execute_increase_order(&mut vault, bob, index).unwrap();
    let key = vault.position_key(bob, BNB, Side::Long);
    println!(
        "  dip hit, order executed: size={}\n",
        vault.position(&key).unwrap().size
    );
}

/// Delayed requests execute within the window and expire outside it.
fn scenario_4_delayed_requests() {
    println!("Scenario 4: Delayed Market Requests\n");

    let (mut vault, _, mut market) = setup();
    let mut lp = LiquidityManager::default();
    let alice = AccountId(1);
    let bob = AccountId(2);
    fund(&mut vault, alice, usd(20_000));
    fund(&mut vault, bob, usd(1_000));
    lp.add_liquidity(&mut vault, alice, usd(20_000)).unwrap();

    let key = market
        .create_increase_position(&mut vault, bob, BNB, usd(300), usd(900), Side::Long)
        .unwrap();
    vault.advance_time(60);
    market.execute_increase_position(&mut vault, &key).unwrap();
    println!("  first request executed 60s after creation");

    let stale = market
        .create_increase_position(&mut vault, bob, BNB, usd(300), usd(900), Side::Long)
        .unwrap();
    vault.advance_time(600);
    match market.execute_increase_position(&mut vault, &stale) {
        Err(err) => println!("  second request at +600s rejected: {err}"),
        Ok(_) => unreachable!("expired request must not execute"),
    }
    market.cancel_increase_position(&mut vault, &stale).unwrap();
    println!(
        "  cancelled and refunded, bob balance: {}\n",
        vault.dollar().balance_of(Holder::Account(bob))
    );
}

/// Utilization drives the funding accumulator.
fn scenario_5_funding_accrual() {
    println!("Scenario 5: Funding Accrual\n");

    let (mut vault, _, _) = setup();
    let mut lp = LiquidityManager::default();
    let alice = AccountId(1);
    let bob = AccountId(2);
    fund(&mut vault, alice, usd(10_000));
    fund(&mut vault, bob, usd(2_000));
    lp.add_liquidity(&mut vault, alice, usd(10_000)).unwrap();

    open_position(&mut vault, bob, usd(2_000), usd(5_000), Side::Long).unwrap();
    println!("  utilisation: {} / 1e6", vault.utilisation());

    for day in 1..=3u64 {
        vault.advance_time(FUNDING_INTERVAL);
        vault.refresh_cumulative_funding_rate().unwrap();
        println!(
            "  after interval {day}: cumulative funding rate = {}",
            vault.cumulative_funding_rate()
        );
    }
    println!();
}

/// A 50% drawdown on a 10x long leaves nothing to save.
fn scenario_6_liquidation() {
    println!("Scenario 6: Liquidation\n");

    let (mut vault, _, _) = setup();
    let mut lp = LiquidityManager::default();
    let alice = AccountId(1);
    let bob = AccountId(2);
    fund(&mut vault, alice, usd(50_000));
    fund(&mut vault, bob, usd(1_000));
    lp.add_liquidity(&mut vault, alice, usd(50_000)).unwrap();

    open_position(&mut vault, bob, usd(1_000), usd(10_000), Side::Long).unwrap();
    let key = vault.position_key(bob, BNB, Side::Long);

    set_bnb_price(&mut vault, 150);
    let state = vault.liquidation_state(&key).unwrap();
    println!("  price 300 -> 150, liquidation state: {state:?}");

    vault.liquidate_position(bob, BNB, Side::Long).unwrap();
    println!("  liquidated; position exists: {}", vault.position(&key).is_some());
    println!("  pool retained: {}", vault.pool_amount());
}
