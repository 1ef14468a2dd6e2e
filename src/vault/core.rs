//! Core vault struct: pool accounting, admin surface, the engine clock, and
//! the transactional guard every mutative operation runs under.

use super::results::VaultError;
use crate::config::VaultParams;
use crate::events::{
    EventCollector, EventPayload, PoolAmountEvent, SetPausedEvent, SetPluginEvent,
    SetWhitelistedTokenEvent,
};
use crate::math;
use crate::position::{Position, PositionKey};
use crate::price_feed::PriceFeed;
use crate::token::{Holder, TokenLedger};
use crate::types::{AccountId, CallerId, Price, Side, Timestamp, TokenId, Usd};
use primitive_types::U256;
use std::collections::{HashMap, HashSet};

/// The settlement vault. Sole owner of positions, the shared dollar pool,
/// the funding accumulator, and the plugin/whitelist registries.
#[derive(Debug)]
pub struct Vault {
    owner: AccountId,
    pub(super) params: VaultParams,
    pub(super) price_feed: PriceFeed,
    pub(super) dollar: TokenLedger,
    pub(super) usdg: TokenLedger,
    pub(super) dollar_token: TokenId,

    pub(super) positions: HashMap<PositionKey, Position>,
    pub(super) pool_amount: Usd,
    pub(super) reserved_amount: Usd,
    pub(super) fee_reserves: Usd,
    pub(super) cumulative_funding_rate: U256,
    pub(super) last_funding_time: Timestamp,

    whitelisted: HashSet<TokenId>,
    plugins: HashSet<CallerId>,
    paused: bool,
    entered: bool,

    pub(super) events: EventCollector,
    pub(super) now: Timestamp,
}

impl Vault {
    pub fn new(
        owner: AccountId,
        dollar_token: TokenId,
        params: VaultParams,
        price_feed: PriceFeed,
        dollar: TokenLedger,
        usdg: TokenLedger,
    ) -> Self {
        Self {
            owner,
            params,
            price_feed,
            dollar,
            usdg,
            dollar_token,
            positions: HashMap::new(),
            pool_amount: U256::zero(),
            reserved_amount: U256::zero(),
            fee_reserves: U256::zero(),
            cumulative_funding_rate: U256::zero(),
            last_funding_time: Timestamp::from_secs(0),
            whitelisted: HashSet::new(),
            plugins: HashSet::new(),
            paused: false,
            entered: false,
            events: EventCollector::new(),
            now: Timestamp::from_secs(0),
        }
    }

    // ---- clock ----

    pub fn time(&self) -> Timestamp {
        self.now
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.now = timestamp;
    }

    pub fn advance_time(&mut self, secs: u64) {
        self.now = self.now.plus_secs(secs);
    }

    // ---- views ----

    pub fn position(&self, key: &PositionKey) -> Option<&Position> {
        self.positions.get(key)
    }

    pub fn position_key(
        &self,
        account: AccountId,
        index_token: TokenId,
        side: Side,
    ) -> PositionKey {
        PositionKey::new(account, index_token, side)
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn pool_amount(&self) -> Usd {
        self.pool_amount
    }

    pub fn reserved_amount(&self) -> Usd {
        self.reserved_amount
    }

    pub fn fee_reserves(&self) -> Usd {
        self.fee_reserves
    }

    pub fn cumulative_funding_rate(&self) -> U256 {
        self.cumulative_funding_rate
    }

    pub fn is_plugin(&self, caller: CallerId) -> bool {
        self.plugins.contains(&caller)
    }

    pub fn is_whitelisted(&self, token: TokenId) -> bool {
        self.whitelisted.contains(&token)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn events(&self) -> &[crate::events::Event] {
        self.events.events()
    }

    pub fn price_feed(&self) -> &PriceFeed {
        &self.price_feed
    }

    pub fn price_feed_mut(&mut self) -> &mut PriceFeed {
        &mut self.price_feed
    }

    pub fn dollar(&self) -> &TokenLedger {
        &self.dollar
    }

    pub fn dollar_mut(&mut self) -> &mut TokenLedger {
        &mut self.dollar
    }

    pub fn usdg(&self) -> &TokenLedger {
        &self.usdg
    }

    pub fn usdg_mut(&mut self) -> &mut TokenLedger {
        &mut self.usdg
    }

    pub fn max_price(&self, token: TokenId) -> Result<Price, VaultError> {
        Ok(self.price_feed.get_price(token, true)?)
    }

    pub fn min_price(&self, token: TokenId) -> Result<Price, VaultError> {
        Ok(self.price_feed.get_price(token, false)?)
    }

    // ---- admin ----

    pub fn set_plugin(
        &mut self,
        caller: AccountId,
        plugin: CallerId,
        enabled: bool,
    ) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        if enabled {
            self.plugins.insert(plugin);
        } else {
            self.plugins.remove(&plugin);
        }
        self.emit(EventPayload::SetPlugin(SetPluginEvent {
            caller: plugin,
            enabled,
        }));
        Ok(())
    }

    pub fn set_whitelisted_token(
        &mut self,
        caller: AccountId,
        token: TokenId,
        enabled: bool,
    ) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        if enabled {
            self.whitelisted.insert(token);
        } else {
            self.whitelisted.remove(&token);
        }
        self.emit(EventPayload::SetWhitelistedToken(SetWhitelistedTokenEvent {
            token,
            enabled,
        }));
        Ok(())
    }

    pub fn pause(&mut self, caller: AccountId) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        self.paused = true;
        self.emit(EventPayload::SetPaused(SetPausedEvent { paused: true }));
        Ok(())
    }

    pub fn unpause(&mut self, caller: AccountId) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        self.paused = false;
        self.emit(EventPayload::SetPaused(SetPausedEvent { paused: false }));
        Ok(())
    }

    pub fn set_params(&mut self, caller: AccountId, params: VaultParams) -> Result<(), VaultError> {
        self.ensure_owner(caller)?;
        self.params = params;
        Ok(())
    }

    pub fn params(&self) -> &VaultParams {
        &self.params
    }

    // ---- guards ----

    pub(super) fn ensure_owner(&self, caller: AccountId) -> Result<(), VaultError> {
        if caller != self.owner {
            return Err(VaultError::NotOwner);
        }
        Ok(())
    }

    pub(super) fn ensure_not_paused(&self) -> Result<(), VaultError> {
        if self.paused {
            return Err(VaultError::Paused);
        }
        Ok(())
    }

    pub(super) fn ensure_plugin(&self, caller: CallerId) -> Result<(), VaultError> {
        if !self.plugins.contains(&caller) {
            return Err(VaultError::NotPlugin);
        }
        Ok(())
    }

    pub(super) fn ensure_whitelisted(&self, token: TokenId) -> Result<(), VaultError> {
        if !self.whitelisted.contains(&token) {
            return Err(VaultError::NotWhitelisted(token));
        }
        Ok(())
    }

    // ---- pool accounting (guarded helpers) ----

    pub(super) fn increase_pool_amount(&mut self, amount: Usd) -> Result<(), VaultError> {
        let next = math::checked_add(self.pool_amount, amount)?;
        if next > self.dollar.balance_of(Holder::Vault) {
            return Err(VaultError::PoolExceedsBalance);
        }
        self.pool_amount = next;
        self.emit(EventPayload::IncreasePoolAmount(PoolAmountEvent { amount }));
        Ok(())
    }

    pub(super) fn decrease_pool_amount(&mut self, amount: Usd) -> Result<(), VaultError> {
        let next =
            math::checked_sub(self.pool_amount, amount).map_err(|_| VaultError::PoolUnderflow)?;
        if self.reserved_amount > next {
            return Err(VaultError::ReserveExceedsPool);
        }
        self.pool_amount = next;
        self.emit(EventPayload::DecreasePoolAmount(PoolAmountEvent { amount }));
        Ok(())
    }

    pub(super) fn increase_reserved_amount(&mut self, amount: Usd) -> Result<(), VaultError> {
        let next = math::checked_add(self.reserved_amount, amount)?;
        if next > self.pool_amount {
            return Err(VaultError::ReserveExceedsPool);
        }
        self.reserved_amount = next;
        self.emit(EventPayload::IncreaseReservedAmount(PoolAmountEvent {
            amount,
        }));
        Ok(())
    }

    pub(super) fn decrease_reserved_amount(&mut self, amount: Usd) -> Result<(), VaultError> {
        self.reserved_amount = math::checked_sub(self.reserved_amount, amount)
            .map_err(|_| VaultError::InsufficientReserve)?;
        self.emit(EventPayload::DecreaseReservedAmount(PoolAmountEvent {
            amount,
        }));
        Ok(())
    }

    // ---- transfers ----

    /// Pull dollars and report the delta actually observed in the vault's
    /// balance. Fee-on-transfer dollars deliver less than requested; all
    /// downstream accounting uses the measured amount.
    pub(super) fn do_transfer_in(&mut self, from: Holder, amount: Usd) -> Result<Usd, VaultError> {
        let before = self.dollar.balance_of(Holder::Vault);
        self.dollar.transfer(from, Holder::Vault, amount)?;
        let after = self.dollar.balance_of(Holder::Vault);
        Ok(after - before)
    }

    pub(super) fn transfer_out(&mut self, to: Holder, amount: Usd) -> Result<(), VaultError> {
        self.dollar.transfer(Holder::Vault, to, amount)?;
        Ok(())
    }

    // ---- transactional execution ----

    pub(super) fn emit(&mut self, payload: EventPayload) {
        self.events.emit(self.now, payload);
    }

    /// Run `f` under the process-wide non-reentrancy flag. Every mutative
    /// path goes through here: position mutators and USDG flows via
    /// `transactional`, and the collaborators' order/request create, update
    /// and cancel paths directly, so their escrow transfers share the flag.
    pub(crate) fn non_reentrant<T, E: From<VaultError>>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        if self.entered {
            return Err(VaultError::Reentrancy.into());
        }
        self.entered = true;
        let result = f(self);
        self.entered = false;
        result
    }

    /// Run a mutative operation under the non-reentrancy flag with
    /// all-or-nothing semantics: on any error, position entries, pool and
    /// funding scalars, ledger balances of the touched holders, and the
    /// event log are restored to their pre-call state.
    pub(super) fn transactional<T>(
        &mut self,
        keys: &[PositionKey],
        holders: &[Holder],
        f: impl FnOnce(&mut Self) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        self.non_reentrant(|v| {
            let checkpoint = v.checkpoint(keys, holders);
            let result = f(v);
            if result.is_err() {
                v.restore(checkpoint);
            }
            result
        })
    }

    fn checkpoint(&self, keys: &[PositionKey], holders: &[Holder]) -> Checkpoint {
        let mut all_holders: Vec<Holder> = holders.to_vec();
        if !all_holders.contains(&Holder::Vault) {
            all_holders.push(Holder::Vault);
        }
        Checkpoint {
            pool_amount: self.pool_amount,
            reserved_amount: self.reserved_amount,
            fee_reserves: self.fee_reserves,
            cumulative_funding_rate: self.cumulative_funding_rate,
            last_funding_time: self.last_funding_time,
            positions: keys
                .iter()
                .map(|k| (*k, self.positions.get(k).cloned()))
                .collect(),
            dollar_balances: all_holders
                .iter()
                .map(|h| (*h, self.dollar.balance_of(*h)))
                .collect(),
            dollar_supply: self.dollar.total_supply(),
            usdg_balances: all_holders
                .iter()
                .map(|h| (*h, self.usdg.balance_of(*h)))
                .collect(),
            usdg_supply: self.usdg.total_supply(),
            events_len: self.events.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pool_amount = checkpoint.pool_amount;
        self.reserved_amount = checkpoint.reserved_amount;
        self.fee_reserves = checkpoint.fee_reserves;
        self.cumulative_funding_rate = checkpoint.cumulative_funding_rate;
        self.last_funding_time = checkpoint.last_funding_time;
        for (key, entry) in checkpoint.positions {
            match entry {
                Some(position) => {
                    self.positions.insert(key, position);
                }
                None => {
                    self.positions.remove(&key);
                }
            }
        }
        for (holder, balance) in checkpoint.dollar_balances {
            self.dollar.restore_balance(holder, balance);
        }
        self.dollar.restore_total_supply(checkpoint.dollar_supply);
        for (holder, balance) in checkpoint.usdg_balances {
            self.usdg.restore_balance(holder, balance);
        }
        self.usdg.restore_total_supply(checkpoint.usdg_supply);
        self.events.truncate(checkpoint.events_len);
    }
}

struct Checkpoint {
    pool_amount: Usd,
    reserved_amount: Usd,
    fee_reserves: Usd,
    cumulative_funding_rate: U256,
    last_funding_time: Timestamp,
    positions: Vec<(PositionKey, Option<Position>)>,
    dollar_balances: Vec<(Holder, U256)>,
    dollar_supply: U256,
    usdg_balances: Vec<(Holder, U256)>,
    usdg_supply: U256,
    events_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_feed::PriceFeed;

    fn owner() -> AccountId {
        AccountId(0)
    }

    fn new_vault() -> Vault {
        Vault::new(
            owner(),
            TokenId(0),
            VaultParams::default(),
            PriceFeed::new(),
            TokenLedger::new("USD", 6),
            TokenLedger::new("USDG", 18),
        )
    }

    #[test]
    fn admin_requires_owner() {
        let mut vault = new_vault();
        assert_eq!(
            vault.set_plugin(AccountId(9), CallerId(1), true),
            Err(VaultError::NotOwner)
        );

        vault.set_plugin(owner(), CallerId(1), true).unwrap();
        assert!(vault.is_plugin(CallerId(1)));
        vault.set_plugin(owner(), CallerId(1), false).unwrap();
        assert!(!vault.is_plugin(CallerId(1)));
    }

    #[test]
    fn whitelist_toggle() {
        let mut vault = new_vault();
        vault
            .set_whitelisted_token(owner(), TokenId(1), true)
            .unwrap();
        assert!(vault.is_whitelisted(TokenId(1)));
        vault
            .set_whitelisted_token(owner(), TokenId(1), false)
            .unwrap();
        assert!(!vault.is_whitelisted(TokenId(1)));
    }

    #[test]
    fn pool_never_exceeds_balance() {
        let mut vault = new_vault();
        // nothing held: growing the pool must fail
        assert_eq!(
            vault.increase_pool_amount(U256::from(1u64)),
            Err(VaultError::PoolExceedsBalance)
        );

        vault.dollar.mint(Holder::Vault, U256::from(100u64));
        vault.increase_pool_amount(U256::from(100u64)).unwrap();
        assert_eq!(vault.pool_amount(), U256::from(100u64));
    }

    #[test]
    fn reserve_bounded_by_pool() {
        let mut vault = new_vault();
        vault.dollar.mint(Holder::Vault, U256::from(100u64));
        vault.increase_pool_amount(U256::from(100u64)).unwrap();

        vault.increase_reserved_amount(U256::from(100u64)).unwrap();
        assert_eq!(
            vault.increase_reserved_amount(U256::from(1u64)),
            Err(VaultError::ReserveExceedsPool)
        );

        // pool cannot shrink below the reserve
        assert_eq!(
            vault.decrease_pool_amount(U256::from(1u64)),
            Err(VaultError::ReserveExceedsPool)
        );

        vault.decrease_reserved_amount(U256::from(100u64)).unwrap();
        assert_eq!(
            vault.decrease_reserved_amount(U256::from(1u64)),
            Err(VaultError::InsufficientReserve)
        );
    }

    #[test]
    fn pool_underflow_is_named() {
        let mut vault = new_vault();
        assert_eq!(
            vault.decrease_pool_amount(U256::from(1u64)),
            Err(VaultError::PoolUnderflow)
        );
    }

    #[test]
    fn transfer_in_measures_actual_delta() {
        let mut vault = new_vault();
        vault
            .dollar
            .mint(Holder::Account(AccountId(1)), U256::from(1_000_000u64));
        vault.dollar.set_transfer_fee(10_000); // 1%

        let actual = vault
            .do_transfer_in(Holder::Account(AccountId(1)), U256::from(1_000_000u64))
            .unwrap();
        assert_eq!(actual, U256::from(990_000u64));
    }

    #[test]
    fn transactional_rolls_back_on_error() {
        let mut vault = new_vault();
        let user = Holder::Account(AccountId(1));
        vault.dollar.mint(user, U256::from(500u64));

        let result: Result<(), VaultError> = vault.transactional(&[], &[user], |v| {
            let actual = v.do_transfer_in(user, U256::from(500u64))?;
            v.increase_pool_amount(actual)?;
            Err(VaultError::Paused) // simulate a late failure
        });
        assert!(result.is_err());

        // everything is back where it started
        assert_eq!(vault.pool_amount(), U256::zero());
        assert_eq!(vault.dollar.balance_of(user), U256::from(500u64));
        assert_eq!(vault.dollar.balance_of(Holder::Vault), U256::zero());
        assert!(vault.events().is_empty());
    }

    #[test]
    fn guard_rejects_reentrancy() {
        let mut vault = new_vault();
        let result = vault.transactional(&[], &[], |v| {
            v.transactional(&[], &[], |_| Ok(()))
        });
        assert_eq!(result, Err(VaultError::Reentrancy));
    }

    #[test]
    fn collaborator_guard_shares_the_flag() {
        let mut vault = new_vault();
        // an escrow-style guard section cannot nest a position mutation
        let result: Result<(), VaultError> = vault.non_reentrant(|v| {
            v.transactional(&[], &[], |_| Ok(()))
        });
        assert_eq!(result, Err(VaultError::Reentrancy));

        // and the flag clears once the section ends
        let result: Result<(), VaultError> = vault.non_reentrant(|_| Ok(()));
        assert!(result.is_ok());
    }
}
