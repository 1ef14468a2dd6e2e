//! Time-delayed market-order requests.
//!
//! Users queue increase/decrease requests; an off-chain executor drives them
//! within `max_time_delay` seconds of creation. Executors race, so executing
//! a missing request is a silent no-op rather than an error. Expired
//! requests can no longer be executed by anyone but may still be cancelled,
//! refunding the creator.

use crate::events::{
    CancelRequestEvent, CreateDecreaseRequestEvent, CreateIncreaseRequestEvent, EventCollector,
    EventPayload, ExecuteDecreaseRequestEvent, ExecuteIncreaseRequestEvent, SetMaxTimeDelayEvent,
};
use crate::token::{Holder, TokenError};
use crate::types::{AccountId, CallerId, OrderIndex, Side, Timestamp, TokenId, Usd};
use crate::vault::{Vault, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_MAX_TIME_DELAY: u64 = 300;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    #[error("Market::{0} Request has expired")]
    RequestExpired(&'static str),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Request keys are derived from `(account, index)` so any external system
/// can reproduce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub account: AccountId,
    pub index: OrderIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncreasePositionRequest {
    pub account: AccountId,
    pub token: TokenId,
    pub amount_in: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub block_time: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecreasePositionRequest {
    pub account: AccountId,
    pub token: TokenId,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub block_time: Timestamp,
}

#[derive(Debug)]
pub struct Market {
    caller: CallerId,
    increase_requests: HashMap<RequestKey, IncreasePositionRequest>,
    increase_index: HashMap<AccountId, OrderIndex>,
    decrease_requests: HashMap<RequestKey, DecreasePositionRequest>,
    decrease_index: HashMap<AccountId, OrderIndex>,
    max_time_delay: u64,
    events: EventCollector,
}

impl Market {
    pub fn new(caller: CallerId) -> Self {
        Self {
            caller,
            increase_requests: HashMap::new(),
            increase_index: HashMap::new(),
            decrease_requests: HashMap::new(),
            decrease_index: HashMap::new(),
            max_time_delay: DEFAULT_MAX_TIME_DELAY,
            events: EventCollector::new(),
        }
    }

    pub fn caller(&self) -> CallerId {
        self.caller
    }

    pub fn max_time_delay(&self) -> u64 {
        self.max_time_delay
    }

    pub fn set_max_time_delay(&mut self, vault: &Vault, seconds: u64) {
        self.max_time_delay = seconds;
        self.events.emit(
            vault.time(),
            EventPayload::SetMaxTimeDelay(SetMaxTimeDelayEvent {
                max_time_delay: seconds,
            }),
        );
    }

    pub fn events(&self) -> &[crate::events::Event] {
        self.events.events()
    }

    pub fn increase_request(&self, key: &RequestKey) -> Option<&IncreasePositionRequest> {
        self.increase_requests.get(key)
    }

    pub fn decrease_request(&self, key: &RequestKey) -> Option<&DecreasePositionRequest> {
        self.decrease_requests.get(key)
    }

    fn expired(&self, block_time: Timestamp, now: Timestamp) -> bool {
        block_time.as_secs() + self.max_time_delay <= now.as_secs()
    }

    // ---- create ----

    /// Escrows `amount_in` dollars and queues the request. Returns its key.
    pub fn create_increase_position(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        token: TokenId,
        amount_in: Usd,
        size_delta: Usd,
        side: Side,
    ) -> Result<RequestKey, MarketError> {
        let caller = self.caller;
        let requests = &mut self.increase_requests;
        let index_map = &mut self.increase_index;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            v.dollar_mut()
                .transfer(Holder::Account(account), Holder::Plugin(caller), amount_in)?;

            let index = index_map.get(&account).copied().unwrap_or(0) + 1;
            index_map.insert(account, index);
            let key = RequestKey { account, index };
            let block_time = v.time();
            requests.insert(
                key,
                IncreasePositionRequest {
                    account,
                    token,
                    amount_in,
                    size_delta,
                    side,
                    block_time,
                },
            );

            events.emit(
                block_time,
                EventPayload::CreateIncreasePosition(CreateIncreaseRequestEvent {
                    account,
                    index,
                    token,
                    amount_in,
                    size_delta,
                    side,
                    block_time,
                }),
            );
            Ok(key)
        })
    }

    pub fn create_decrease_position(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        token: TokenId,
        collateral_delta: Usd,
        size_delta: Usd,
        side: Side,
    ) -> Result<RequestKey, MarketError> {
        let requests = &mut self.decrease_requests;
        let index_map = &mut self.decrease_index;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            let index = index_map.get(&account).copied().unwrap_or(0) + 1;
            index_map.insert(account, index);
            let key = RequestKey { account, index };
            let block_time = v.time();
            requests.insert(
                key,
                DecreasePositionRequest {
                    account,
                    token,
                    collateral_delta,
                    size_delta,
                    side,
                    block_time,
                },
            );

            events.emit(
                block_time,
                EventPayload::CreateDecreasePosition(CreateDecreaseRequestEvent {
                    account,
                    index,
                    token,
                    collateral_delta,
                    size_delta,
                    side,
                    block_time,
                }),
            );
            Ok(key)
        })
    }

    // ---- cancel ----

    /// Deletes the request and refunds the escrow to its creator. Returns
    /// `false` if the request was already gone.
    pub fn cancel_increase_position(
        &mut self,
        vault: &mut Vault,
        key: &RequestKey,
    ) -> Result<bool, MarketError> {
        let caller = self.caller;
        let requests = &mut self.increase_requests;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            let Some(request) = requests.remove(key) else {
                return Ok(false);
            };

            // delete before the refund; reinstate if the transfer aborts
            if let Err(err) = v.dollar_mut().transfer(
                Holder::Plugin(caller),
                Holder::Account(request.account),
                request.amount_in,
            ) {
                requests.insert(*key, request);
                return Err(err.into());
            }

            events.emit(
                v.time(),
                EventPayload::CancelIncreasePosition(CancelRequestEvent {
                    account: request.account,
                    index: key.index,
                    refunded: request.amount_in,
                }),
            );
            Ok(true)
        })
    }

    pub fn cancel_decrease_position(
        &mut self,
        vault: &mut Vault,
        key: &RequestKey,
    ) -> Result<bool, MarketError> {
        let requests = &mut self.decrease_requests;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            let Some(request) = requests.remove(key) else {
                return Ok(false);
            };

            events.emit(
                v.time(),
                EventPayload::CancelDecreasePosition(CancelRequestEvent {
                    account: request.account,
                    index: key.index,
                    refunded: Usd::zero(),
                }),
            );
            Ok(true)
        })
    }

    // ---- execute ----

    /// Missing requests are a silent no-op (`Ok(false)`): executors race and
    /// the losing call must be idempotent. Expired requests are an error.
    pub fn execute_increase_position(
        &mut self,
        vault: &mut Vault,
        key: &RequestKey,
    ) -> Result<bool, MarketError> {
        let Some(request) = self.increase_requests.get(key).cloned() else {
            return Ok(false);
        };
        if self.expired(request.block_time, vault.time()) {
            return Err(MarketError::RequestExpired("executeIncreasePosition"));
        }

        // delete before forwarding; reinstate if the vault aborts
        self.increase_requests.remove(key);
        if let Err(err) = vault.increase_position(
            self.caller,
            request.account,
            request.token,
            request.amount_in,
            request.size_delta,
            request.side,
        ) {
            self.increase_requests.insert(*key, request);
            return Err(err.into());
        }

        let time_gap = vault.time().since(request.block_time);
        self.events.emit(
            vault.time(),
            EventPayload::ExecuteIncreasePosition(ExecuteIncreaseRequestEvent {
                account: request.account,
                index: key.index,
                token: request.token,
                amount_in: request.amount_in,
                size_delta: request.size_delta,
                side: request.side,
                time_gap,
            }),
        );
        Ok(true)
    }

    pub fn execute_decrease_position(
        &mut self,
        vault: &mut Vault,
        key: &RequestKey,
    ) -> Result<bool, MarketError> {
        let Some(request) = self.decrease_requests.get(key).cloned() else {
            return Ok(false);
        };
        if self.expired(request.block_time, vault.time()) {
            return Err(MarketError::RequestExpired("executeDecreasePosition"));
        }

        self.decrease_requests.remove(key);
        if let Err(err) = vault.decrease_position(
            self.caller,
            request.account,
            request.token,
            request.collateral_delta,
            request.size_delta,
            request.side,
        ) {
            self.decrease_requests.insert(*key, request);
            return Err(err.into());
        }

        let time_gap = vault.time().since(request.block_time);
        self.events.emit(
            vault.time(),
            EventPayload::ExecuteDecreasePosition(ExecuteDecreaseRequestEvent {
                account: request.account,
                index: key.index,
                token: request.token,
                collateral_delta: request.collateral_delta,
                size_delta: request.size_delta,
                side: request.side,
                time_gap,
            }),
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_expiry_strings() {
        assert_eq!(
            MarketError::RequestExpired("executeIncreasePosition").to_string(),
            "Market::executeIncreasePosition Request has expired"
        );
        assert_eq!(
            MarketError::RequestExpired("executeDecreasePosition").to_string(),
            "Market::executeDecreasePosition Request has expired"
        );
    }

    #[test]
    fn request_keys_are_reproducible() {
        let a = RequestKey {
            account: AccountId(7),
            index: 3,
        };
        let b = RequestKey {
            account: AccountId(7),
            index: 3,
        };
        assert_eq!(a, b);
    }
}
