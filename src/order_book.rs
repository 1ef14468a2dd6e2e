//! Conditional limit orders: trigger-price gated increases and decreases.
//!
//! Orders are stored per account under a monotonic index starting at 1.
//! Increase orders escrow their collateral at creation; the escrowed amount
//! is immutable until cancel (refund) or execute (forwarded to the vault).
//! Anyone may execute once the trigger condition holds.

use crate::events::{
    CancelOrderEvent, CreateDecreaseOrderEvent, CreateIncreaseOrderEvent, EventCollector,
    EventPayload, ExecuteDecreaseOrderEvent, ExecuteIncreaseOrderEvent, UpdateDecreaseOrderEvent,
    UpdateIncreaseOrderEvent,
};
use crate::token::{Holder, TokenError};
use crate::types::{AccountId, CallerId, OrderIndex, Price, Side, TokenId, Usd};
use crate::vault::{Vault, VaultError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderBookError {
    #[error("OrderBook: non-existent order")]
    OrderNotFound,

    #[error("OrderBook: invalid price for execution")]
    InvalidPriceForExecution,

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncreaseOrder {
    pub account: AccountId,
    pub token: TokenId,
    pub amount: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub trigger_price: Price,
    pub trigger_above_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecreaseOrder {
    pub account: AccountId,
    pub token: TokenId,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub trigger_price: Price,
    pub trigger_above_threshold: bool,
}

#[derive(Debug)]
pub struct OrderBook {
    caller: CallerId,
    increase_orders: HashMap<(AccountId, OrderIndex), IncreaseOrder>,
    increase_index: HashMap<AccountId, OrderIndex>,
    decrease_orders: HashMap<(AccountId, OrderIndex), DecreaseOrder>,
    decrease_index: HashMap<AccountId, OrderIndex>,
    events: EventCollector,
}

/// An order fires when the reference price has crossed its trigger.
fn condition_met(current_price: Price, trigger_price: Price, trigger_above_threshold: bool) -> bool {
    if trigger_above_threshold {
        current_price >= trigger_price
    } else {
        current_price <= trigger_price
    }
}

impl OrderBook {
    /// `caller` is the plugin identity this book registers with the vault.
    pub fn new(caller: CallerId) -> Self {
        Self {
            caller,
            increase_orders: HashMap::new(),
            increase_index: HashMap::new(),
            decrease_orders: HashMap::new(),
            decrease_index: HashMap::new(),
            events: EventCollector::new(),
        }
    }

    pub fn caller(&self) -> CallerId {
        self.caller
    }

    pub fn events(&self) -> &[crate::events::Event] {
        self.events.events()
    }

    // ---- views ----

    pub fn increase_order(&self, account: AccountId, index: OrderIndex) -> Option<&IncreaseOrder> {
        self.increase_orders.get(&(account, index))
    }

    pub fn decrease_order(&self, account: AccountId, index: OrderIndex) -> Option<&DecreaseOrder> {
        self.decrease_orders.get(&(account, index))
    }

    /// Index of the most recently created increase order for `account`.
    pub fn increase_orders_index(&self, account: AccountId) -> OrderIndex {
        self.increase_index.get(&account).copied().unwrap_or(0)
    }

    pub fn decrease_orders_index(&self, account: AccountId) -> OrderIndex {
        self.decrease_index.get(&account).copied().unwrap_or(0)
    }

    // ---- create / update / cancel ----

    #[allow(clippy::too_many_arguments)]
    pub fn create_increase_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        token: TokenId,
        amount_in: Usd,
        size_delta: Usd,
        side: Side,
        trigger_price: Price,
        trigger_above_threshold: bool,
    ) -> Result<OrderIndex, OrderBookError> {
        let caller = self.caller;
        let orders = &mut self.increase_orders;
        let index_map = &mut self.increase_index;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            // escrow the collateral under this book's plugin identity
            v.dollar_mut()
                .transfer(Holder::Account(account), Holder::Plugin(caller), amount_in)?;

            let index = index_map.get(&account).copied().unwrap_or(0) + 1;
            index_map.insert(account, index);
            orders.insert(
                (account, index),
                IncreaseOrder {
                    account,
                    token,
                    amount: amount_in,
                    size_delta,
                    side,
                    trigger_price,
                    trigger_above_threshold,
                },
            );

            events.emit(
                v.time(),
                EventPayload::CreateIncreaseOrder(CreateIncreaseOrderEvent {
                    account,
                    index,
                    token,
                    amount: amount_in,
                    size_delta,
                    side,
                    trigger_price,
                    trigger_above_threshold,
                }),
            );
            Ok(index)
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_decrease_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        token: TokenId,
        size_delta: Usd,
        collateral_delta: Usd,
        side: Side,
        trigger_price: Price,
        trigger_above_threshold: bool,
    ) -> Result<OrderIndex, OrderBookError> {
        let orders = &mut self.decrease_orders;
        let index_map = &mut self.decrease_index;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            let index = index_map.get(&account).copied().unwrap_or(0) + 1;
            index_map.insert(account, index);
            orders.insert(
                (account, index),
                DecreaseOrder {
                    account,
                    token,
                    collateral_delta,
                    size_delta,
                    side,
                    trigger_price,
                    trigger_above_threshold,
                },
            );

            events.emit(
                v.time(),
                EventPayload::CreateDecreaseOrder(CreateDecreaseOrderEvent {
                    account,
                    index,
                    token,
                    size_delta,
                    collateral_delta,
                    side,
                    trigger_price,
                    trigger_above_threshold,
                }),
            );
            Ok(index)
        })
    }

    /// Only the order's account reaches its own orders; the escrowed amount
    /// cannot be changed. Updates never re-check the trigger.
    pub fn update_increase_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        index: OrderIndex,
        size_delta: Usd,
        trigger_price: Price,
        trigger_above_threshold: bool,
    ) -> Result<(), OrderBookError> {
        let orders = &mut self.increase_orders;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            let order = orders
                .get_mut(&(account, index))
                .ok_or(OrderBookError::OrderNotFound)?;
            order.size_delta = size_delta;
            order.trigger_price = trigger_price;
            order.trigger_above_threshold = trigger_above_threshold;

            events.emit(
                v.time(),
                EventPayload::UpdateIncreaseOrder(UpdateIncreaseOrderEvent {
                    account,
                    index,
                    size_delta,
                    trigger_price,
                    trigger_above_threshold,
                }),
            );
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_decrease_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        index: OrderIndex,
        collateral_delta: Usd,
        size_delta: Usd,
        trigger_price: Price,
        trigger_above_threshold: bool,
    ) -> Result<(), OrderBookError> {
        let orders = &mut self.decrease_orders;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            let order = orders
                .get_mut(&(account, index))
                .ok_or(OrderBookError::OrderNotFound)?;
            order.collateral_delta = collateral_delta;
            order.size_delta = size_delta;
            order.trigger_price = trigger_price;
            order.trigger_above_threshold = trigger_above_threshold;

            events.emit(
                v.time(),
                EventPayload::UpdateDecreaseOrder(UpdateDecreaseOrderEvent {
                    account,
                    index,
                    collateral_delta,
                    size_delta,
                    trigger_price,
                    trigger_above_threshold,
                }),
            );
            Ok(())
        })
    }

    /// Cancel never checks the trigger; the escrow goes straight back.
    pub fn cancel_increase_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        index: OrderIndex,
    ) -> Result<(), OrderBookError> {
        let caller = self.caller;
        let orders = &mut self.increase_orders;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            let order = orders
                .remove(&(account, index))
                .ok_or(OrderBookError::OrderNotFound)?;
            let refunded = order.amount;

            // delete before the refund; reinstate if the transfer aborts
            if let Err(err) = v.dollar_mut().transfer(
                Holder::Plugin(caller),
                Holder::Account(account),
                refunded,
            ) {
                orders.insert((account, index), order);
                return Err(err.into());
            }

            events.emit(
                v.time(),
                EventPayload::CancelIncreaseOrder(CancelOrderEvent {
                    account,
                    index,
                    refunded,
                }),
            );
            Ok(())
        })
    }

    pub fn cancel_decrease_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        index: OrderIndex,
    ) -> Result<(), OrderBookError> {
        let orders = &mut self.decrease_orders;
        let events = &mut self.events;
        vault.non_reentrant(|v| {
            orders
                .remove(&(account, index))
                .ok_or(OrderBookError::OrderNotFound)?;

            events.emit(
                v.time(),
                EventPayload::CancelDecreaseOrder(CancelOrderEvent {
                    account,
                    index,
                    refunded: Usd::zero(),
                }),
            );
            Ok(())
        })
    }

    // ---- execution ----

    /// Anyone may execute. An increase for a long checks the max price, for
    /// a short the min price; the order fires only once its threshold holds.
    pub fn execute_increase_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        index: OrderIndex,
    ) -> Result<(), OrderBookError> {
        let order = self
            .increase_orders
            .get(&(account, index))
            .cloned()
            .ok_or(OrderBookError::OrderNotFound)?;

        let current_price = self.validate_order_price(
            vault,
            order.token,
            order.side.is_long(),
            order.trigger_price,
            order.trigger_above_threshold,
        )?;

        // delete before forwarding; reinstate if the vault aborts
        self.increase_orders.remove(&(account, index));
        if let Err(err) = vault.increase_position(
            self.caller,
            account,
            order.token,
            order.amount,
            order.size_delta,
            order.side,
        ) {
            self.increase_orders.insert((account, index), order);
            return Err(err.into());
        }

        self.events.emit(
            vault.time(),
            EventPayload::ExecuteIncreaseOrder(ExecuteIncreaseOrderEvent {
                account,
                index,
                token: order.token,
                amount: order.amount,
                size_delta: order.size_delta,
                side: order.side,
                trigger_price: order.trigger_price,
                execution_price: current_price,
            }),
        );
        Ok(())
    }

    /// Closing a long is validated against the conservative min price,
    /// closing a short against the max.
    pub fn execute_decrease_order(
        &mut self,
        vault: &mut Vault,
        account: AccountId,
        index: OrderIndex,
    ) -> Result<(), OrderBookError> {
        let order = self
            .decrease_orders
            .get(&(account, index))
            .cloned()
            .ok_or(OrderBookError::OrderNotFound)?;

        let current_price = self.validate_order_price(
            vault,
            order.token,
            !order.side.is_long(),
            order.trigger_price,
            order.trigger_above_threshold,
        )?;

        self.decrease_orders.remove(&(account, index));
        if let Err(err) = vault.decrease_position(
            self.caller,
            account,
            order.token,
            order.collateral_delta,
            order.size_delta,
            order.side,
        ) {
            self.decrease_orders.insert((account, index), order);
            return Err(err.into());
        }

        self.events.emit(
            vault.time(),
            EventPayload::ExecuteDecreaseOrder(ExecuteDecreaseOrderEvent {
                account,
                index,
                token: order.token,
                collateral_delta: order.collateral_delta,
                size_delta: order.size_delta,
                side: order.side,
                trigger_price: order.trigger_price,
                execution_price: current_price,
            }),
        );
        Ok(())
    }

    fn validate_order_price(
        &self,
        vault: &Vault,
        token: TokenId,
        maximise: bool,
        trigger_price: Price,
        trigger_above_threshold: bool,
    ) -> Result<Price, OrderBookError> {
        let current_price = if maximise {
            vault.max_price(token)?
        } else {
            vault.min_price(token)?
        };
        if !condition_met(current_price, trigger_price, trigger_above_threshold) {
            return Err(OrderBookError::InvalidPriceForExecution);
        }
        Ok(current_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    fn price(v: u64) -> Price {
        U256::from(v) * U256::exp10(18)
    }

    #[test]
    fn trigger_above_threshold() {
        assert!(condition_met(price(200), price(180), true));
        assert!(condition_met(price(180), price(180), true));
        assert!(!condition_met(price(179), price(180), true));
    }

    #[test]
    fn trigger_below_threshold() {
        assert!(condition_met(price(150), price(180), false));
        assert!(condition_met(price(180), price(180), false));
        assert!(!condition_met(price(181), price(180), false));
    }

    #[test]
    fn pinned_error_strings() {
        assert_eq!(
            OrderBookError::OrderNotFound.to_string(),
            "OrderBook: non-existent order"
        );
        assert_eq!(
            OrderBookError::InvalidPriceForExecution.to_string(),
            "OrderBook: invalid price for execution"
        );
    }
}
