// 5.0: every state change produces an event. used for audit trails, state
// reconstruction, and notifying external systems. field order inside each
// event struct follows the argument order of the operation that emits it.

use crate::position::PositionKey;
use crate::types::{
    AccountId, CallerId, OrderIndex, Price, Side, SignedUsd, Timestamp, TokenId, Usd,
};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Admin
    SetPlugin(SetPluginEvent),
    SetWhitelistedToken(SetWhitelistedTokenEvent),
    SetPaused(SetPausedEvent),

    // Pool accounting
    IncreasePoolAmount(PoolAmountEvent),
    DecreasePoolAmount(PoolAmountEvent),
    IncreaseReservedAmount(PoolAmountEvent),
    DecreaseReservedAmount(PoolAmountEvent),

    // Positions
    IncreasePosition(IncreasePositionEvent),
    DecreasePosition(DecreasePositionEvent),
    UpdatePosition(UpdatePositionEvent),
    ClosePosition(ClosePositionEvent),
    LiquidatePosition(LiquidatePositionEvent),
    UpdatePnl(UpdatePnlEvent),

    // USDG
    BuyUsdg(BuyUsdgEvent),
    SellUsdg(SellUsdgEvent),

    // Funding
    UpdateFundingRate(UpdateFundingRateEvent),

    // Conditional orders
    CreateIncreaseOrder(CreateIncreaseOrderEvent),
    UpdateIncreaseOrder(UpdateIncreaseOrderEvent),
    CancelIncreaseOrder(CancelOrderEvent),
    ExecuteIncreaseOrder(ExecuteIncreaseOrderEvent),
    CreateDecreaseOrder(CreateDecreaseOrderEvent),
    UpdateDecreaseOrder(UpdateDecreaseOrderEvent),
    CancelDecreaseOrder(CancelOrderEvent),
    ExecuteDecreaseOrder(ExecuteDecreaseOrderEvent),

    // Delayed requests
    CreateIncreasePosition(CreateIncreaseRequestEvent),
    ExecuteIncreasePosition(ExecuteIncreaseRequestEvent),
    CancelIncreasePosition(CancelRequestEvent),
    CreateDecreasePosition(CreateDecreaseRequestEvent),
    ExecuteDecreasePosition(ExecuteDecreaseRequestEvent),
    CancelDecreasePosition(CancelRequestEvent),
    SetMaxTimeDelay(SetMaxTimeDelayEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPluginEvent {
    pub caller: CallerId,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWhitelistedTokenEvent {
    pub token: TokenId,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPausedEvent {
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolAmountEvent {
    pub amount: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncreasePositionEvent {
    pub key: PositionKey,
    pub account: AccountId,
    pub index_token: TokenId,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub price: Price,
    pub fee: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecreasePositionEvent {
    pub key: PositionKey,
    pub account: AccountId,
    pub index_token: TokenId,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub price: Price,
    pub fee: Usd,
    pub usd_out: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePositionEvent {
    pub key: PositionKey,
    pub size: Usd,
    pub collateral: Usd,
    pub entry_price: Price,
    pub entry_funding_rate: U256,
    pub reserve_amount: Usd,
    pub realised_pnl: SignedUsd,
    pub mark_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosePositionEvent {
    pub key: PositionKey,
    pub size: Usd,
    pub collateral: Usd,
    pub entry_price: Price,
    pub entry_funding_rate: U256,
    pub reserve_amount: Usd,
    pub realised_pnl: SignedUsd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidatePositionEvent {
    pub key: PositionKey,
    pub account: AccountId,
    pub index_token: TokenId,
    pub side: Side,
    pub size: Usd,
    pub collateral: Usd,
    pub reserve_amount: Usd,
    pub realised_pnl: SignedUsd,
    pub mark_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePnlEvent {
    pub key: PositionKey,
    pub has_profit: bool,
    pub delta: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyUsdgEvent {
    pub account: AccountId,
    pub token_amount: Usd,
    pub usdg_amount: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellUsdgEvent {
    pub account: AccountId,
    pub usdg_amount: U256,
    pub token_amount: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFundingRateEvent {
    pub cumulative_funding_rate: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIncreaseOrderEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub amount: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub trigger_price: Price,
    pub trigger_above_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateIncreaseOrderEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub size_delta: Usd,
    pub trigger_price: Price,
    pub trigger_above_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteIncreaseOrderEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub amount: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub trigger_price: Price,
    pub execution_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDecreaseOrderEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub size_delta: Usd,
    pub collateral_delta: Usd,
    pub side: Side,
    pub trigger_price: Price,
    pub trigger_above_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDecreaseOrderEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub trigger_price: Price,
    pub trigger_above_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteDecreaseOrderEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub trigger_price: Price,
    pub execution_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub refunded: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIncreaseRequestEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub amount_in: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub block_time: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteIncreaseRequestEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub amount_in: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub time_gap: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDecreaseRequestEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub block_time: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteDecreaseRequestEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub token: TokenId,
    pub collateral_delta: Usd,
    pub size_delta: Usd,
    pub side: Side,
    pub time_gap: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequestEvent {
    pub account: AccountId,
    pub index: OrderIndex,
    pub refunded: Usd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMaxTimeDelayEvent {
    pub max_time_delay: u64,
}

/// Append-only event log shared by the stateful components.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
}

impl EventCollector {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
        }
    }

    pub fn emit(&mut self, timestamp: Timestamp, payload: EventPayload) {
        let event = Event {
            id: EventId(self.next_id),
            timestamp,
            payload,
        };
        self.next_id += 1;
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop everything emitted after `len` events. Used by the vault's
    /// transactional rollback.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_assigns_monotonic_ids() {
        let mut log = EventCollector::new();
        log.emit(
            Timestamp::from_secs(1),
            EventPayload::SetPaused(SetPausedEvent { paused: true }),
        );
        log.emit(
            Timestamp::from_secs(2),
            EventPayload::SetPaused(SetPausedEvent { paused: false }),
        );

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[0].id, EventId(1));
        assert_eq!(log.events()[1].id, EventId(2));
    }

    #[test]
    fn truncate_rolls_back_the_tail() {
        let mut log = EventCollector::new();
        for i in 0..5 {
            log.emit(
                Timestamp::from_secs(i),
                EventPayload::SetPaused(SetPausedEvent { paused: true }),
            );
        }
        log.truncate(2);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn events_serialize() {
        let event = Event {
            id: EventId(1),
            timestamp: Timestamp::from_secs(0),
            payload: EventPayload::BuyUsdg(BuyUsdgEvent {
                account: AccountId(1),
                token_amount: Usd::from(400_000_000u64),
                usdg_amount: U256::exp10(20) * U256::from(4u64),
            }),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
    }
}
