// 3.0: oracle price feed. each token has a round store; get_price walks back
// over the last ROUND_SAMPLES rounds and returns the max or min, whichever the
// caller asked for. the adversarial choice always disfavours the user.
//
// Prices come back scaled to 18 decimals per whole token:
//   price = 10^36 * raw / price_unit / base_unit
// where price_unit = 10^feed_decimals and base_unit = 10^token_decimals.

use crate::math::{self, MathError};
use crate::types::{Price, TokenId};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// How many recent rounds the max/min is taken over.
pub const ROUND_SAMPLES: u64 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceFeedError {
    #[error("PriceFeed: invalid price")]
    InvalidPrice,

    #[error("PriceFeed: no feed configured for token {0:?}")]
    FeedNotFound(TokenId),

    #[error("price math: {0}")]
    Math(#[from] MathError),
}

/// A single oracle round. Raw answers are signed because upstream feeds are;
/// anything nonpositive poisons the whole lookback window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedRound {
    pub round_id: u64,
    pub answer: i128,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFeed {
    rounds: Vec<FeedRound>,
    /// 10^feed_decimals
    price_unit: U256,
    /// 10^token_decimals
    base_unit: U256,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceFeed {
    feeds: HashMap<TokenId, TokenFeed>,
}

impl PriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token feed. `feed_decimals` is the oracle's answer scale,
    /// `token_decimals` the token's own scale.
    pub fn config_token(&mut self, token: TokenId, feed_decimals: u32, token_decimals: u32) {
        self.feeds.insert(
            token,
            TokenFeed {
                rounds: Vec::new(),
                price_unit: U256::exp10(feed_decimals as usize),
                base_unit: U256::exp10(token_decimals as usize),
            },
        );
    }

    pub fn is_configured(&self, token: TokenId) -> bool {
        self.feeds.contains_key(&token)
    }

    /// Append a new round. Round ids are assigned monotonically.
    pub fn push_round(
        &mut self,
        token: TokenId,
        answer: i128,
        timestamp: u64,
    ) -> Result<u64, PriceFeedError> {
        let feed = self
            .feeds
            .get_mut(&token)
            .ok_or(PriceFeedError::FeedNotFound(token))?;
        let round_id = feed.rounds.last().map(|r| r.round_id + 1).unwrap_or(1);
        feed.rounds.push(FeedRound {
            round_id,
            answer,
            timestamp,
        });
        Ok(round_id)
    }

    /// Conservative price over the lookback window: max when `maximise`,
    /// min otherwise. Fails on an empty feed or any nonpositive answer.
    pub fn get_price(&self, token: TokenId, maximise: bool) -> Result<Price, PriceFeedError> {
        let feed = self
            .feeds
            .get(&token)
            .ok_or(PriceFeedError::FeedNotFound(token))?;

        let len = feed.rounds.len();
        if len == 0 {
            return Err(PriceFeedError::InvalidPrice);
        }

        let window = &feed.rounds[len.saturating_sub(ROUND_SAMPLES as usize)..];
        let mut selected: Option<i128> = None;
        for round in window {
            if round.answer <= 0 {
                return Err(PriceFeedError::InvalidPrice);
            }
            selected = Some(match selected {
                None => round.answer,
                Some(best) if maximise => best.max(round.answer),
                Some(best) => best.min(round.answer),
            });
        }

        let Some(answer) = selected else {
            return Err(PriceFeedError::InvalidPrice);
        };
        let raw = U256::from(answer as u128);
        let scaled = math::mul_div(raw, U256::exp10(36), feed.price_unit)?;
        Ok(scaled / feed.base_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bnb() -> TokenId {
        TokenId(1)
    }

    fn feed_with(answers: &[i128]) -> PriceFeed {
        let mut feed = PriceFeed::new();
        feed.config_token(bnb(), 8, 18);
        for (i, &answer) in answers.iter().enumerate() {
            feed.push_round(bnb(), answer, i as u64).unwrap();
        }
        feed
    }

    #[test]
    fn scales_to_eighteen_decimals() {
        // 300 with 8 feed decimals, 18 token decimals -> 300e18
        let feed = feed_with(&[300_0000_0000]);
        let price = feed.get_price(bnb(), true).unwrap();
        assert_eq!(price, U256::from(300u64) * U256::exp10(18));
    }

    #[test]
    fn six_decimal_token_gets_wider_price() {
        // for a 6-decimal dollar at $1, amount * price / 1e18 must give
        // 18-decimal output, so the per-unit price carries the extra 1e12
        let mut feed = PriceFeed::new();
        let usd = TokenId(9);
        feed.config_token(usd, 8, 6);
        feed.push_round(usd, 1_0000_0000, 0).unwrap();
        assert_eq!(feed.get_price(usd, false).unwrap(), U256::exp10(30));
    }

    #[test]
    fn max_and_min_over_window() {
        let feed = feed_with(&[100_0000_0000, 300_0000_0000, 200_0000_0000]);
        let max = feed.get_price(bnb(), true).unwrap();
        let min = feed.get_price(bnb(), false).unwrap();
        assert_eq!(max, U256::from(300u64) * U256::exp10(18));
        assert_eq!(min, U256::from(100u64) * U256::exp10(18));
    }

    #[test]
    fn window_is_three_rounds() {
        // the 50 round has scrolled out of the lookback window
        let feed = feed_with(&[50_0000_0000, 100_0000_0000, 120_0000_0000, 110_0000_0000]);
        let min = feed.get_price(bnb(), false).unwrap();
        assert_eq!(min, U256::from(100u64) * U256::exp10(18));
    }

    #[test]
    fn nonpositive_answer_in_window_fails() {
        let feed = feed_with(&[100_0000_0000, 0, 120_0000_0000]);
        assert_eq!(
            feed.get_price(bnb(), true),
            Err(PriceFeedError::InvalidPrice)
        );

        let feed = feed_with(&[100_0000_0000, -5, 120_0000_0000]);
        assert_eq!(
            feed.get_price(bnb(), false),
            Err(PriceFeedError::InvalidPrice)
        );
    }

    #[test]
    fn empty_and_unconfigured_feeds_fail() {
        let feed = feed_with(&[]);
        assert_eq!(
            feed.get_price(bnb(), true),
            Err(PriceFeedError::InvalidPrice)
        );
        assert!(matches!(
            feed.get_price(TokenId(77), true),
            Err(PriceFeedError::FeedNotFound(_))
        ));
    }
}
