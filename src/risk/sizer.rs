use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{BotError, BotResult};

use super::config::RiskConfig;

/// Concrete sizing for a candidate entry: quantity plus stop-loss /
/// take-profit levels and the risk metrics a caller can log or gate on.
#[derive(Debug, Clone, Copy)]
pub struct SizingResult {
    pub quantity: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub risk_amount: Decimal,
    pub potential_profit: Decimal,
    pub position_value: Decimal,
    pub risk_reward_ratio: Option<Decimal>,
    pub max_loss_percent: Decimal,
}

pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> BotResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// `atr` is required when the config selects an ATR-based stop.
    pub fn calculate(
        &self,
        portfolio_value: Decimal,
        entry_price: Decimal,
        atr: Option<Decimal>,
    ) -> BotResult<SizingResult> {
        if entry_price <= Decimal::ZERO {
            return Err(BotError::InvalidInput("entry price must be > 0".into()));
        }

        let stop_loss = if self.config.use_atr_stop {
            let atr = atr.ok_or_else(|| {
                BotError::InvalidInput("ATR value required for ATR-based stop".into())
            })?;
            let multiplier = self
                .config
                .atr_multiplier
                .expect("validated at construction");
            entry_price - atr * multiplier
        } else {
            let pct = self.config.stop_loss_pct.expect("validated at construction");
            entry_price * (Decimal::ONE - pct / Decimal::from(100))
        };

        if stop_loss >= entry_price {
            return Err(BotError::InvalidConfig(
                "computed stop loss is not below entry price".into(),
            ));
        }

        let take_profit = if self.config.use_rr_ratio {
            let rr = self.config.rr_ratio.expect("validated at construction");
            entry_price + (entry_price - stop_loss) * rr
        } else {
            let pct = self.config.take_profit_pct.expect("validated at construction");
            entry_price * (Decimal::ONE + pct / Decimal::from(100))
        };

        let max_risk_amount = portfolio_value * self.config.risk_per_trade_pct / Decimal::from(100);
        let max_position_value = portfolio_value * self.config.max_position_size_pct / Decimal::from(100);
        let risk_per_unit = entry_price - stop_loss;

        let quantity = (max_risk_amount / risk_per_unit).min(max_position_value / entry_price);

        let position_value = quantity * entry_price;
        let risk_amount = quantity * risk_per_unit;
        let potential_profit = quantity * (take_profit - entry_price);
        let risk_reward_ratio = if risk_amount.is_zero() {
            None
        } else {
            Some(potential_profit / risk_amount)
        };
        let max_loss_percent = if portfolio_value.is_zero() {
            Decimal::ZERO
        } else {
            risk_amount / portfolio_value * Decimal::from(100)
        };

        debug!(
            %quantity, %stop_loss, %take_profit, %risk_amount,
            "sized candidate entry"
        );

        Ok(SizingResult {
            quantity,
            stop_loss,
            take_profit,
            risk_amount,
            potential_profit,
            position_value,
            risk_reward_ratio,
            max_loss_percent,
        })
    }

    /// Fails when opening another position would breach the open-position
    /// count or the aggregate portfolio risk budget.
    pub fn validate_portfolio(
        &self,
        open_count: usize,
        new_risk_pct: Decimal,
        existing_total_risk_pct: Decimal,
    ) -> BotResult<()> {
        if open_count >= self.config.max_open_positions {
            return Err(BotError::InvalidInput(format!(
                "max open positions reached: {open_count} >= {}",
                self.config.max_open_positions
            )));
        }
        let projected = existing_total_risk_pct + new_risk_pct;
        if projected > self.config.max_portfolio_risk_pct {
            return Err(BotError::PositionOverPortfolioPct {
                pct: projected.to_string(),
                max_pct: self.config.max_portfolio_risk_pct.to_string(),
            });
        }
        if new_risk_pct > self.config.risk_per_trade_pct {
            return Err(BotError::InvalidInput(format!(
                "trade risk {new_risk_pct}% exceeds per-trade limit {}%",
                self.config.risk_per_trade_pct
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> RiskSizer {
        RiskSizer::new(RiskConfig {
            max_position_size_pct: dec!(25),
            risk_per_trade_pct: dec!(1),
            stop_loss_pct: Some(dec!(3)),
            use_atr_stop: false,
            atr_multiplier: None,
            take_profit_pct: Some(dec!(6)),
            use_rr_ratio: false,
            rr_ratio: None,
            use_trailing_stop: true,
            trailing_activation_pct: dec!(4),
            trailing_distance_pct: dec!(2),
            max_open_positions: 3,
            max_portfolio_risk_pct: dec!(10),
        })
        .unwrap()
    }

    #[test]
    fn stop_loss_below_entry_and_positive_quantity() {
        let result = sizer().calculate(dec!(10000), dec!(100), None).unwrap();
        assert!(result.stop_loss < dec!(100));
        assert!(result.quantity > Decimal::ZERO);
    }

    #[test]
    fn atr_stop_requires_atr_value() {
        let cfg = RiskConfig {
            use_atr_stop: true,
            atr_multiplier: Some(dec!(2)),
            ..RiskConfig {
                max_position_size_pct: dec!(25),
                risk_per_trade_pct: dec!(1),
                stop_loss_pct: None,
                use_atr_stop: true,
                atr_multiplier: Some(dec!(2)),
                take_profit_pct: Some(dec!(6)),
                use_rr_ratio: false,
                rr_ratio: None,
                use_trailing_stop: true,
                trailing_activation_pct: dec!(4),
                trailing_distance_pct: dec!(2),
                max_open_positions: 3,
                max_portfolio_risk_pct: dec!(10),
            }
        };
        let sizer = RiskSizer::new(cfg).unwrap();
        assert!(sizer.calculate(dec!(10000), dec!(100), None).is_err());
        assert!(sizer.calculate(dec!(10000), dec!(100), Some(dec!(2))).is_ok());
    }

    #[test]
    fn portfolio_guard_rejects_excess_risk() {
        let sizer = sizer();
        assert!(sizer.validate_portfolio(1, dec!(2), dec!(9)).is_err());
        assert!(sizer.validate_portfolio(5, dec!(1), dec!(0)).is_err());
        assert!(sizer.validate_portfolio(0, dec!(1), dec!(0)).is_ok());
    }
}
