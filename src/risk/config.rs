use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};

/// Typed risk configuration. Either `stop_loss_pct` or `use_atr_stop` (with
/// `atr_multiplier`) selects the stop-loss basis; either `take_profit_pct`
/// or `use_rr_ratio` (with `rr_ratio`) selects the take-profit basis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    pub max_position_size_pct: Decimal,
    pub risk_per_trade_pct: Decimal,
    pub stop_loss_pct: Option<Decimal>,
    pub use_atr_stop: bool,
    pub atr_multiplier: Option<Decimal>,
    pub take_profit_pct: Option<Decimal>,
    pub use_rr_ratio: bool,
    pub rr_ratio: Option<Decimal>,
    pub use_trailing_stop: bool,
    pub trailing_activation_pct: Decimal,
    pub trailing_distance_pct: Decimal,
    pub max_open_positions: usize,
    pub max_portfolio_risk_pct: Decimal,
}

impl RiskConfig {
    pub fn validate(&self) -> BotResult<()> {
        if self.max_position_size_pct <= Decimal::ZERO {
            return Err(BotError::InvalidConfig(
                "maxPositionSizePct must be > 0".into(),
            ));
        }
        if self.risk_per_trade_pct <= Decimal::ZERO {
            return Err(BotError::InvalidConfig("riskPerTradePct must be > 0".into()));
        }
        if self.use_atr_stop {
            if self.atr_multiplier.map(|m| m <= Decimal::ZERO).unwrap_or(true) {
                return Err(BotError::InvalidConfig(
                    "atrMult must be set and > 0 when useATRStop is true".into(),
                ));
            }
        } else if self.stop_loss_pct.map(|p| p <= Decimal::ZERO).unwrap_or(true) {
            return Err(BotError::InvalidConfig(
                "stopLossPct must be set and > 0 when useATRStop is false".into(),
            ));
        }
        if self.use_rr_ratio {
            if self.rr_ratio.map(|r| r <= Decimal::ZERO).unwrap_or(true) {
                return Err(BotError::InvalidConfig(
                    "rrRatio must be set and > 0 when useRRRatio is true".into(),
                ));
            }
        } else if self.take_profit_pct.map(|p| p <= Decimal::ZERO).unwrap_or(true) {
            return Err(BotError::InvalidConfig(
                "takeProfitPct must be set and > 0 when useRRRatio is false".into(),
            ));
        }
        if self.max_open_positions == 0 {
            return Err(BotError::InvalidConfig("maxOpenPositions must be > 0".into()));
        }
        if self.max_portfolio_risk_pct <= Decimal::ZERO {
            return Err(BotError::InvalidConfig(
                "maxPortfolioRiskPct must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> RiskConfig {
        RiskConfig {
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
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn atr_stop_requires_multiplier() {
        let cfg = RiskConfig {
            use_atr_stop: true,
            atr_multiplier: None,
            ..base()
        };
        assert!(cfg.validate().is_err());
    }
}
