use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::risk::RiskConfig;
use crate::safety::SafetyConfig;
use crate::strategies::{BbandsConfig, DcaConfig, MacdConfig, RsiConfig};
use crate::timeframe::IndicatorConfig;
use crate::types::Timeframe;

/// The instrument this process trades. Sizing is in either a fixed base-asset
/// `quantity` or a `quote_amount` to spend per entry -- exactly one must be
/// set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub quantity: Option<Decimal>,
    pub quote_amount: Option<Decimal>,
}

/// Indicator periods plus the five-phase strategy's threshold parameters.
/// Periods feed the multi-timeframe manager's daily/hourly/five-minute
/// registrations; thresholds feed the strategy itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiTimeframeParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: Decimal,
    pub rsi_oversold: Decimal,
    pub rsi_overbought: Decimal,
    pub rsi_neutral_low: Decimal,
    pub rsi_neutral_high: Decimal,
    pub macd_min_histogram: Decimal,
    pub bb_min_width: Decimal,
    pub bb_max_width: Decimal,
    pub require_daily_confirmation: bool,
    pub require_hourly_signal: bool,
    pub require_5m_entry: bool,
}

impl MultiTimeframeParams {
    pub fn thresholds(&self) -> crate::strategies::MultiTimeframeConfig {
        crate::strategies::MultiTimeframeConfig {
            rsi_oversold: self.rsi_oversold,
            rsi_overbought: self.rsi_overbought,
            rsi_neutral_low: self.rsi_neutral_low,
            rsi_neutral_high: self.rsi_neutral_high,
            macd_min_histogram: self.macd_min_histogram,
            bb_min_width: self.bb_min_width,
            bb_max_width: self.bb_max_width,
            require_daily_confirmation: self.require_daily_confirmation,
            require_hourly_signal: self.require_hourly_signal,
            require_5m_entry: self.require_5m_entry,
        }
    }

    /// Registration list for `MultiTimeframeManager::new`: daily and hourly
    /// carry the full RSI/MACD/Bollinger set, five-minute carries RSI/MACD
    /// only -- matching what the strategy's entry-precision phase reads.
    pub fn manager_registrations(&self) -> Vec<(Timeframe, IndicatorConfig)> {
        let full = IndicatorConfig {
            rsi_period: Some(self.rsi_period),
            macd: Some((self.macd_fast, self.macd_slow, self.macd_signal)),
            bollinger: Some((self.bb_period, self.bb_std_dev)),
            atr_period: None,
        };
        let entry_only = IndicatorConfig {
            rsi_period: Some(self.rsi_period),
            macd: Some((self.macd_fast, self.macd_slow, self.macd_signal)),
            bollinger: None,
            atr_period: None,
        };
        vec![
            (Timeframe::D1, full),
            (Timeframe::H1, full),
            (Timeframe::M5, entry_only),
        ]
    }
}

/// Strategy selection, tagged by `type` on the configuration surface. Each
/// variant carries exactly the parameters its strategy needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategySelection {
    Rsi(RsiConfig),
    Macd(MacdConfig),
    Bbands(BbandsConfig),
    Dca(DcaConfig),
    Multitimeframe(MultiTimeframeParams),
}

/// Everything read from the TOML file and environment, minus exchange
/// credentials, which live only in `ExchangeConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    pub instrument: InstrumentConfig,
    pub trading_enabled: bool,
    pub strategy: StrategySelection,
    pub risk: RiskConfig,
    pub safety: SafetyConfig,
    pub log_level: String,
    pub ledger_path: String,
    pub portfolio_value: Decimal,
    #[serde(default = "default_max_candles")]
    pub max_candles: usize,
}

fn default_max_candles() -> usize {
    200
}

impl RuntimeConfig {
    /// Aggregates every configuration violation in one pass rather than
    /// failing on the first -- an operator fixing a config file wants the
    /// whole list, not one error per run.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.instrument.symbol.trim().is_empty() {
            errors.push("instrument.symbol must not be empty".into());
        }
        match (self.instrument.quantity, self.instrument.quote_amount) {
            (None, None) => errors.push(
                "instrument must set exactly one of quantity or quoteAmount".into(),
            ),
            (Some(_), Some(_)) => errors.push(
                "instrument must set exactly one of quantity or quoteAmount, not both".into(),
            ),
            _ => {}
        }
        if let Some(q) = self.instrument.quantity {
            if q <= Decimal::ZERO {
                errors.push("instrument.quantity must be > 0".into());
            }
        }
        if let Some(q) = self.instrument.quote_amount {
            if q <= Decimal::ZERO {
                errors.push("instrument.quoteAmount must be > 0".into());
            }
        }
        if let Err(e) = self.risk.validate() {
            errors.push(e.to_string());
        }
        if self.portfolio_value <= Decimal::ZERO {
            errors.push("portfolioValue must be > 0".into());
        }
        if self.max_candles == 0 {
            errors.push("maxCandles must be > 0".into());
        }
        if self.ledger_path.trim().is_empty() {
            errors.push("ledgerPath must not be empty".into());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Exchange credentials and venue override. Deliberately never derives
/// `Deserialize` against the TOML source -- assembled only from environment
/// variables so a committed config file can never leak a key.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskConfig;
    use crate::safety::{
        CircuitBreakerConfig, LiquidityConfig, PositionLimitsConfig, RateLimitConfig,
        RecoveryConfig, RetryStrategyKind, SafetyConfig,
    };
    use crate::strategies::RsiConfig;
    use rust_decimal_macros::dec;

    fn base() -> RuntimeConfig {
        RuntimeConfig {
            instrument: InstrumentConfig {
                symbol: "BTCUSDT".into(),
                quantity: Some(dec!(0.01)),
                quote_amount: None,
            },
            trading_enabled: false,
            strategy: StrategySelection::Rsi(RsiConfig {
                period: 14,
                overbought: dec!(70),
                oversold: dec!(30),
            }),
            risk: RiskConfig {
                max_position_size_pct: dec!(25),
                risk_per_trade_pct: dec!(1),
                stop_loss_pct: Some(dec!(3)),
                use_atr_stop: false,
                atr_multiplier: None,
                take_profit_pct: Some(dec!(6)),
                use_rr_ratio: false,
                rr_ratio: None,
                use_trailing_stop: false,
                trailing_activation_pct: dec!(4),
                trailing_distance_pct: dec!(2),
                max_open_positions: 1,
                max_portfolio_risk_pct: dec!(10),
            },
            safety: SafetyConfig {
                enabled: true,
                circuit_breaker: CircuitBreakerConfig {
                    max_failures: 5,
                    reset_timeout_ms: 30_000,
                },
                rate_limit: RateLimitConfig {
                    max_requests: 10,
                    interval_ms: 1_000,
                },
                liquidity: LiquidityConfig {
                    min_depth: dec!(1),
                    min_total_volume: dec!(10),
                    max_spread_pct: dec!(1),
                    min_volume_multiplier: dec!(2),
                },
                position_limits: PositionLimitsConfig {
                    max_position_size_usd: dec!(1000),
                    max_portfolio_pct: dec!(50),
                    max_daily_loss_usd: dec!(200),
                    max_total_positions: 3,
                },
                recovery: RecoveryConfig {
                    strategy: RetryStrategyKind::Exponential,
                    max_retries: 3,
                    base_delay_ms: 500,
                    max_delay_ms: 5_000,
                },
            },
            log_level: "info".into(),
            ledger_path: "ledger.db".into(),
            portfolio_value: dec!(10_000),
            max_candles: 200,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_missing_sizing_basis() {
        let mut cfg = base();
        cfg.instrument.quantity = None;
        cfg.instrument.quote_amount = None;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("quantity or quoteAmount")));
    }

    #[test]
    fn rejects_both_sizing_bases_set() {
        let mut cfg = base();
        cfg.instrument.quote_amount = Some(dec!(100));
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("not both")));
    }

    #[test]
    fn rejects_zero_portfolio_value() {
        let mut cfg = base();
        cfg.portfolio_value = Decimal::ZERO;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("portfolioValue")));
    }

    #[test]
    fn multi_timeframe_params_split_into_thresholds_and_registrations() {
        let params = MultiTimeframeParams {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: dec!(2),
            rsi_oversold: dec!(30),
            rsi_overbought: dec!(70),
            rsi_neutral_low: dec!(45),
            rsi_neutral_high: dec!(55),
            macd_min_histogram: dec!(0.001),
            bb_min_width: dec!(1),
            bb_max_width: dec!(10),
            require_daily_confirmation: true,
            require_hourly_signal: true,
            require_5m_entry: true,
        };
        let regs = params.manager_registrations();
        assert_eq!(regs.len(), 3);
        let five_min = regs
            .iter()
            .find(|(tf, _)| *tf == Timeframe::M5)
            .unwrap();
        assert!(five_min.1.bollinger.is_none());
        assert!(params.thresholds().require_daily_confirmation);
    }
}
