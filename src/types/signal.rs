use rust_decimal::Decimal;

/// Strategy output for one tick. Not persisted; consumed once by the
/// orchestrator and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalAction {
    Buy,
    Sell,
    None,
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub action: SignalAction,
    pub reason: String,
    pub suggested_quantity: Option<Decimal>,
}

impl Signal {
    pub fn none(reason: impl Into<String>) -> Self {
        Self {
            action: SignalAction::None,
            reason: reason.into(),
            suggested_quantity: None,
        }
    }

    pub fn buy(reason: impl Into<String>) -> Self {
        Self {
            action: SignalAction::Buy,
            reason: reason.into(),
            suggested_quantity: None,
        }
    }

    pub fn buy_with_quantity(reason: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            action: SignalAction::Buy,
            reason: reason.into(),
            suggested_quantity: Some(quantity),
        }
    }

    pub fn sell(reason: impl Into<String>) -> Self {
        Self {
            action: SignalAction::Sell,
            reason: reason.into(),
            suggested_quantity: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.action != SignalAction::None
    }
}
