use crate::{
    error::{TransitError, TransitResult},
    types::Cents,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "fare_config.json";

/// Tariff and policy knobs for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FareConfig {
    /// Charged per stop travelled.
    pub rate_per_stop: Cents,
    /// The most a single trip can ever cost.
    pub trip_cap: Cents,
    /// Balance for cards issued without one.
    pub default_balance: Cents,
    /// Max gap between the previous tap and a transfer tap.
    /// `None` means transfers never expire.
    pub transfer_window_minutes: Option<i64>,
    /// Amounts a rider may top up a card with.
    pub reload_amounts: Vec<Cents>,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            rate_per_stop:           50,
            trip_cap:                600,
            default_balance:         1900,
            transfer_window_minutes: Some(120),
            reload_amounts:          vec![1000, 2000, 5000],
        }
    }
}

impl FareConfig {
    /// Load from `<data_dir>/fare_config.json`.
    /// A missing file means "use the defaults".
    /// In tests, use FareConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = Path::new(data_dir).join(CONFIG_FILE);
        if !path.exists() {
            log::info!("No {} found, using default tariff", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: FareConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// $1 per stop, $6 cap, two-hour transfers.
    pub fn default_test() -> Self {
        Self {
            rate_per_stop: 100,
            trip_cap:      600,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> TransitResult<()> {
        if self.rate_per_stop < 0 {
            return Err(TransitError::Config(format!(
                "rate_per_stop must be >= 0, got {}",
                self.rate_per_stop
            )));
        }
        if self.trip_cap < 0 {
            return Err(TransitError::Config(format!(
                "trip_cap must be >= 0, got {}",
                self.trip_cap
            )));
        }
        if let Some(window) = self.transfer_window_minutes {
            if window < 0 {
                return Err(TransitError::Config(format!(
                    "transfer_window_minutes must be >= 0, got {window}"
                )));
            }
            if chrono::Duration::try_minutes(window).is_none() {
                return Err(TransitError::Config(format!(
                    "transfer_window_minutes is too large, got {window}"
                )));
            }
        }
        if self.reload_amounts.iter().any(|a| *a <= 0) {
            return Err(TransitError::Config(
                "reload_amounts must all be positive".into(),
            ));
        }
        Ok(())
    }

    /// `None` when transfers never expire. A window too large to represent
    /// also never expires; `validate` refuses such configs up front.
    pub fn transfer_window(&self) -> Option<chrono::Duration> {
        self.transfer_window_minutes.and_then(chrono::Duration::try_minutes)
    }

    /// Fare for riding `stops` stops, before the trip cap is applied.
    pub fn fare_for(&self, stops: u32) -> Cents {
        self.rate_per_stop.saturating_mul(i64::from(stops))
    }
}
