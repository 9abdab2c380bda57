//! General application configuration.

use serde::{Deserialize, Serialize};

/// Default trailing window of the NC monthly trend.
const fn default_trend_months() -> u32 {
    12
}

/// Default result limit for list endpoints.
const fn default_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Months shown by the dashboard trend when the caller does not say.
    #[serde(default = "default_trend_months")]
    pub trend_months: u32,

    #[serde(default = "default_limit")]
    pub default_limit: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            trend_months: default_trend_months(),
            default_limit: default_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = GeneralConfig::default();
        assert_eq!(config.trend_months, 12);
        assert_eq!(config.default_limit, 50);
    }
}
