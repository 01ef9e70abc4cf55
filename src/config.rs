use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::explorer::{ExplorerConfig, RevealSchedule};
use crate::progress::{BandPolicy, Breakpoints};

const BAND_FACTOR_BOUNDS: (f64, f64) = (0.1, 2.0);
const VISIBILITY_LEAD_BOUNDS: (f64, f64) = (0.0, 2.0);
const VISIBILITY_TRAIL_BOUNDS: (f64, f64) = (1.0, 5.0);
const HYSTERESIS_BOUNDS: (f64, f64) = (0.0, 0.5);
const MOBILE_BREAKPOINT_BOUNDS: (f64, f64) = (320.0, 1_200.0);
const TABLET_BREAKPOINT_BOUNDS: (f64, f64) = (480.0, 2_000.0);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("engine config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tunables for the scroll engine. Every field is optional in the JSON form;
/// values outside their bounds fall back to the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub band: BandPolicy,
    pub explorer: ExplorerConfig,
}

fn within_bounds(value: f64, default: f64, bounds: (f64, f64)) -> f64 {
    if value.is_finite() && (bounds.0..=bounds.1).contains(&value) {
        value
    } else {
        default
    }
}

impl EngineConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let parsed: Self = serde_json::from_str(raw)?;
        Ok(parsed.sanitized())
    }

    /// Missing or malformed config is not fatal; the page keeps working with
    /// defaults.
    pub fn load_or_default(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::default();
        };

        match Self::from_json(raw) {
            Ok(config) => config,
            Err(error) => {
                log::warn!("{error}; using default engine config");
                Self::default()
            }
        }
    }

    pub fn sanitized(self) -> Self {
        let defaults = BandPolicy::default();
        let band = self.band;

        let breakpoints = {
            let mobile = within_bounds(
                band.breakpoints.mobile,
                defaults.breakpoints.mobile,
                MOBILE_BREAKPOINT_BOUNDS,
            );
            let tablet = within_bounds(
                band.breakpoints.tablet,
                defaults.breakpoints.tablet,
                TABLET_BREAKPOINT_BOUNDS,
            );
            if mobile < tablet {
                Breakpoints { mobile, tablet }
            } else {
                Breakpoints::default()
            }
        };

        let band = BandPolicy {
            desktop_factor: within_bounds(
                band.desktop_factor,
                defaults.desktop_factor,
                BAND_FACTOR_BOUNDS,
            ),
            mobile_factor: within_bounds(
                band.mobile_factor,
                defaults.mobile_factor,
                BAND_FACTOR_BOUNDS,
            ),
            visibility_lead: within_bounds(
                band.visibility_lead,
                defaults.visibility_lead,
                VISIBILITY_LEAD_BOUNDS,
            ),
            visibility_trail: within_bounds(
                band.visibility_trail,
                defaults.visibility_trail,
                VISIBILITY_TRAIL_BOUNDS,
            ),
            hysteresis: within_bounds(band.hysteresis, defaults.hysteresis, HYSTERESIS_BOUNDS),
            breakpoints,
        };

        let mut explorer = self.explorer;
        if !explorer.schedule.is_consistent() {
            explorer.schedule = RevealSchedule::default();
        }
        // the tooltip and the stacks share one notion of "mobile"
        explorer.breakpoints = breakpoints;

        Self { band, explorer }
    }
}
