// Copyright 2017 Matthew Plant. This file is part of MGF2D.
//
// MGF2D is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// MGF2D is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with MGF2D. If not, see <http://www.gnu.org/licenses/>.

//! Broad phase tuning, loadable from RON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::AABB_MARGIN;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("AABB margin must be finite and non-negative, got {0}")]
    InvalidMargin(f32),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialize(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadPhaseConfig {
    /// Distance a fat AABB extends beyond the tight AABB it was built from.
    pub aabb_margin: f32,
    pub initial_proxy_capacity: usize,
    pub initial_pair_capacity: usize,
    /// Rebuild every tree from scratch in `rebuild_trees` instead of only the
    /// enlarged parts.
    pub full_rebuild: bool,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        BroadPhaseConfig {
            aabb_margin: AABB_MARGIN,
            initial_proxy_capacity: 16,
            initial_pair_capacity: 32,
            full_rebuild: false,
        }
    }
}

impl BroadPhaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.aabb_margin.is_finite() || self.aabb_margin < 0.0 {
            return Err(ConfigError::InvalidMargin(self.aabb_margin));
        }
        Ok(())
    }

    /// Parses and validates a RON document. Missing fields take their
    /// default values.
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigError> {
        let config: BroadPhaseConfig = ron::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, Default::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}
