// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use proxima_index::ConfigError;
use proxima_index::backends::{DEFAULT_MAX_CHILDREN, DEFAULT_MIN_CHILDREN, RTreeF64};

/// How [`distance_test`](crate::SpatialQueryEngine::distance_test) decides that two objects
/// are within `distance` of each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// The second object's box overlaps the first object's box grown by `distance`.
    ///
    /// Cheap but approximate: corners of the grown box reach further than `distance`.
    #[default]
    AabbExpansion,
    /// As [`AabbExpansion`](Self::AabbExpansion), and additionally the centers of the two
    /// objects are strictly closer than `distance`.
    Centers,
}

/// Engine configuration.
///
/// The default matches the classic R-tree fan-out of 9 children per node with 4 kept
/// after a split, and approximate box-based distances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionsConfig {
    /// Maximum children per R-tree node.
    pub max_children: usize,
    /// Minimum children per R-tree node after a split.
    pub min_children: usize,
    /// Distance metric for distance queries.
    pub distance_metric: DistanceMetric,
}

impl Default for PositionsConfig {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
            min_children: DEFAULT_MIN_CHILDREN,
            distance_metric: DistanceMetric::default(),
        }
    }
}

impl PositionsConfig {
    /// Same configuration with another distance metric.
    pub fn with_distance_metric(mut self, metric: DistanceMetric) -> Self {
        self.distance_metric = metric;
        self
    }

    /// Build the prototype R-tree every per-type index is cloned from.
    pub(crate) fn rtree(&self) -> Result<RTreeF64, ConfigError> {
        RTreeF64::with_fanout(self.max_children, self.min_children)
    }
}
