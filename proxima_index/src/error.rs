// Copyright 2025 the Proxima Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors raised when configuring a backend.

use thiserror::Error;

/// Invalid node fan-out for an [`RTree`][crate::backends::RTree].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Nodes must be allowed to hold at least one child after a split.
    #[error("min_children must be at least 1")]
    MinChildrenZero,
    /// An overflowing node (`max_children + 1` entries) must split into two
    /// halves that both respect `min_children`.
    #[error(
        "max_children ({max_children}) must be at least 2 and at least 2 * min_children - 1 (min_children = {min_children})"
    )]
    MaxChildrenTooSmall {
        /// Requested maximum fan-out.
        max_children: usize,
        /// Requested minimum fan-out.
        min_children: usize,
    },
}
