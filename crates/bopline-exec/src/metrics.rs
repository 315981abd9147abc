//! Metrics hooks.
//!
//! Stats go out as structured `tracing` events; exporting them is left to
//! whatever subscriber the binary installs.

use bopline_core::id::BopId;

use crate::stats::StatsSnapshot;

pub fn record_operator_stats(bop: BopId, operator: &str, stats: &StatsSnapshot) {
    tracing::debug!(
        bop = %bop,
        operator,
        chunks_in = stats.chunks_in,
        units_in = stats.units_in,
        chunks_out = stats.chunks_out,
        units_out = stats.units_out,
        "operator stats"
    );
}
