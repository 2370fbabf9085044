//! Financial statement derivation.
//!
//! This module turns a lead-sheet grouping into:
//! - Balance Sheet
//! - Income Statement
//! - Cash-Flow Statement (indirect method, needs a prior period)
//! - Mapping Trace (statement line to account tie-out)

pub mod builder;
mod cash_flow;
pub mod lead_sheet;
mod trace;
pub mod types;


pub use builder::StatementBuilder;
pub use lead_sheet::{
    LeadSheet, LeadSheetAccount, LeadSheetError, LeadSheetGrouping, LeadSheetSummary,
    StatementKind,
};
pub use types::*;
