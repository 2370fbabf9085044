//! Statement data types.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::lead_sheet::{LeadSheet, StatementKind};

/// Two derived totals within this distance of each other are considered equal.
pub const TIE_OUT_TOLERANCE: Decimal = dec!(0.01);

/// Period-over-period movements at or below this magnitude are immaterial.
pub const MATERIALITY_THRESHOLD: Decimal = dec!(0.005);

/// Whether two figures tie within [`TIE_OUT_TOLERANCE`].
#[must_use]
pub fn ties(left: Decimal, right: Decimal) -> bool {
    (left - right).abs() < TIE_OUT_TOLERANCE
}

/// A displayable statement row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLineItem {
    /// Row label.
    pub label: String,
    /// Current-period amount in display sign.
    pub amount: Decimal,
    /// Prior-period amount, when a comparison period was supplied.
    pub prior_amount: Option<Decimal>,
    /// Indentation depth.
    pub indent_level: u8,
    /// Section subtotal row.
    pub is_subtotal: bool,
    /// Statement total row.
    pub is_total: bool,
    /// Lead sheet the amount comes from.
    pub lead_sheet_ref: Option<LeadSheet>,
}

impl StatementLineItem {
    /// Period-over-period change, when a prior amount exists.
    #[must_use]
    pub fn change(&self) -> Option<Decimal> {
        self.prior_amount.map(|prior| self.amount - prior)
    }
}

/// Headline figures of the derived statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementTotals {
    /// Total assets.
    pub total_assets: Decimal,
    /// Total liabilities.
    pub total_liabilities: Decimal,
    /// Total equity including current-period net income.
    pub total_equity: Decimal,
    /// Liabilities plus equity.
    pub total_liabilities_and_equity: Decimal,
    /// `total_assets - total_liabilities_and_equity`.
    pub balance_difference: Decimal,
    /// Whether the balance difference is within tolerance.
    pub is_balanced: bool,
    /// Revenue.
    pub revenue: Decimal,
    /// Revenue less cost of goods sold.
    pub gross_profit: Decimal,
    /// Gross profit less operating expenses.
    pub operating_income: Decimal,
    /// Net income.
    pub net_income: Decimal,
}

/// One section of the cash-flow statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowSection {
    /// Section line items.
    pub items: Vec<StatementLineItem>,
    /// Sum of the line items.
    pub subtotal: Decimal,
}

impl CashFlowSection {
    pub(crate) fn push(&mut self, item: StatementLineItem) {
        self.subtotal += item.amount;
        self.items.push(item);
    }
}

/// Indirect-method cash-flow statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    /// Operating activities.
    pub operating: CashFlowSection,
    /// Investing activities.
    pub investing: CashFlowSection,
    /// Financing activities.
    pub financing: CashFlowSection,
    /// Sum of the three section subtotals.
    pub net_change: Decimal,
    /// Prior-period cash.
    pub beginning_cash: Decimal,
    /// `beginning_cash + net_change`.
    pub ending_cash: Decimal,
    /// Cash reported by the current grouping.
    pub actual_ending_cash: Decimal,
    /// `ending_cash - actual_ending_cash`.
    pub reconciliation_difference: Decimal,
    /// Whether the reconciliation difference is within tolerance.
    pub is_reconciled: bool,
}

/// Account detail shown when drilling into a trace entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceAccount {
    /// Account name.
    pub account: String,
    /// Debit balance.
    pub debit: Decimal,
    /// Credit balance.
    pub credit: Decimal,
    /// Debit minus credit.
    pub net: Decimal,
    /// Classification confidence.
    pub confidence: Decimal,
}

/// Tie-out of one statement line back to its accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTraceEntry {
    /// Statement line label.
    pub statement_line: String,
    /// Statement the line appears on.
    pub statement: StatementKind,
    /// Source lead sheet.
    pub lead_sheet: LeadSheet,
    /// Whether the grouping contained the lead sheet at all.
    pub present: bool,
    /// Net balance reported by the lead-sheet summary.
    pub summary_net_balance: Decimal,
    /// Amount as shown on the statement.
    pub statement_amount: Decimal,
    /// Whether the statement amount is sign-flipped.
    pub sign_flipped: bool,
    /// Net balance re-summed from the accounts.
    pub account_net_total: Decimal,
    /// `summary_net_balance - account_net_total`.
    pub difference: Decimal,
    /// Whether the difference is within tolerance.
    pub is_tied: bool,
    /// Underlying accounts.
    pub accounts: Vec<TraceAccount>,
}

/// Everything derived from one grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialStatements {
    /// Balance sheet rows.
    pub balance_sheet: Vec<StatementLineItem>,
    /// Income statement rows.
    pub income_statement: Vec<StatementLineItem>,
    /// Cash-flow statement; requires a prior period.
    pub cash_flow: Option<CashFlowStatement>,
    /// One tie-out entry per mapped lead sheet.
    pub mapping_trace: Vec<MappingTraceEntry>,
    /// Headline figures.
    pub totals: StatementTotals,
    /// Mapped lead sheets absent from the current grouping. Their lines are
    /// zero-filled.
    pub missing_lead_sheets: Vec<LeadSheet>,
}

impl FinancialStatements {
    /// Whether every trace entry ties.
    #[must_use]
    pub fn all_tied(&self) -> bool {
        self.mapping_trace.iter().all(|entry| entry.is_tied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ties_is_strict_at_tolerance() {
        assert!(ties(dec!(100.00), dec!(100.009)));
        assert!(!ties(dec!(100.00), dec!(100.01)));
        assert!(!ties(dec!(100.00), dec!(99.98)));
    }

    #[test]
    fn test_section_push_accumulates_subtotal() {
        let item = |amount| StatementLineItem {
            label: "x".to_string(),
            amount,
            prior_amount: None,
            indent_level: 1,
            is_subtotal: false,
            is_total: false,
            lead_sheet_ref: None,
        };
        let mut section = CashFlowSection::default();
        section.push(item(dec!(12.5)));
        section.push(item(dec!(-2.5)));

        assert_eq!(section.subtotal, dec!(10));
        assert_eq!(section.items.len(), 2);
    }
}
