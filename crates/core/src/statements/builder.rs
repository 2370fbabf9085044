//! Statement derivation from lead-sheet groupings.

use rust_decimal::Decimal;

use super::cash_flow;
use super::lead_sheet::{LeadSheet, LeadSheetGrouping};
use super::trace;
use super::types::{
    CashFlowStatement, FinancialStatements, MappingTraceEntry, StatementLineItem,
    StatementTotals, ties,
};

/// Display-sign amounts of one period, indexed by mapped lead sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PeriodFigures {
    amounts: [Decimal; 15],
}

impl PeriodFigures {
    pub(crate) fn from_grouping(grouping: &LeadSheetGrouping) -> Self {
        let mut amounts = [Decimal::ZERO; 15];
        for (slot, sheet) in amounts.iter_mut().zip(LeadSheet::MAPPED) {
            *slot = sheet.display_amount(grouping.net_balance(sheet));
        }
        Self { amounts }
    }

    pub(crate) fn get(&self, sheet: LeadSheet) -> Decimal {
        sheet
            .mapped_index()
            .map_or(Decimal::ZERO, |index| self.amounts[index])
    }

    fn sum(&self, sheets: &[LeadSheet]) -> Decimal {
        sheets.iter().map(|sheet| self.get(*sheet)).sum()
    }

    fn current_assets(&self) -> Decimal {
        self.sum(&[LeadSheet::A, LeadSheet::B, LeadSheet::C, LeadSheet::D])
    }

    fn non_current_assets(&self) -> Decimal {
        self.sum(&[LeadSheet::E, LeadSheet::F])
    }

    fn total_assets(&self) -> Decimal {
        self.current_assets() + self.non_current_assets()
    }

    fn current_liabilities(&self) -> Decimal {
        self.sum(&[LeadSheet::G, LeadSheet::H])
    }

    fn non_current_liabilities(&self) -> Decimal {
        self.sum(&[LeadSheet::I, LeadSheet::J])
    }

    fn total_liabilities(&self) -> Decimal {
        self.current_liabilities() + self.non_current_liabilities()
    }

    fn total_equity(&self) -> Decimal {
        self.get(LeadSheet::K) + self.net_income()
    }

    fn total_liabilities_and_equity(&self) -> Decimal {
        self.total_liabilities() + self.total_equity()
    }

    fn revenue(&self) -> Decimal {
        self.get(LeadSheet::L)
    }

    fn gross_profit(&self) -> Decimal {
        self.revenue() - self.get(LeadSheet::M)
    }

    fn operating_income(&self) -> Decimal {
        self.gross_profit() - self.get(LeadSheet::N)
    }

    pub(crate) fn net_income(&self) -> Decimal {
        self.operating_income() + self.get(LeadSheet::O)
    }

    fn totals(&self) -> StatementTotals {
        let total_assets = self.total_assets();
        let total_liabilities_and_equity = self.total_liabilities_and_equity();
        let balance_difference = total_assets - total_liabilities_and_equity;

        StatementTotals {
            total_assets,
            total_liabilities: self.total_liabilities(),
            total_equity: self.total_equity(),
            total_liabilities_and_equity,
            balance_difference,
            is_balanced: ties(total_assets, total_liabilities_and_equity),
            revenue: self.revenue(),
            gross_profit: self.gross_profit(),
            operating_income: self.operating_income(),
            net_income: self.net_income(),
        }
    }
}

#[derive(Clone, Copy)]
enum Row {
    Sheet(LeadSheet),
    Subtotal(&'static str, fn(&PeriodFigures) -> Decimal),
    Total(&'static str, fn(&PeriodFigures) -> Decimal),
    Derived(&'static str, fn(&PeriodFigures) -> Decimal),
}

const BALANCE_SHEET_ROWS: &[Row] = &[
    Row::Sheet(LeadSheet::A),
    Row::Sheet(LeadSheet::B),
    Row::Sheet(LeadSheet::C),
    Row::Sheet(LeadSheet::D),
    Row::Subtotal("Total Current Assets", PeriodFigures::current_assets),
    Row::Sheet(LeadSheet::E),
    Row::Sheet(LeadSheet::F),
    Row::Subtotal("Total Non-Current Assets", PeriodFigures::non_current_assets),
    Row::Total("Total Assets", PeriodFigures::total_assets),
    Row::Sheet(LeadSheet::G),
    Row::Sheet(LeadSheet::H),
    Row::Subtotal("Total Current Liabilities", PeriodFigures::current_liabilities),
    Row::Sheet(LeadSheet::I),
    Row::Sheet(LeadSheet::J),
    Row::Subtotal(
        "Total Non-Current Liabilities",
        PeriodFigures::non_current_liabilities,
    ),
    Row::Total("Total Liabilities", PeriodFigures::total_liabilities),
    Row::Sheet(LeadSheet::K),
    Row::Derived("Current Period Net Income", PeriodFigures::net_income),
    Row::Subtotal("Total Equity", PeriodFigures::total_equity),
    Row::Total(
        "Total Liabilities & Equity",
        PeriodFigures::total_liabilities_and_equity,
    ),
];

const INCOME_STATEMENT_ROWS: &[Row] = &[
    Row::Sheet(LeadSheet::L),
    Row::Sheet(LeadSheet::M),
    Row::Subtotal("Gross Profit", PeriodFigures::gross_profit),
    Row::Sheet(LeadSheet::N),
    Row::Subtotal("Operating Income", PeriodFigures::operating_income),
    Row::Sheet(LeadSheet::O),
    Row::Total("Net Income", PeriodFigures::net_income),
];

impl Row {
    fn label(self) -> &'static str {
        match self {
            Self::Sheet(sheet) => sheet.standard_name().unwrap_or_default(),
            Self::Subtotal(label, _) | Self::Total(label, _) | Self::Derived(label, _) => label,
        }
    }

    fn amount(self, figures: &PeriodFigures) -> Decimal {
        match self {
            Self::Sheet(sheet) => figures.get(sheet),
            Self::Subtotal(_, pick) | Self::Total(_, pick) | Self::Derived(_, pick) => {
                pick(figures)
            }
        }
    }

    fn line(self, current: &PeriodFigures, prior: Option<&PeriodFigures>) -> StatementLineItem {
        StatementLineItem {
            label: self.label().to_string(),
            amount: self.amount(current),
            prior_amount: prior.map(|figures| self.amount(figures)),
            indent_level: match self {
                Self::Sheet(_) | Self::Derived(..) => 1,
                Self::Subtotal(..) | Self::Total(..) => 0,
            },
            is_subtotal: matches!(self, Self::Subtotal(..)),
            is_total: matches!(self, Self::Total(..)),
            lead_sheet_ref: match self {
                Self::Sheet(sheet) => Some(sheet),
                _ => None,
            },
        }
    }
}

fn render(
    rows: &[Row],
    current: &PeriodFigures,
    prior: Option<&PeriodFigures>,
) -> Vec<StatementLineItem> {
    rows.iter().map(|row| row.line(current, prior)).collect()
}

/// Builds financial statements from lead-sheet groupings.
///
/// Every function here is pure: the same inputs always produce the same
/// statements, and missing data degrades to zero rather than failing.
pub struct StatementBuilder;

impl StatementBuilder {
    /// Derives every statement for `current`, comparing against `prior`
    /// when supplied. The cash-flow statement needs the prior period and is
    /// `None` without it.
    #[must_use]
    pub fn build(
        current: &LeadSheetGrouping,
        prior: Option<&LeadSheetGrouping>,
    ) -> FinancialStatements {
        let current_figures = PeriodFigures::from_grouping(current);
        let prior_figures = prior.map(PeriodFigures::from_grouping);

        FinancialStatements {
            balance_sheet: render(BALANCE_SHEET_ROWS, &current_figures, prior_figures.as_ref()),
            income_statement: render(
                INCOME_STATEMENT_ROWS,
                &current_figures,
                prior_figures.as_ref(),
            ),
            cash_flow: prior.map(|prior| cash_flow::build(current, prior)),
            mapping_trace: trace::build(current),
            totals: current_figures.totals(),
            missing_lead_sheets: current.missing_mapped(),
        }
    }

    /// Balance sheet rows only.
    #[must_use]
    pub fn balance_sheet(
        current: &LeadSheetGrouping,
        prior: Option<&LeadSheetGrouping>,
    ) -> Vec<StatementLineItem> {
        let prior_figures = prior.map(PeriodFigures::from_grouping);
        render(
            BALANCE_SHEET_ROWS,
            &PeriodFigures::from_grouping(current),
            prior_figures.as_ref(),
        )
    }

    /// Income statement rows only.
    #[must_use]
    pub fn income_statement(
        current: &LeadSheetGrouping,
        prior: Option<&LeadSheetGrouping>,
    ) -> Vec<StatementLineItem> {
        let prior_figures = prior.map(PeriodFigures::from_grouping);
        render(
            INCOME_STATEMENT_ROWS,
            &PeriodFigures::from_grouping(current),
            prior_figures.as_ref(),
        )
    }

    /// Cash-flow statement between two periods.
    #[must_use]
    pub fn cash_flow(
        current: &LeadSheetGrouping,
        prior: &LeadSheetGrouping,
    ) -> CashFlowStatement {
        cash_flow::build(current, prior)
    }

    /// Tie-out of every mapped lead sheet.
    #[must_use]
    pub fn mapping_trace(grouping: &LeadSheetGrouping) -> Vec<MappingTraceEntry> {
        trace::build(grouping)
    }

    /// Headline totals only.
    #[must_use]
    pub fn totals(grouping: &LeadSheetGrouping) -> StatementTotals {
        PeriodFigures::from_grouping(grouping).totals()
    }
}
