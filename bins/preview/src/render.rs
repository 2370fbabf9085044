//! Plain-text rendering of derived statements.

use std::fmt;

use paciolus_core::statements::{CashFlowSection, FinancialStatements, StatementLineItem};
use rust_decimal::Decimal;

const LABEL_WIDTH: usize = 44;
const AMOUNT_WIDTH: usize = 16;

/// Formats an amount with thousands separators, negatives in parentheses.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp(2);
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("({grouped}.{cents})")
    } else {
        format!("{grouped}.{cents} ")
    }
}

/// Text report of a full statement set.
pub struct TextReport<'a>(pub &'a FinancialStatements);

impl TextReport<'_> {
    fn has_prior(&self) -> bool {
        self.0
            .balance_sheet
            .iter()
            .chain(&self.0.income_statement)
            .any(|item| item.prior_amount.is_some())
    }

    fn heading(&self, f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{title}")?;
        write!(f, "{:LABEL_WIDTH$}{:>AMOUNT_WIDTH$}", "", "Current")?;
        if self.has_prior() {
            write!(f, "{:>AMOUNT_WIDTH$}", "Prior")?;
        }
        writeln!(f)
    }

    fn line(f: &mut fmt::Formatter<'_>, item: &StatementLineItem, with_prior: bool) -> fmt::Result {
        let label = format!("{}{}", "  ".repeat(usize::from(item.indent_level)), item.label);
        write!(
            f,
            "{label:LABEL_WIDTH$}{:>AMOUNT_WIDTH$}",
            format_amount(item.amount)
        )?;
        if with_prior {
            let prior = item.prior_amount.map(format_amount).unwrap_or_default();
            write!(f, "{prior:>AMOUNT_WIDTH$}")?;
        }
        writeln!(f)
    }

    fn figure(f: &mut fmt::Formatter<'_>, label: &str, amount: Decimal) -> fmt::Result {
        writeln!(
            f,
            "{label:LABEL_WIDTH$}{:>AMOUNT_WIDTH$}",
            format_amount(amount)
        )
    }

    fn section(f: &mut fmt::Formatter<'_>, title: &str, section: &CashFlowSection) -> fmt::Result {
        writeln!(f, "{title}")?;
        for item in &section.items {
            Self::line(f, item, false)?;
        }
        Self::figure(f, &format!("  Net cash from {}", title.to_lowercase()), section.subtotal)
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let statements = self.0;
        let with_prior = self.has_prior();

        self.heading(f, "BALANCE SHEET")?;
        for item in &statements.balance_sheet {
            Self::line(f, item, with_prior)?;
        }
        if !statements.totals.is_balanced {
            writeln!(
                f,
                "  ! Out of balance by {}",
                format_amount(statements.totals.balance_difference).trim_end()
            )?;
        }

        self.heading(f, "INCOME STATEMENT")?;
        for item in &statements.income_statement {
            Self::line(f, item, with_prior)?;
        }

        if let Some(cash_flow) = &statements.cash_flow {
            writeln!(f)?;
            writeln!(f, "CASH FLOW STATEMENT")?;
            Self::section(f, "Operating Activities", &cash_flow.operating)?;
            Self::section(f, "Investing Activities", &cash_flow.investing)?;
            Self::section(f, "Financing Activities", &cash_flow.financing)?;
            Self::figure(f, "Net Change in Cash", cash_flow.net_change)?;
            Self::figure(f, "Beginning Cash", cash_flow.beginning_cash)?;
            Self::figure(f, "Ending Cash", cash_flow.ending_cash)?;
            Self::figure(f, "Cash per Balance Sheet", cash_flow.actual_ending_cash)?;
            if !cash_flow.is_reconciled {
                writeln!(
                    f,
                    "  ! Cash does not reconcile, difference {}",
                    format_amount(cash_flow.reconciliation_difference).trim_end()
                )?;
            }
        }

        let untied: Vec<_> = statements
            .mapping_trace
            .iter()
            .filter(|entry| !entry.is_tied)
            .collect();
        if !statements.missing_lead_sheets.is_empty() || !untied.is_empty() {
            writeln!(f)?;
            writeln!(f, "NOTES")?;
        }
        if !statements.missing_lead_sheets.is_empty() {
            let letters: Vec<String> = statements
                .missing_lead_sheets
                .iter()
                .map(ToString::to_string)
                .collect();
            writeln!(f, "  No data for lead sheets: {}", letters.join(", "))?;
        }
        for entry in untied {
            writeln!(
                f,
                "  {} ({}) does not tie to its accounts, difference {}",
                entry.statement_line,
                entry.lead_sheet,
                format_amount(entry.difference).trim_end()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paciolus_core::statements::{
        LeadSheet, LeadSheetAccount, LeadSheetGrouping, LeadSheetSummary, StatementBuilder,
    };
    use rust_decimal_macros::dec;

    fn grouping(balances: &[(LeadSheet, Decimal)]) -> LeadSheetGrouping {
        LeadSheetGrouping {
            summaries: balances
                .iter()
                .map(|&(sheet, net)| LeadSheetSummary {
                    lead_sheet: sheet,
                    lead_sheet_name: String::new(),
                    total_debit: net.max(Decimal::ZERO),
                    total_credit: (-net).max(Decimal::ZERO),
                    net_balance: net,
                    account_count: 1,
                    accounts: vec![LeadSheetAccount {
                        account: format!("{sheet} account"),
                        debit: net.max(Decimal::ZERO),
                        credit: (-net).max(Decimal::ZERO),
                        confidence: dec!(1),
                    }],
                })
                .collect(),
            total_accounts: balances.len(),
            unclassified_count: 0,
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(0)), "0.00 ");
        assert_eq!(format_amount(dec!(999.5)), "999.50 ");
        assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89 ");
        assert_eq!(format_amount(dec!(-1500)), "(1,500.00)");
        assert_eq!(format_amount(dec!(-0.001)), "0.00 ");
    }

    #[test]
    fn test_report_sections() {
        let current = grouping(&[
            (LeadSheet::A, dec!(140)),
            (LeadSheet::K, dec!(-100)),
            (LeadSheet::L, dec!(-40)),
        ]);
        let prior = grouping(&[(LeadSheet::A, dec!(100)), (LeadSheet::K, dec!(-100))]);
        let statements = StatementBuilder::build(&current, Some(&prior));

        let text = TextReport(&statements).to_string();

        assert!(text.contains("BALANCE SHEET"));
        assert!(text.contains("INCOME STATEMENT"));
        assert!(text.contains("CASH FLOW STATEMENT"));
        assert!(text.contains("Prior"));
        assert!(text.contains("No data for lead sheets: B, C"));
        assert!(!text.contains("Out of balance"));
        assert!(!text.contains("does not reconcile"));
    }

    #[test]
    fn test_report_without_prior_has_no_cash_flow() {
        let statements =
            StatementBuilder::build(&grouping(&[(LeadSheet::A, dec!(10))]), None);
        let text = TextReport(&statements).to_string();

        assert!(!text.contains("CASH FLOW STATEMENT"));
        assert!(!text.contains("Prior"));
        assert!(text.contains("Out of balance"));
    }
}
