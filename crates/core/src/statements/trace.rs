//! Mapping trace: ties each statement line back to its accounts.

use rust_decimal::Decimal;

use super::lead_sheet::{LeadSheet, LeadSheetGrouping, StatementKind};
use super::types::{MappingTraceEntry, TraceAccount, ties};

pub(crate) fn build(grouping: &LeadSheetGrouping) -> Vec<MappingTraceEntry> {
    LeadSheet::MAPPED
        .into_iter()
        .map(|sheet| entry(grouping, sheet))
        .collect()
}

fn entry(grouping: &LeadSheetGrouping, sheet: LeadSheet) -> MappingTraceEntry {
    let accounts: Vec<TraceAccount> = grouping
        .summaries_for(sheet)
        .flat_map(|summary| summary.accounts.iter())
        .map(|account| TraceAccount {
            account: account.account.clone(),
            debit: account.debit,
            credit: account.credit,
            net: account.net(),
            confidence: account.confidence,
        })
        .collect();

    let summary_net_balance = grouping.net_balance(sheet);
    let account_net_total: Decimal = accounts.iter().map(|account| account.net).sum();
    let difference = summary_net_balance - account_net_total;

    MappingTraceEntry {
        statement_line: sheet.standard_name().unwrap_or_default().to_string(),
        statement: sheet.statement().unwrap_or(StatementKind::BalanceSheet),
        lead_sheet: sheet,
        present: grouping.contains(sheet),
        summary_net_balance,
        statement_amount: sheet.display_amount(summary_net_balance),
        sign_flipped: sheet.is_credit_normal(),
        account_net_total,
        difference,
        is_tied: ties(summary_net_balance, account_net_total),
        accounts,
    }
}
