//! Indirect-method cash-flow statement.
//!
//! Starts from net income and walks the balance-sheet movements between the
//! prior and current groupings. Every movement is expressed as its cash
//! effect: `-(current_net - prior_net)` on the debit-minus-credit balance, so
//! an asset increase consumes cash and a liability increase provides it.

use rust_decimal::Decimal;

use super::builder::PeriodFigures;
use super::lead_sheet::{LeadSheet, LeadSheetGrouping};
use super::types::{
    CashFlowSection, CashFlowStatement, MATERIALITY_THRESHOLD, StatementLineItem, ties,
};

const WORKING_CAPITAL: [LeadSheet; 5] = [
    LeadSheet::B,
    LeadSheet::C,
    LeadSheet::D,
    LeadSheet::G,
    LeadSheet::H,
];

const INVESTING: [LeadSheet; 2] = [LeadSheet::E, LeadSheet::F];

const FINANCING_DEBT: [LeadSheet; 2] = [LeadSheet::I, LeadSheet::J];

fn cash_effect(
    current: &LeadSheetGrouping,
    prior: &LeadSheetGrouping,
    sheet: LeadSheet,
) -> Decimal {
    -(current.net_balance(sheet) - prior.net_balance(sheet))
}

fn item(label: String, amount: Decimal, lead_sheet_ref: Option<LeadSheet>) -> StatementLineItem {
    StatementLineItem {
        label,
        amount,
        prior_amount: None,
        indent_level: 1,
        is_subtotal: false,
        is_total: false,
        lead_sheet_ref,
    }
}

fn push_movement(section: &mut CashFlowSection, sheet: LeadSheet, amount: Decimal) {
    if amount.abs() <= MATERIALITY_THRESHOLD {
        return;
    }
    let name = sheet.standard_name().unwrap_or_default();
    section.push(item(format!("Change in {name}"), amount, Some(sheet)));
}

pub(crate) fn build(current: &LeadSheetGrouping, prior: &LeadSheetGrouping) -> CashFlowStatement {
    let net_income = PeriodFigures::from_grouping(current).net_income();
    let prior_net_income = PeriodFigures::from_grouping(prior).net_income();

    let mut operating = CashFlowSection::default();
    operating.push(item("Net Income".to_string(), net_income, None));
    for sheet in WORKING_CAPITAL {
        push_movement(&mut operating, sheet, cash_effect(current, prior, sheet));
    }

    let mut investing = CashFlowSection::default();
    for sheet in INVESTING {
        push_movement(&mut investing, sheet, cash_effect(current, prior, sheet));
    }

    let mut financing = CashFlowSection::default();
    for sheet in FINANCING_DEBT {
        push_movement(&mut financing, sheet, cash_effect(current, prior, sheet));
    }
    // Prior-period earnings closed into equity are not a financing flow.
    push_movement(
        &mut financing,
        LeadSheet::K,
        cash_effect(current, prior, LeadSheet::K) - prior_net_income,
    );

    let net_change = operating.subtotal + investing.subtotal + financing.subtotal;
    let beginning_cash = prior.net_balance(LeadSheet::A);
    let ending_cash = beginning_cash + net_change;
    let actual_ending_cash = current.net_balance(LeadSheet::A);
    let reconciliation_difference = ending_cash - actual_ending_cash;

    CashFlowStatement {
        operating,
        investing,
        financing,
        net_change,
        beginning_cash,
        ending_cash,
        actual_ending_cash,
        reconciliation_difference,
        is_reconciled: ties(ending_cash, actual_ending_cash),
    }
}
