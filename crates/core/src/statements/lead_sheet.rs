//! Lead-sheet classification model.
//!
//! A lead sheet is an audit workpaper category identified by a letter. The
//! backend classifies every trial-balance account into one; the client only
//! ever reads these groupings.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while interpreting lead-sheet identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeadSheetError {
    /// Identifier is not a single letter A-Z.
    #[error("Invalid lead sheet identifier: {0:?}")]
    InvalidLetter(String),
}

/// Which financial statement a lead sheet feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Balance sheet (A-K).
    BalanceSheet,
    /// Income statement (L-O).
    IncomeStatement,
}

/// Lead-sheet letter.
///
/// Letters A through O map onto statement lines; P through Z are accepted
/// but carry no statement mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[repr(u8)]
pub enum LeadSheet {
    /// Cash and cash equivalents.
    A,
    /// Receivables.
    B,
    /// Inventory.
    C,
    /// Prepaid expenses.
    D,
    /// Property, plant and equipment.
    E,
    /// Other assets and investments.
    F,
    /// Accounts payable and accrued liabilities.
    G,
    /// Other current liabilities.
    H,
    /// Long-term debt.
    I,
    /// Other long-term liabilities.
    J,
    /// Stockholders' equity.
    K,
    /// Revenue.
    L,
    /// Cost of goods sold.
    M,
    /// Operating expenses.
    N,
    /// Other income and expense.
    O,
    /// Unmapped.
    P,
    /// Unmapped.
    Q,
    /// Unmapped.
    R,
    /// Unmapped.
    S,
    /// Unmapped.
    T,
    /// Unmapped.
    U,
    /// Unmapped.
    V,
    /// Unmapped.
    W,
    /// Unmapped.
    X,
    /// Unmapped.
    Y,
    /// Unmapped.
    Z,
}

impl LeadSheet {
    /// Every lead-sheet letter in order.
    pub const ALL: [Self; 26] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::O,
        Self::P,
        Self::Q,
        Self::R,
        Self::S,
        Self::T,
        Self::U,
        Self::V,
        Self::W,
        Self::X,
        Self::Y,
        Self::Z,
    ];

    /// Letters that map onto a statement line (A-O).
    pub const MAPPED: [Self; 15] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::O,
    ];

    /// Returns the upper-case letter.
    #[must_use]
    pub const fn letter(self) -> char {
        (b'A' + self as u8) as char
    }

    /// Parses a single letter, case-insensitively.
    pub fn from_letter(letter: char) -> Result<Self, LeadSheetError> {
        let upper = letter.to_ascii_uppercase();
        if upper.is_ascii_uppercase() {
            Ok(Self::ALL[usize::from(upper as u8 - b'A')])
        } else {
            Err(LeadSheetError::InvalidLetter(letter.to_string()))
        }
    }

    /// Position of a mapped letter within [`Self::MAPPED`].
    #[must_use]
    pub const fn mapped_index(self) -> Option<usize> {
        let index = self as usize;
        if index < Self::MAPPED.len() {
            Some(index)
        } else {
            None
        }
    }

    /// Whether this letter has a statement line.
    #[must_use]
    pub const fn is_mapped(self) -> bool {
        self.mapped_index().is_some()
    }

    /// Standard statement line label.
    #[must_use]
    pub const fn standard_name(self) -> Option<&'static str> {
        match self {
            Self::A => Some("Cash and Cash Equivalents"),
            Self::B => Some("Receivables"),
            Self::C => Some("Inventory"),
            Self::D => Some("Prepaid Expenses"),
            Self::E => Some("Property, Plant & Equipment"),
            Self::F => Some("Other Assets & Investments"),
            Self::G => Some("Accounts Payable & Accrued Liabilities"),
            Self::H => Some("Other Current Liabilities"),
            Self::I => Some("Long-term Debt"),
            Self::J => Some("Other Long-term Liabilities"),
            Self::K => Some("Stockholders' Equity"),
            Self::L => Some("Revenue"),
            Self::M => Some("Cost of Goods Sold"),
            Self::N => Some("Operating Expenses"),
            Self::O => Some("Other Income (Expense), Net"),
            _ => None,
        }
    }

    /// Statement the letter feeds, if any.
    #[must_use]
    pub const fn statement(self) -> Option<StatementKind> {
        match self {
            Self::A
            | Self::B
            | Self::C
            | Self::D
            | Self::E
            | Self::F
            | Self::G
            | Self::H
            | Self::I
            | Self::J
            | Self::K => Some(StatementKind::BalanceSheet),
            Self::L | Self::M | Self::N | Self::O => Some(StatementKind::IncomeStatement),
            _ => None,
        }
    }

    /// Credit-normal letters are sign-flipped for display.
    #[must_use]
    pub const fn is_credit_normal(self) -> bool {
        matches!(
            self,
            Self::G | Self::H | Self::I | Self::J | Self::K | Self::L | Self::O
        )
    }

    /// Converts a debit-minus-credit balance into its display amount.
    #[must_use]
    pub fn display_amount(self, net_balance: Decimal) -> Decimal {
        if self.is_credit_normal() {
            -net_balance
        } else {
            net_balance
        }
    }
}

impl fmt::Display for LeadSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for LeadSheet {
    type Err = LeadSheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => Self::from_letter(letter),
            _ => Err(LeadSheetError::InvalidLetter(s.to_string())),
        }
    }
}

impl TryFrom<String> for LeadSheet {
    type Error = LeadSheetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One classified trial-balance account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSheetAccount {
    /// Account name as it appeared in the upload.
    pub account: String,
    /// Debit balance.
    #[serde(default)]
    pub debit: Decimal,
    /// Credit balance.
    #[serde(default)]
    pub credit: Decimal,
    /// Classification confidence in `0..=1`.
    #[serde(default)]
    pub confidence: Decimal,
}

impl LeadSheetAccount {
    /// Debit minus credit.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Totals for one lead sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSheetSummary {
    /// Lead-sheet letter.
    pub lead_sheet: LeadSheet,
    /// Display name sent by the backend.
    #[serde(default)]
    pub lead_sheet_name: String,
    /// Sum of debits.
    #[serde(default)]
    pub total_debit: Decimal,
    /// Sum of credits.
    #[serde(default)]
    pub total_credit: Decimal,
    /// Debit minus credit.
    #[serde(default)]
    pub net_balance: Decimal,
    /// Number of accounts classified here.
    #[serde(default)]
    pub account_count: usize,
    /// Underlying accounts.
    #[serde(default)]
    pub accounts: Vec<LeadSheetAccount>,
}

/// Lead-sheet grouping of one uploaded trial balance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadSheetGrouping {
    /// Per-letter summaries in backend order.
    #[serde(default)]
    pub summaries: Vec<LeadSheetSummary>,
    /// Accounts in the trial balance.
    #[serde(default)]
    pub total_accounts: usize,
    /// Accounts the backend could not classify.
    #[serde(default)]
    pub unclassified_count: usize,
}

impl LeadSheetGrouping {
    /// Summaries for `sheet`. The backend sends at most one, but duplicates
    /// are tolerated and treated additively.
    pub fn summaries_for(&self, sheet: LeadSheet) -> impl Iterator<Item = &LeadSheetSummary> {
        self.summaries.iter().filter(move |s| s.lead_sheet == sheet)
    }

    /// Whether any summary exists for `sheet`.
    #[must_use]
    pub fn contains(&self, sheet: LeadSheet) -> bool {
        self.summaries_for(sheet).next().is_some()
    }

    /// Net balance for `sheet`, zero when absent.
    #[must_use]
    pub fn net_balance(&self, sheet: LeadSheet) -> Decimal {
        self.summaries_for(sheet).map(|s| s.net_balance).sum()
    }

    /// Mapped letters (A-O) that have no summary.
    #[must_use]
    pub fn missing_mapped(&self) -> Vec<LeadSheet> {
        LeadSheet::MAPPED
            .into_iter()
            .filter(|sheet| !self.contains(*sheet))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case('A', LeadSheet::A)]
    #[case('k', LeadSheet::K)]
    #[case('O', LeadSheet::O)]
    #[case('z', LeadSheet::Z)]
    fn test_from_letter(#[case] letter: char, #[case] expected: LeadSheet) {
        assert_eq!(LeadSheet::from_letter(letter).unwrap(), expected);
        assert_eq!(expected.letter(), letter.to_ascii_uppercase());
    }

    #[rstest]
    #[case("")]
    #[case("AB")]
    #[case("1")]
    #[case("é")]
    fn test_from_str_rejects_invalid(#[case] input: &str) {
        assert!(matches!(
            input.parse::<LeadSheet>(),
            Err(LeadSheetError::InvalidLetter(_))
        ));
    }

    #[test]
    fn test_mapping_covers_a_through_o() {
        for sheet in LeadSheet::MAPPED {
            assert!(sheet.is_mapped());
            assert!(sheet.standard_name().is_some());
            assert!(sheet.statement().is_some());
        }
        assert!(!LeadSheet::P.is_mapped());
        assert_eq!(LeadSheet::Z.standard_name(), None);
        assert_eq!(LeadSheet::K.statement(), Some(StatementKind::BalanceSheet));
        assert_eq!(LeadSheet::L.statement(), Some(StatementKind::IncomeStatement));
    }

    #[test]
    fn test_display_amount_flips_credit_normal() {
        assert_eq!(LeadSheet::A.display_amount(dec!(100)), dec!(100));
        assert_eq!(LeadSheet::G.display_amount(dec!(-40)), dec!(40));
        assert_eq!(LeadSheet::L.display_amount(dec!(-250)), dec!(250));
        assert_eq!(LeadSheet::M.display_amount(dec!(90)), dec!(90));
    }

    #[test]
    fn test_grouping_deserializes_backend_payload() {
        let json = r#"{
            "summaries": [
                {
                    "lead_sheet": "A",
                    "lead_sheet_name": "Cash",
                    "total_debit": 1500.25,
                    "total_credit": "0",
                    "net_balance": 1500.25,
                    "account_count": 1,
                    "accounts": [
                        {"account": "Operating Account", "debit": 1500.25, "credit": 0, "confidence": 0.95}
                    ]
                },
                {"lead_sheet": "K", "net_balance": -1500.25}
            ],
            "total_accounts": 2
        }"#;

        let grouping: LeadSheetGrouping = serde_json::from_str(json).unwrap();
        assert_eq!(grouping.summaries.len(), 2);
        assert_eq!(grouping.net_balance(LeadSheet::A), dec!(1500.25));
        assert_eq!(grouping.net_balance(LeadSheet::K), dec!(-1500.25));
        assert_eq!(grouping.net_balance(LeadSheet::B), Decimal::ZERO);
        assert_eq!(grouping.unclassified_count, 0);
        assert_eq!(grouping.missing_mapped().len(), 13);
    }

    #[test]
    fn test_lead_sheet_deserializes_either_case() {
        let sheets: Vec<LeadSheet> = serde_json::from_str(r#"["a", "K", " o "]"#).unwrap();
        assert_eq!(sheets, [LeadSheet::A, LeadSheet::K, LeadSheet::O]);
        assert_eq!(serde_json::to_string(&LeadSheet::A).unwrap(), r#""A""#);
        assert!(serde_json::from_str::<LeadSheet>(r#""AB""#).is_err());
        assert!(serde_json::from_str::<LeadSheet>(r#""1""#).is_err());
    }

    #[test]
    fn test_duplicate_summaries_are_additive() {
        let summary = |net: Decimal| LeadSheetSummary {
            lead_sheet: LeadSheet::B,
            lead_sheet_name: "Receivables".to_string(),
            total_debit: net,
            total_credit: Decimal::ZERO,
            net_balance: net,
            account_count: 0,
            accounts: vec![],
        };
        let grouping = LeadSheetGrouping {
            summaries: vec![summary(dec!(10)), summary(dec!(5.5))],
            total_accounts: 0,
            unclassified_count: 0,
        };

        assert_eq!(grouping.net_balance(LeadSheet::B), dec!(15.5));
    }
}
