//! Expense and income templates share one schema. [TemplateKind] picks the
//! pair of tables a query runs against.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Whether a template generates expenses or incomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Generates rows in the expense table.
    Expense,
    /// Generates rows in the income table.
    Income,
}

impl TemplateKind {
    /// Every kind, in the order the daily run processes them.
    pub const ALL: [TemplateKind; 2] = [TemplateKind::Expense, TemplateKind::Income];

    /// The table holding templates of this kind.
    pub fn template_table(self) -> &'static str {
        match self {
            TemplateKind::Expense => "recurring_expense",
            TemplateKind::Income => "recurring_income",
        }
    }

    /// The table holding transactions of this kind.
    pub fn transaction_table(self) -> &'static str {
        match self {
            TemplateKind::Expense => "expense",
            TemplateKind::Income => "income",
        }
    }

    /// The column on the transaction table that refers back to the template.
    pub fn template_column(self) -> &'static str {
        match self {
            TemplateKind::Expense => "recurring_expense_id",
            TemplateKind::Income => "recurring_income_id",
        }
    }
}

impl Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateKind::Expense => write!(f, "expense"),
            TemplateKind::Income => write!(f, "income"),
        }
    }
}
