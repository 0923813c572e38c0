//! Core template domain types.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    account::AccountId,
    currency::{Currency, ExchangeSnapshot},
    recurrence::RecurrenceRule,
};

/// Database identifier for a recurring template.
pub type TemplateId = i64;

/// A recurring expense or income that the daily run turns into concrete
/// transactions.
///
/// To create a new template, use [RecurringTemplate::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    /// The ID of the template.
    pub id: TemplateId,
    /// The account the template and its transactions belong to.
    pub account_id: AccountId,
    /// Copied onto every generated transaction.
    pub description: String,
    /// The amount in `currency`, always positive.
    pub amount: f64,
    /// The currency of `amount`.
    pub currency: Currency,
    /// An opaque category ID.
    pub category_id: Option<i64>,
    /// An opaque family member ID.
    pub family_member_id: Option<i64>,
    /// The exchange rate resolved when the template was created.
    pub exchange_rate: Option<f64>,
    /// The amount in the account's currency, resolved when the template was
    /// created.
    pub amount_in_primary_currency: Option<f64>,
    /// When the template fires.
    pub rule: RecurrenceRule,
    /// The last day the template may fire, inclusive.
    pub end_date: Option<Date>,
    /// How many transactions the template generates before it deactivates.
    pub total_occurrences: Option<u32>,
    /// How many transactions the template has generated.
    pub current_occurrence: u32,
    /// Inactive templates are never selected.
    pub is_active: bool,
    /// When the template was created.
    pub created_at: OffsetDateTime,
    /// When the template was last changed, including by the daily run.
    pub updated_at: OffsetDateTime,
}

impl RecurringTemplate {
    /// Create a new template.
    ///
    /// Shortcut for [TemplateBuilder] for discoverability.
    pub fn build(
        account_id: AccountId,
        description: &str,
        amount: f64,
        currency: Currency,
        rule: RecurrenceRule,
    ) -> TemplateBuilder {
        TemplateBuilder {
            account_id,
            description: description.to_owned(),
            amount,
            currency,
            rule,
            category_id: None,
            family_member_id: None,
            end_date: None,
            total_occurrences: None,
            exchange_rate: None,
            amount_in_primary_currency: None,
        }
    }

    /// The exchange snapshot copied onto generated transactions.
    ///
    /// Missing values fall back to a rate of 1 and the template amount.
    pub fn exchange_snapshot(&self) -> ExchangeSnapshot {
        ExchangeSnapshot {
            exchange_rate: self.exchange_rate.unwrap_or(1.0),
            amount_in_primary_currency: self.amount_in_primary_currency.unwrap_or(self.amount),
        }
    }

    /// Whether the template has used up its occurrence limit.
    pub fn is_exhausted(&self) -> bool {
        self.total_occurrences
            .is_some_and(|total| self.current_occurrence >= total)
    }

    /// Whether the window and occurrence limit of the template allow it to
    /// fire on `date`. Does not consult the recurrence rule.
    pub fn is_open_on(&self, date: Date) -> bool {
        self.is_active
            && self.rule.start_date <= date
            && self.end_date.is_none_or(|end_date| end_date >= date)
            && !self.is_exhausted()
    }
}

/// A builder for creating [RecurringTemplate] instances.
///
/// The exchange snapshot is resolved when the template is stored, see
/// [crate::create_template].
#[derive(Debug, PartialEq, Clone)]
pub struct TemplateBuilder {
    /// The account the template belongs to.
    pub account_id: AccountId,
    /// Must not be empty.
    pub description: String,
    /// Must be greater than zero.
    pub amount: f64,
    /// The currency of `amount`.
    pub currency: Currency,
    /// When the template fires.
    pub rule: RecurrenceRule,
    /// An opaque category ID.
    pub category_id: Option<i64>,
    /// An opaque family member ID.
    pub family_member_id: Option<i64>,
    /// Must not be before the start date of `rule`.
    pub end_date: Option<Date>,
    /// Must be greater than zero.
    pub total_occurrences: Option<u32>,
    /// The rate for converting `currency` into the account's currency.
    pub exchange_rate: Option<f64>,
    /// The amount already converted into the account's currency. Takes
    /// precedence over `exchange_rate`.
    pub amount_in_primary_currency: Option<f64>,
}

impl TemplateBuilder {
    /// Set the category ID for the template.
    pub fn category_id(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    /// Set the family member ID for the template.
    pub fn family_member_id(mut self, family_member_id: Option<i64>) -> Self {
        self.family_member_id = family_member_id;
        self
    }

    /// Set the last day the template may fire.
    pub fn end_date(mut self, end_date: Option<Date>) -> Self {
        self.end_date = end_date;
        self
    }

    /// Limit how many transactions the template generates.
    pub fn total_occurrences(mut self, total_occurrences: Option<u32>) -> Self {
        self.total_occurrences = total_occurrences;
        self
    }

    /// Set the exchange rate into the account's currency.
    pub fn exchange_rate(mut self, exchange_rate: Option<f64>) -> Self {
        self.exchange_rate = exchange_rate;
        self
    }

    /// Set the amount in the account's currency.
    pub fn amount_in_primary_currency(mut self, amount_in_primary_currency: Option<f64>) -> Self {
        self.amount_in_primary_currency = amount_in_primary_currency;
        self
    }

    /// Check the fields that do not need the database.
    pub fn validate(&self) -> Result<(), Error> {
        validate_fields(
            &self.description,
            self.amount,
            &self.rule,
            self.end_date,
            self.total_occurrences,
        )
    }
}

/// A partial update to a template.
///
/// Fields left as `None` are not changed. For nullable fields the inner
/// `None` clears the stored value. The frequency of a template cannot be
/// changed, create a new template instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplatePatch {
    /// The new description.
    pub description: Option<String>,
    /// The new amount.
    pub amount: Option<f64>,
    /// The new currency.
    pub currency: Option<Currency>,
    /// The new category, or `Some(None)` to clear it.
    pub category_id: Option<Option<i64>>,
    /// The new family member, or `Some(None)` to clear it.
    pub family_member_id: Option<Option<i64>>,
    /// The new interval.
    pub interval: Option<u32>,
    /// The new day of the month for monthly and yearly templates.
    pub day_of_month: Option<u8>,
    /// The new day of the week for weekly templates.
    pub day_of_week: Option<u8>,
    /// The new end date, or `Some(None)` to remove it.
    pub end_date: Option<Option<Date>>,
    /// The new occurrence limit, or `Some(None)` to remove it.
    pub total_occurrences: Option<Option<u32>>,
    /// Pause or resume the template.
    pub is_active: Option<bool>,
}

impl TemplatePatch {
    /// Whether the patch leaves every field unchanged.
    pub fn is_empty(&self) -> bool {
        *self == TemplatePatch::default()
    }

    /// Whether applying the patch may change the converted amount.
    pub fn changes_amount(&self) -> bool {
        self.amount.is_some() || self.currency.is_some()
    }

    /// Merge the patch into `template`.
    ///
    /// The result is not validated, see [validate_template].
    pub fn apply(&self, template: &mut RecurringTemplate) {
        if let Some(description) = &self.description {
            template.description = description.trim().to_owned();
        }
        if let Some(amount) = self.amount {
            template.amount = amount;
        }
        if let Some(currency) = self.currency {
            template.currency = currency;
        }
        if let Some(category_id) = self.category_id {
            template.category_id = category_id;
        }
        if let Some(family_member_id) = self.family_member_id {
            template.family_member_id = family_member_id;
        }
        if let Some(interval) = self.interval {
            template.rule.interval = interval;
        }
        if let Some(day_of_month) = self.day_of_month {
            template.rule.day_of_month = Some(day_of_month);
        }
        if let Some(day_of_week) = self.day_of_week {
            template.rule.day_of_week = Some(day_of_week);
        }
        if let Some(end_date) = self.end_date {
            template.end_date = end_date;
        }
        if let Some(total_occurrences) = self.total_occurrences {
            template.total_occurrences = total_occurrences;
        }
        if let Some(is_active) = self.is_active {
            template.is_active = is_active;
        }
    }
}

/// Check that a stored or patched template is well formed.
pub fn validate_template(template: &RecurringTemplate) -> Result<(), Error> {
    validate_fields(
        &template.description,
        template.amount,
        &template.rule,
        template.end_date,
        template.total_occurrences,
    )
}

fn validate_fields(
    description: &str,
    amount: f64,
    rule: &RecurrenceRule,
    end_date: Option<Date>,
    total_occurrences: Option<u32>,
) -> Result<(), Error> {
    if description.trim().is_empty() {
        return Err(Error::EmptyDescription);
    }

    if !(amount.is_finite() && amount > 0.0) {
        return Err(Error::InvalidAmount(amount));
    }

    rule.validate()?;

    if let Some(end_date) = end_date.filter(|end_date| *end_date < rule.start_date) {
        return Err(Error::EndDateBeforeStartDate {
            start_date: rule.start_date,
            end_date,
        });
    }

    if total_occurrences == Some(0) {
        return Err(Error::InvalidOccurrenceLimit);
    }

    Ok(())
}
