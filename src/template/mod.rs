//! Recurring expense and income templates.

mod db;
mod domain;
mod kind;

pub use db::{
    OccurrenceRecord, create_template, create_template_table, deactivate_template, get_template,
    get_templates_in_window, list_templates, record_occurrence, update_template,
};
pub use domain::{RecurringTemplate, TemplateBuilder, TemplateId, TemplatePatch, validate_template};
pub use kind::TemplateKind;
