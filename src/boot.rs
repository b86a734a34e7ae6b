//! Boot order engine: templates, hierarchical lookup, reconciliation and
//! one-time boot overrides.

pub mod one_time;
pub mod order;
pub mod resolver;
pub mod templates;

pub use templates::{load_templates, TemplateSet};
