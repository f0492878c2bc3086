pub mod access_rules;
pub mod training;
pub mod widget_settings;
