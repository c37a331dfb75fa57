// Typeset services
// The settings store, the style injector and its CSS/font helpers, the
// dispatcher, and the two editor pages.

pub mod config_engine;
pub mod dispatcher;
pub mod editor_form;
pub mod font_catalog;
pub mod localization_engine;
pub mod popup_editor;
pub mod settings_manager;
pub mod settings_store;
pub mod style_injector;
pub mod style_rules;
