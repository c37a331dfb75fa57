// Typeset state managers
// Open tabs, each with its live document and style injector.

pub mod tab_manager;
