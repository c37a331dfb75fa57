// Typeset page model
// The document the style injector mutates and the timer that paces re-application.

pub mod debounce;
pub mod dom;
