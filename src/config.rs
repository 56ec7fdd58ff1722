//! Translation configuration.
//!
//! The defaults are what [`crate::TranslationUnit::new`] uses; every knob can be
//! changed with the builder-style `with_*` methods.

/// Configuration for translating functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationConfig {
    /// Run the SSA verifier after variable resolution (default: true)
    pub verify: bool,

    /// Worklist iterations allowed per value before type propagation is
    /// considered runaway (default: 64)
    pub iteration_budget: usize,

    /// Number of instructions shown in unsupported-construct diagnostics (default: 5)
    pub window: usize,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            verify: true,
            iteration_budget: 64,
            window: 5,
        }
    }
}

impl TranslationConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the SSA verifier.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Sets the per-value worklist budget.
    #[must_use]
    pub fn with_iteration_budget(mut self, budget: usize) -> Self {
        self.iteration_budget = budget;
        self
    }

    /// Sets the diagnostic disassembly window length.
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}
