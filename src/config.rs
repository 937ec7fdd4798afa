//! Build configuration
//!
//! Switches that change how much work the engine does while building, and how strictly
//! structural misuse by the front end is reported.

/// Configuration for SSA construction
///
/// The read / write protocol, sealing and closure capture are always active. These switches
/// only control optional simplifications and the severity of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildConfig {
    /// Fold binary and unary operations on constants into a constant
    pub fold_constants: bool,

    /// Replace phis whose edges all carry the same value by that value
    pub eliminate_trivial_phis: bool,

    /// Record a diagnostic when a read resolves to an `Undefined` placeholder
    pub report_undefined: bool,

    /// Report structural misuse (finished block, double seal, late edges) as errors
    /// instead of warnings
    pub strict_structure: bool,

    /// Maximum number of enclosing functions searched for a captured binding (default: 64)
    pub max_lookup_depth: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            fold_constants: true,
            eliminate_trivial_phis: true,
            report_undefined: true,
            strict_structure: false,
            max_lookup_depth: 64,
        }
    }
}

impl BuildConfig {
    /// Creates a configuration that performs no optional work
    ///
    /// Constants are not folded and undefined reads are not reported. Trivial phis are
    /// still removed, the IR would otherwise not stay minimal.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            fold_constants: false,
            eliminate_trivial_phis: true,
            report_undefined: false,
            strict_structure: false,
            max_lookup_depth: 64,
        }
    }

    /// Creates a configuration reporting every structural misuse as an error
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_structure: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuildConfig::default();
        assert!(config.fold_constants);
        assert!(config.eliminate_trivial_phis);
        assert!(config.report_undefined);
        assert!(!config.strict_structure);
        assert_eq!(config.max_lookup_depth, 64);
    }

    #[test]
    fn test_minimal_config() {
        let config = BuildConfig::minimal();
        assert!(!config.fold_constants);
        assert!(!config.report_undefined);
        assert!(config.eliminate_trivial_phis);
    }

    #[test]
    fn test_strict_config() {
        let config = BuildConfig::strict();
        assert!(config.strict_structure);
        assert!(config.fold_constants);
    }
}
