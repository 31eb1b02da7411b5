//! Local code prefix filter.
//!
//! Sites that only issue codes from a few families can list their prefixes
//! so that stray scans (a product barcode, a mistyped line) are refused
//! locally instead of costing a round trip to the validation service.

use gatepulse_core::Code;

/// Permitted code prefixes. Empty means every code is permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeFilter {
    prefixes: Vec<String>,
}

impl CodeFilter {
    /// Build a filter from configured prefixes. Blank entries are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatepulse_agent::CodeFilter;
    /// use gatepulse_core::Code;
    ///
    /// let filter = CodeFilter::new(["PA_", "SU_"]);
    /// assert!(filter.permits(&Code::new("PA_1001").unwrap()));
    /// assert!(!filter.permits(&Code::new("4006381333931").unwrap()));
    ///
    /// assert!(CodeFilter::allow_all().permits(&Code::new("anything").unwrap()));
    /// ```
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Whether `code` may be sent for validation.
    pub fn permits(&self, code: &Code) -> bool {
        code.has_any_prefix(&self.prefixes)
    }

    /// Returns `true` if some codes will be refused.
    pub fn is_restrictive(&self) -> bool {
        !self.prefixes.is_empty()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}
