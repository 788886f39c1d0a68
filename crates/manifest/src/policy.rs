//! Package bundling and substitution policy.
//!
//! Special cases (biblatex's `.bbl`, epstopdf conversions) live here as data.
//! Adding a new case means adding a table row, not a new code path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Packages bundled whenever they are used, unless the user opts out.
pub const DEFAULT_PACKAGES: &[&str] = &["biblatex"];

/// A generated output shipped in place of regenerating it remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstituteRule {
    /// Extension of the generated file, e.g. `bbl`.
    pub output_extension: String,
    /// Extensions of inputs that would trigger regeneration, e.g. `bib`.
    pub suppressed_inputs: Vec<String>,
}

/// How one system package is treated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagePolicy {
    pub name: String,
    /// Generated output that must accompany the package, if any.
    pub substitute: Option<SubstituteRule>,
}

impl PackagePolicy {
    pub fn bundle_if_used(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            substitute: None,
        }
    }
}

impl SubstituteRule {
    /// The formatted bibliography, shipped whether or not a package demands it.
    pub fn bibliography() -> Self {
        Self {
            output_extension: "bbl".to_string(),
            suppressed_inputs: vec!["bib".to_string()],
        }
    }
}

/// A source file the build converts, archived as its converted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRule {
    /// Tool that performs the conversion during the build.
    pub producer: String,
    /// Extension of the reported source, e.g. `eps`.
    pub source_extension: String,
    /// Suffix the build appends to the stem, e.g. `-eps-converted-to.pdf`.
    pub converted_suffix: String,
    /// Extension the converted file is archived under, e.g. `pdf`.
    pub archived_extension: String,
}

impl ConversionRule {
    /// Converted sibling of `stem`, e.g. `fig/a` -> `fig/a-eps-converted-to.pdf`.
    pub fn converted_name(&self, stem: &str) -> String {
        format!("{}{}", stem, self.converted_suffix)
    }

    /// Archive name for `stem`, e.g. `fig/a` -> `fig/a.pdf`.
    pub fn archived_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.archived_extension)
    }
}

/// Conversions arXiv cannot redo itself (epstopdf in subdirectories).
pub fn default_conversions() -> Vec<ConversionRule> {
    vec![ConversionRule {
        producer: "epstopdf".to_string(),
        source_extension: "eps".to_string(),
        converted_suffix: "-eps-converted-to.pdf".to_string(),
        archived_extension: "pdf".to_string(),
    }]
}

/// Lookup table from package name to policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    policies: BTreeMap<String, PackagePolicy>,
}

impl PolicyTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in defaults.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.insert(PackagePolicy {
            name: "biblatex".to_string(),
            substitute: Some(SubstituteRule::bibliography()),
        });
        table
    }

    /// Add or replace a policy.
    pub fn insert(&mut self, policy: PackagePolicy) {
        self.policies.insert(policy.name.clone(), policy);
    }

    /// Add a plain bundle-if-used package; an existing policy is kept.
    pub fn add_package(&mut self, name: &str) {
        self.policies
            .entry(name.to_string())
            .or_insert_with(|| PackagePolicy::bundle_if_used(name));
    }

    /// Drop a package; user opt-outs beat defaults.
    pub fn remove(&mut self, name: &str) -> Option<PackagePolicy> {
        self.policies.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&PackagePolicy> {
        self.policies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Package names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackagePolicy> {
        self.policies.values()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_bbl_substitute() {
        let table = PolicyTable::with_defaults();
        let biblatex = table.get("biblatex").unwrap();
        let rule = biblatex.substitute.as_ref().unwrap();
        assert_eq!(rule.output_extension, "bbl");
        assert_eq!(rule.suppressed_inputs, vec!["bib".to_string()]);
        assert_eq!(
            table.names().collect::<Vec<_>>(),
            DEFAULT_PACKAGES.to_vec()
        );
    }

    #[test]
    fn test_add_package_keeps_existing_policy() {
        let mut table = PolicyTable::with_defaults();
        table.add_package("biblatex");
        table.add_package("refstyle");
        assert!(table.get("biblatex").unwrap().substitute.is_some());
        assert!(table.get("refstyle").unwrap().substitute.is_none());
    }

    #[test]
    fn test_remove_overrides_default() {
        let mut table = PolicyTable::with_defaults();
        assert!(table.remove("biblatex").is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_conversion_names() {
        let rule = &default_conversions()[0];
        assert_eq!(rule.converted_name("fig/a"), "fig/a-eps-converted-to.pdf");
        assert_eq!(rule.archived_name("fig/a"), "fig/a.pdf");
    }
}
