//! Provider identity resolution.
//!
//! Raw provider labels vary from row to row ("Dr. Jane Smith",
//! "JANE SMITH, MD", "Jane  Smith"). [`IdentityRules`] reduces each label to
//! a match key and [`AliasTable`] maps match keys to canonical providers.
//!
//! The table is scoped to one ingestion run. The first label seen for a key
//! becomes the canonical name; later variants are only recorded as aliases.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::model::Provider;

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rules for reducing a provider label to its match key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityRules {
    /// Leading titles ignored when matching (compared without dots).
    pub honorifics: Vec<String>,
    /// Trailing credentials ignored when matching (compared without dots).
    pub credential_suffixes: Vec<String>,
}

impl Default for IdentityRules {
    fn default() -> Self {
        Self {
            honorifics: ["dr", "doctor", "prof", "mr", "mrs", "ms", "miss"]
                .map(String::from)
                .to_vec(),
            credential_suffixes: ["md", "do", "np", "pa", "pa-c", "rn", "fnp", "cpnp", "dnp"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl IdentityRules {
    /// Returns the match key for a provider label.
    ///
    /// The key is lower-cased with whitespace collapsed, surrounding
    /// punctuation trimmed from each word, leading honorifics and trailing
    /// credential suffixes removed. A label consisting solely of titles
    /// keeps its words so it never reduces to an empty key.
    pub fn match_key(&self, label: &str) -> String {
        let tokens: Vec<String> = label
            .split(|c: char| c.is_whitespace() || c == ',')
            .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation() && c != '-'))
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut first = 0;
        let mut last = tokens.len();
        while first < last && Self::is_listed(&self.honorifics, &tokens[first]) {
            first += 1;
        }
        while last > first && Self::is_listed(&self.credential_suffixes, &tokens[last - 1]) {
            last -= 1;
        }

        if first == last {
            tokens.join(" ")
        } else {
            tokens[first..last].join(" ")
        }
    }

    fn is_listed(list: &[String], token: &str) -> bool {
        let bare: String = token.chars().filter(|c| *c != '.').collect();
        list.iter().any(|entry| {
            let entry: String = entry.chars().filter(|c| *c != '.').collect();
            entry.eq_ignore_ascii_case(&bare)
        })
    }
}

/// Per-run table from match keys to canonical providers.
#[derive(Debug, Clone)]
pub struct AliasTable {
    rules: IdentityRules,
    by_key: HashMap<String, usize>,
    providers: Vec<Provider>,
}

impl AliasTable {
    /// Creates an empty table.
    pub fn new(rules: IdentityRules) -> Self {
        Self {
            rules,
            by_key: HashMap::new(),
            providers: Vec::new(),
        }
    }

    /// Pre-registers a canonical provider and its known aliases.
    ///
    /// Used to carry identities across runs through configuration. Seeding
    /// an already known key only adds aliases.
    pub fn seed<I, S>(&mut self, canonical: &str, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical = self.resolve(canonical).to_string();
        for alias in aliases {
            let alias = normalize_ws(alias.as_ref());
            if alias.is_empty() {
                continue;
            }
            let key = self.rules.match_key(&alias);
            match self.by_key.get(&key) {
                Some(&idx) => self.providers[idx].add_alias(&alias),
                None => {
                    if let Some(idx) = self.index_of_canonical(&canonical) {
                        self.by_key.insert(key, idx);
                        self.providers[idx].add_alias(&alias);
                    }
                }
            }
        }
    }

    /// Resolves a raw label to its canonical name, registering a new
    /// provider when the label matches nothing known.
    pub fn resolve(&mut self, label: &str) -> &str {
        let label = normalize_ws(label);
        let key = self.rules.match_key(&label);

        let idx = match self.by_key.get(&key) {
            Some(&idx) => {
                self.providers[idx].add_alias(&label);
                idx
            }
            None => {
                trace!(label = %label, key = %key, "new provider");
                self.providers.push(Provider::new(label));
                let idx = self.providers.len() - 1;
                self.by_key.insert(key, idx);
                idx
            }
        };
        self.providers[idx].canonical_name()
    }

    /// Looks up a label without registering anything.
    pub fn lookup(&self, label: &str) -> Option<&Provider> {
        let key = self.rules.match_key(&normalize_ws(label));
        self.by_key.get(&key).map(|&idx| &self.providers[idx])
    }

    /// Returns the rules used for matching.
    pub fn rules(&self) -> &IdentityRules {
        &self.rules
    }

    /// Number of distinct providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no provider has been registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Consumes the table, returning providers in first-seen order.
    pub fn into_providers(self) -> Vec<Provider> {
        self.providers
    }

    fn index_of_canonical(&self, canonical: &str) -> Option<usize> {
        self.providers
            .iter()
            .position(|p| p.canonical_name() == canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod match_key {
        use super::*;

        #[test]
        fn strips_honorific_and_credentials() {
            let rules = IdentityRules::default();
            assert_eq!(rules.match_key("Dr. Jane Smith"), "jane smith");
            assert_eq!(rules.match_key("JANE SMITH, MD"), "jane smith");
            assert_eq!(rules.match_key("  jane   smith "), "jane smith");
            assert_eq!(rules.match_key("Jane Smith, M.D."), "jane smith");
            assert_eq!(rules.match_key("Ms. Ann Lee, PA-C"), "ann lee");
        }

        #[test]
        fn keeps_words_when_only_titles() {
            let rules = IdentityRules::default();
            assert_eq!(rules.match_key("Dr."), "dr");
        }

        #[test]
        fn custom_rules() {
            let rules = IdentityRules {
                honorifics: vec!["nurse".to_string()],
                credential_suffixes: vec![],
            };
            assert_eq!(rules.match_key("Nurse Kim Park, RN"), "kim park rn");
        }

        #[test]
        fn normalize_ws_collapses() {
            assert_eq!(normalize_ws("  a \t b\n c "), "a b c");
            assert_eq!(normalize_ws(""), "");
        }
    }

    mod alias_table {
        use super::*;

        #[test]
        fn first_seen_label_is_canonical() {
            let mut table = AliasTable::new(IdentityRules::default());
            assert_eq!(table.resolve("Dr. Jane Smith"), "Dr. Jane Smith");
            assert_eq!(table.resolve("JANE SMITH, MD"), "Dr. Jane Smith");
            assert_eq!(table.resolve("Bob Jones"), "Bob Jones");
            assert_eq!(table.len(), 2);

            let providers = table.into_providers();
            assert_eq!(providers[0].canonical_name(), "Dr. Jane Smith");
            assert!(providers[0].aliases().contains("JANE SMITH, MD"));
            assert_eq!(providers[1].canonical_name(), "Bob Jones");
        }

        #[test]
        fn whitespace_variants_are_not_recorded_twice() {
            let mut table = AliasTable::new(IdentityRules::default());
            table.resolve("Jane Smith");
            table.resolve("  Jane   Smith ");
            let providers = table.into_providers();
            assert!(providers[0].aliases().is_empty());
        }

        #[test]
        fn seeded_canonical_wins() {
            let mut table = AliasTable::new(IdentityRules::default());
            table.seed("Jane Smith", ["J. Smith"]);
            assert_eq!(table.resolve("Dr. Jane Smith"), "Jane Smith");
            assert_eq!(table.resolve("J Smith"), "Jane Smith");
            assert_eq!(table.len(), 1);
        }

        #[test]
        fn lookup_does_not_register() {
            let mut table = AliasTable::new(IdentityRules::default());
            assert!(table.lookup("Jane Smith").is_none());
            table.resolve("Jane Smith");
            assert_eq!(
                table.lookup("dr jane smith").map(|p| p.canonical_name()),
                Some("Jane Smith")
            );
            assert_eq!(table.len(), 1);
        }
    }
}
