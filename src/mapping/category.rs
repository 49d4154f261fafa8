//! Legacy category lookup.
//!
//! The legacy site stored content categories as free text. The new schema has
//! a fixed set; unknown values fall back to a designated member instead of
//! failing the row.

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTable {
    /// The enumerated target categories.
    pub members: Vec<String>,
    /// Category used when the legacy value is absent or unrecognized.
    pub fallback: String,
    /// Normalized legacy value -> member.
    #[serde(default)]
    pub aliases: IndexMap<String, String>,
}

impl CategoryTable {
    pub fn builtin() -> Self {
        let members = ["webinar", "news", "resource", "event"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let aliases = [
            ("webinars", "webinar"),
            ("online_seminar", "webinar"),
            ("web_seminar", "webinar"),
            ("press_release", "news"),
            ("announcement", "news"),
            ("article", "news"),
            ("resources", "resource"),
            ("publication", "resource"),
            ("download", "resource"),
            ("report", "resource"),
            ("events", "event"),
            ("workshop", "event"),
            ("field_day", "event"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            members,
            fallback: "news".to_string(),
            aliases,
        }
    }

    /// Normalize legacy free text into a lookup key (`"Press Release"` ->
    /// `"press_release"`).
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_case(Case::Snake)
    }

    /// Translate a legacy value into a member category.
    pub fn resolve(&self, raw: Option<&str>) -> &str {
        let key = match raw.map(Self::normalize) {
            Some(key) if !key.is_empty() => key,
            _ => return &self.fallback,
        };
        if let Some(member) = self.members.iter().find(|m| **m == key) {
            return member;
        }
        match self.aliases.get(&key) {
            Some(member) => member,
            None => {
                tracing::debug!("Unknown legacy category '{}', using '{}'", key, self.fallback);
                &self.fallback
            }
        }
    }

    /// Normalize members, the fallback and aliases to snake case, and check
    /// every target is a member.
    pub fn validate(&mut self) -> Result<(), String> {
        let mut members: Vec<String> = Vec::with_capacity(self.members.len());
        for raw in &self.members {
            let member = Self::normalize(raw);
            if member.is_empty() {
                return Err("category table has an empty member".to_string());
            }
            if members.contains(&member) {
                return Err(format!("category '{}' is listed twice", member));
            }
            members.push(member);
        }
        if members.is_empty() {
            return Err("category table has no members".to_string());
        }
        self.members = members;

        self.fallback = Self::normalize(&self.fallback);
        if !self.members.contains(&self.fallback) {
            return Err(format!(
                "fallback category '{}' is not one of {:?}",
                self.fallback, self.members
            ));
        }

        let mut normalized = IndexMap::with_capacity(self.aliases.len());
        for (alias, member) in &self.aliases {
            let member = Self::normalize(member);
            if !self.members.contains(&member) {
                return Err(format!(
                    "alias '{}' points to unknown category '{}'",
                    alias, member
                ));
            }
            normalized.insert(Self::normalize(alias), member);
        }
        self.aliases = normalized;
        Ok(())
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::builtin()
    }
}
