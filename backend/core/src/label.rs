use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HintError;

/// Default alphabet used to build the label universe.
pub const DEFAULT_ALPHABET: &str = "asdfghjklqwertyuiopzxcvbnm";

/// A short hint label such as `"f"` or `"jk"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, which is what matters for typing.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Order of the free sequence: longer labels first, equal lengths in
/// lexicographic order. The tail therefore holds the shortest labels.
pub fn free_order(a: &Label, b: &Label) -> Ordering {
    b.len().cmp(&a.len()).then_with(|| a.cmp(b))
}

/// Sort a slice into free-sequence order.
pub fn sort_free(labels: &mut [Label]) {
    labels.sort_by(free_order);
}

/// The fixed set of labels a pool hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelUniverse {
    labels: Vec<Label>,
    index: HashSet<Label>,
}

impl LabelUniverse {
    /// Every single character of `alphabet`, then every ordered pair.
    pub fn from_alphabet(alphabet: &str) -> Result<Self, HintError> {
        let chars: Vec<char> = alphabet.chars().collect();
        if chars.is_empty() {
            return Err(HintError::InvalidAlphabet("alphabet is empty".into()));
        }
        let mut seen = HashSet::new();
        for c in &chars {
            if c.is_whitespace() {
                return Err(HintError::InvalidAlphabet(
                    "alphabet contains whitespace".into(),
                ));
            }
            if !seen.insert(*c) {
                return Err(HintError::InvalidAlphabet(format!(
                    "duplicate character '{c}'"
                )));
            }
        }

        let singles = chars.iter().map(|c| Label::new(c.to_string()));
        let pairs = chars
            .iter()
            .flat_map(|a| chars.iter().map(move |b| Label::new(format!("{a}{b}"))));
        Ok(Self::from_labels(singles.chain(pairs)))
    }

    /// Build a universe from an explicit list. Duplicates are dropped.
    pub fn from_labels<I, L>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let mut index = HashSet::new();
        let labels = labels
            .into_iter()
            .map(Into::into)
            .filter(|l: &Label| index.insert(l.clone()))
            .collect();
        Self { labels, index }
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.index.contains(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    /// All labels in free-sequence order.
    pub fn sorted(&self) -> Vec<Label> {
        let mut labels = self.labels.clone();
        sort_free(&mut labels);
        labels
    }
}

impl Default for LabelUniverse {
    fn default() -> Self {
        match Self::from_alphabet(DEFAULT_ALPHABET) {
            Ok(universe) => universe,
            Err(_) => Self::from_labels(Vec::<Label>::new()),
        }
    }
}
