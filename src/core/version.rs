//! Loose version comparison for `fromversion` / `toversion` gates

use std::cmp::Ordering;
use std::fmt;

/// Lower bound used when a test has no `fromversion`
pub const DEFAULT_FROM_VERSION: &str = "0.0.0";

/// Upper bound used when a test has no `toversion`
pub const DEFAULT_TO_VERSION: &str = "99.99.99";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Number(u64),
    Alpha(String),
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Number(a), Component::Number(b)) => a.cmp(b),
            (Component::Alpha(a), Component::Alpha(b)) => a.cmp(b),
            (Component::Number(_), Component::Alpha(_)) => Ordering::Less,
            (Component::Alpha(_), Component::Number(_)) => Ordering::Greater,
        }
    }
}

/// A version made of digit runs and letter runs, e.g. `5.5.0` or `6.0b1`
///
/// Separators are dropped. Digit runs compare numerically, letter runs
/// lexically, and a number sorts before letters at the same position.
#[derive(Debug, Clone)]
pub struct LooseVersion {
    components: Vec<Component>,
    raw: String,
}

impl PartialEq for LooseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for LooseVersion {}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl LooseVersion {
    pub fn parse(raw: &str) -> Self {
        let mut components = Vec::new();
        let mut chars = raw.trim().chars().peekable();

        while let Some(&ch) = chars.peek() {
            if ch.is_ascii_digit() {
                let mut run = String::new();
                while let Some(&d) = chars.peek().filter(|c| c.is_ascii_digit()) {
                    run.push(d);
                    chars.next();
                }
                // Digit runs longer than u64 fall back to lexical order
                match run.parse::<u64>() {
                    Ok(n) => components.push(Component::Number(n)),
                    Err(_) => components.push(Component::Alpha(run)),
                }
            } else if ch.is_alphabetic() {
                let mut run = String::new();
                while let Some(&a) = chars.peek().filter(|c| c.is_alphabetic()) {
                    run.push(a);
                    chars.next();
                }
                components.push(Component::Alpha(run));
            } else {
                chars.next();
            }
        }

        Self {
            components,
            raw: raw.trim().to_string(),
        }
    }

    /// Check `from <= self <= to`
    pub fn within(&self, from: &LooseVersion, to: &LooseVersion) -> bool {
        from <= self && self <= to
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for LooseVersion {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
