//! Label sets and label-name sanitization
//!
//! Observations carry their labels as ordered (name, value) pairs so a name can never be
//! separated from its value.

/// Prefix applied to workload label names that had to be rewritten
pub const DEFAULT_LABEL_PREFIX: &str = "label_";

/// Ordered label pairs of one observation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pairs: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pairs: Vec::with_capacity(capacity),
        }
    }

    /// Append a label
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// Builder form of [`LabelSet::push`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, value)| value.as_str())
    }

    /// Value of the first label called `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for LabelSet
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Whether `name` already matches `[a-zA-Z_][a-zA-Z0-9_]*`
pub fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Rewrite a label name to follow Prometheus conventions.
///
/// Valid names are returned unchanged. Otherwise every character outside `[a-zA-Z0-9_]`
/// becomes `_`, a leading digit gets an extra `_`, and `prefix` is prepended.
pub fn sanitize_label_name(name: &str, prefix: Option<&str>) -> String {
    if is_valid_label_name(name) {
        return name.to_string();
    }

    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }

    match prefix {
        Some(prefix) => format!("{prefix}{sanitized}"),
        None => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_set_keeps_order() {
        let labels = LabelSet::new()
            .with("gpu_dev_id", "0")
            .with("productname", "mi250")
            .with("device", "amd0");

        assert_eq!(labels.names().collect::<Vec<_>>(), vec!["gpu_dev_id", "productname", "device"]);
        assert_eq!(labels.values().collect::<Vec<_>>(), vec!["0", "mi250", "amd0"]);
        assert_eq!(labels.get("device"), Some("amd0"));
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_valid_label_names() {
        assert!(is_valid_label_name("label_1"));
        assert!(is_valid_label_name("_private"));
        assert!(!is_valid_label_name("1label"));
        assert!(!is_valid_label_name("app.kubernetes.io/name"));
        assert!(!is_valid_label_name(""));
    }

    #[test]
    fn test_valid_names_are_untouched() {
        assert_eq!(sanitize_label_name("label_1", Some(DEFAULT_LABEL_PREFIX)), "label_1");
    }

    #[test]
    fn test_label_sanitization() {
        assert_eq!(sanitize_label_name("test-key", None), "test_key");
        assert_eq!(sanitize_label_name("app.kubernetes.io/name", None), "app_kubernetes_io_name");
        assert_eq!(sanitize_label_name("1team", None), "_1team");
        assert_eq!(sanitize_label_name("équipe", None), "_quipe");
        assert_eq!(sanitize_label_name("", None), "_");
    }

    #[test]
    fn test_label_sanitization_with_prefix() {
        assert_eq!(sanitize_label_name("team-name", Some("label_")), "label_team_name");
        assert_eq!(sanitize_label_name("9lives", Some("label_")), "label__9lives");
    }
}
