use std::{collections::BTreeMap, sync::Arc};

#[derive(Clone, Debug, Eq, Default)]
pub struct Labels(Arc<Map>);

pub type Map = BTreeMap<String, String>;

/// Selects the workloads fronted by a service.
///
/// Only equality requirements are supported, as a service's `spec.selector` cannot express set
/// operators.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct Selector {
    match_labels: Map,
}

// === Selector ===

impl Selector {
    pub fn from_map(map: Map) -> Self {
        Self { match_labels: map }
    }

    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    /// Returns true if every requirement in the selector is present with an equal value in
    /// `labels`.
    ///
    /// An empty selector matches all labels.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.0.get(k) == Some(v))
    }
}

impl From<Option<&Map>> for Selector {
    fn from(map: Option<&Map>) -> Self {
        Self::from_map(map.cloned().unwrap_or_default())
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

// === Labels ===

impl From<Map> for Labels {
    #[inline]
    fn from(labels: Map) -> Self {
        Self(Arc::new(labels))
    }
}

impl From<Option<&Map>> for Labels {
    #[inline]
    fn from(labels: Option<&Map>) -> Self {
        labels.cloned().unwrap_or_default().into()
    }
}

impl AsRef<Map> for Labels {
    #[inline]
    fn as_ref(&self) -> &Map {
        self.0.as_ref()
    }
}

impl<T: AsRef<Map>> std::cmp::PartialEq<T> for Labels {
    #[inline]
    fn eq(&self, t: &T) -> bool {
        self.0.as_ref().eq(t.as_ref())
    }
}

impl std::iter::FromIterator<(String, String)> for Labels {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(Arc::new(iter.into_iter().collect()))
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Labels {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        iter.into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::FromIterator;

    #[test]
    fn test_matches() {
        for (selector, labels, matches, msg) in &[
            (Selector::default(), Labels::default(), true, "empty match"),
            (
                Selector::default(),
                Labels::from_iter(Some(("app", "web"))),
                true,
                "empty selector matches any labels",
            ),
            (
                Selector::from_iter(Some(("app", "web"))),
                Labels::from_iter(Some(("app", "web"))),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("app", "web"))),
                Labels::from_iter(vec![("app", "web"), ("tier", "frontend")]),
                true,
                "sufficient label match",
            ),
            (
                Selector::from_iter(vec![("app", "web"), ("tier", "frontend")]),
                Labels::from_iter(Some(("app", "web"))),
                false,
                "missing label",
            ),
            (
                Selector::from_iter(Some(("app", "web"))),
                Labels::from_iter(Some(("app", "db"))),
                false,
                "mismatched value",
            ),
            (
                Selector::from_iter(Some(("app", "web"))),
                Labels::default(),
                false,
                "no labels",
            ),
        ] {
            assert_eq!(selector.matches(labels), *matches, "{}", msg);
        }
    }

    #[test]
    fn from_optional_map() {
        let selector = Selector::from(None);
        assert!(selector.is_empty());

        let map = Map::from_iter(Some(("app".to_string(), "web".to_string())));
        let labels = Labels::from(Some(&map));
        assert!(Selector::from(Some(&map)).matches(&labels));
        assert_eq!(labels.as_ref(), &map);
    }
}
