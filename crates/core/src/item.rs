use serde::{Deserialize, Serialize};

/// One addressable unit of work in a stack (e.g. one slice of a volume).
///
/// `index` is the authoritative identity: ids are opaque keys for the fetch
/// primitive and are not required to be unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackItem {
    pub id: String,
    pub index: usize,
    /// Derived score, recomputed on every focus or mode change. Higher = sooner.
    pub priority: f64,
}

impl StackItem {
    pub fn new(id: impl Into<String>, index: usize) -> Self {
        Self {
            id: id.into(),
            index,
            priority: 0.0,
        }
    }

    /// Build the dense `0..N` item list for an ordered id sequence.
    pub fn from_ids<I, S>(ids: I) -> Vec<StackItem>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter()
            .enumerate()
            .map(|(index, id)| StackItem::new(id, index))
            .collect()
    }
}

/// Device class used to pick conservative or aggressive concurrency tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Constrained decode memory: keep few fetches in flight.
    Mobile,
    Desktop,
}

impl DeviceClass {
    pub fn from_is_mobile(is_mobile: bool) -> Self {
        if is_mobile {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceClass::Mobile => write!(f, "mobile"),
            DeviceClass::Desktop => write!(f, "desktop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_ids_assigns_dense_indices() {
        let items = StackItem::from_ids(["a", "b", "a"]);
        let indices: Vec<usize> = items.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        // Duplicate ids stay distinct items.
        assert_eq!(items[0].id, items[2].id);
        assert_ne!(items[0].index, items[2].index);
    }

    #[test]
    fn from_ids_empty() {
        let items = StackItem::from_ids(Vec::<String>::new());
        assert!(items.is_empty());
    }

    #[test]
    fn device_class_from_flag() {
        assert_eq!(DeviceClass::from_is_mobile(true), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_is_mobile(false), DeviceClass::Desktop);
        assert_eq!(DeviceClass::Desktop.to_string(), "desktop");
    }

    #[test]
    fn device_class_serde() {
        let json = serde_json::to_string(&DeviceClass::Mobile).unwrap();
        assert_eq!(json, "\"mobile\"");
    }
}
