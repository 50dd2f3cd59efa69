use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ModuleId, Percent};

/// Per-module completion map.
///
/// Keys are unique per module and insertion order is irrelevant; a
/// `BTreeMap` keeps the serialized form deterministic. The JSON shape is a
/// plain object of module-id string to integer percentage, which is exactly
/// the persisted snapshot layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressMap {
    modules: BTreeMap<ModuleId, Percent>,
}

impl ProgressMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored percentage, or 0 when the module is absent.
    #[must_use]
    pub fn get(&self, module_id: &ModuleId) -> Percent {
        self.modules.get(module_id).copied().unwrap_or(Percent::ZERO)
    }

    /// Stores a percentage, overwriting any prior value.
    pub fn set(&mut self, module_id: ModuleId, percent: Percent) {
        self.modules.insert(module_id, percent);
    }

    /// Forgets a module entirely, returning the prior value.
    ///
    /// Absence and an explicit zero both read as 0 through [`Self::get`];
    /// they differ only in snapshot membership (see [`Self::contains`]).
    pub fn remove(&mut self, module_id: &ModuleId) -> Option<Percent> {
        self.modules.remove(module_id)
    }

    /// Empties the map.
    pub fn clear(&mut self) {
        self.modules.clear();
    }

    /// Returns true when the module has an entry, even a zero one.
    #[must_use]
    pub fn contains(&self, module_id: &ModuleId) -> bool {
        self.modules.contains_key(module_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleId, Percent)> {
        self.modules.iter().map(|(id, percent)| (id, *percent))
    }

    /// Mean completion across the given modules, rounded and clamped.
    ///
    /// Modules without an entry contribute 0. An empty list yields 0.
    #[must_use]
    pub fn course_progress(&self, module_ids: &[ModuleId]) -> Percent {
        if module_ids.is_empty() {
            return Percent::ZERO;
        }
        let values: Vec<Percent> = module_ids.iter().map(|id| self.get(id)).collect();
        Percent::mean(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str) -> ModuleId {
        ModuleId::new(id)
    }

    #[test]
    fn get_missing_module_is_zero() {
        let map = ProgressMap::new();
        assert_eq!(map.get(&module("m1")), Percent::ZERO);
    }

    #[test]
    fn set_overwrites_prior_value() {
        let mut map = ProgressMap::new();
        map.set(module("m1"), Percent::from_raw(30.0));
        map.set(module("m1"), Percent::from_raw(80.0));
        assert_eq!(map.get(&module("m1")).value(), 80);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_differs_from_zero_in_membership() {
        let mut map = ProgressMap::new();
        map.set(module("m1"), Percent::ZERO);
        assert!(map.contains(&module("m1")));
        assert_eq!(map.get(&module("m1")), Percent::ZERO);

        map.remove(&module("m1"));
        assert!(!map.contains(&module("m1")));
        assert_eq!(map.get(&module("m1")), Percent::ZERO);
    }

    #[test]
    fn course_progress_scenario() {
        let mut map = ProgressMap::new();
        map.set(module("m1"), Percent::from_raw(100.0));
        map.set(module("m2"), Percent::from_raw(50.0));
        map.set(module("m3"), Percent::from_raw(0.0));

        let modules = [module("m1"), module("m2"), module("m3")];
        assert_eq!(map.course_progress(&modules).value(), 50);
    }

    #[test]
    fn course_progress_of_empty_list_is_zero() {
        let mut map = ProgressMap::new();
        map.set(module("m1"), Percent::COMPLETE);
        assert_eq!(map.course_progress(&[]), Percent::ZERO);
    }

    #[test]
    fn course_progress_counts_missing_modules_as_zero() {
        let mut map = ProgressMap::new();
        map.set(module("m1"), Percent::COMPLETE);

        let modules = [module("m1"), module("m2")];
        assert_eq!(map.course_progress(&modules).value(), 50);
    }

    #[test]
    fn json_shape_is_flat_object() {
        let mut map = ProgressMap::new();
        map.set(module("m1"), Percent::from_raw(75.0));
        map.set(module("m2"), Percent::ZERO);

        let raw = serde_json::to_string(&map).unwrap();
        assert_eq!(raw, r#"{"m1":75,"m2":0}"#);
    }

    #[test]
    fn json_roundtrip_preserves_contents() {
        let mut map = ProgressMap::new();
        map.set(module("m1"), Percent::from_raw(75.0));
        map.set(module("m2"), Percent::COMPLETE);

        let raw = serde_json::to_string(&map).unwrap();
        let restored: ProgressMap = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, map);
    }

    #[test]
    fn corrupted_snapshot_values_clamp_on_read() {
        let restored: ProgressMap = serde_json::from_str(r#"{"m1":300,"m2":-7}"#).unwrap();
        assert_eq!(restored.get(&module("m1")), Percent::COMPLETE);
        assert_eq!(restored.get(&module("m2")), Percent::ZERO);
    }
}
