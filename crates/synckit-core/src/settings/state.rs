// # Settings State
//
// Working copy and baseline of one settings resource, plus the synchronous
// reducers that move between them. Nothing here suspends or talks to the
// network; the store wraps this in a lock and drives it.
//
// ## Invariants
//
// - Once both maps were populated they share a key set; the working copy is
//   the superset while local-only edits exist
// - "Unchanged" means present on both sides and equal per compared key; a
//   key present on one side only is a change, whatever its value
// - Load fills the working copy only for keys not edited locally
// - A save response replaces exactly the keys it contains in both maps

use serde_json::{Map, Value};

/// Working copy + baseline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsState {
    /// Working copy, mutated by local edits
    pub settings: Option<Map<String, Value>>,
    /// Baseline, the last value known to be persisted
    pub saved_settings: Option<Map<String, Value>>,
}

impl SettingsState {
    /// Apply server values from a load
    ///
    /// Keys already present in the working copy keep their local value and
    /// only update the baseline.
    pub fn receive_loaded(&mut self, values: &Map<String, Value>) {
        let settings = self.settings.get_or_insert_with(Map::new);
        let saved = self.saved_settings.get_or_insert_with(Map::new);

        for (name, value) in values {
            if !settings.contains_key(name) {
                settings.insert(name.clone(), value.clone());
            }
            saved.insert(name.clone(), value.clone());
        }
    }

    /// Shallow-merge local edits into the working copy
    pub fn set(&mut self, partial: Map<String, Value>) {
        self.settings.get_or_insert_with(Map::new).extend(partial);
    }

    /// Apply a save response; keys the response omits are left as they were
    pub fn receive_saved(&mut self, response: &Map<String, Value>) {
        let settings = self.settings.get_or_insert_with(Map::new);
        let saved = self.saved_settings.get_or_insert_with(Map::new);

        for (name, value) in response {
            settings.insert(name.clone(), value.clone());
            saved.insert(name.clone(), value.clone());
        }
    }

    /// Reset the working copy to the baseline
    pub fn rollback_all(&mut self) {
        self.settings = self.saved_settings.clone();
    }

    /// Reset one key of the working copy to the baseline
    pub fn rollback_one(&mut self, name: &str) {
        match self.saved_settings.as_ref().and_then(|saved| saved.get(name)) {
            Some(value) => {
                let value = value.clone();
                self.settings
                    .get_or_insert_with(Map::new)
                    .insert(name.to_string(), value);
            }
            None => {
                if let Some(settings) = &mut self.settings {
                    settings.remove(name);
                }
            }
        }
    }

    /// Whether any of `keys` differs between working copy and baseline
    ///
    /// `None` compares every key present in either map; an empty slice
    /// compares nothing. `equal` decides per key whether two values match.
    pub fn have_changed(
        &self,
        keys: Option<&[&str]>,
        equal: &dyn Fn(&str, &Value, &Value) -> bool,
    ) -> bool {
        match keys {
            Some(keys) => keys.iter().any(|name| self.differs(name, equal)),
            None => self
                .working()
                .keys()
                .chain(self.baseline().keys())
                .any(|name| self.differs(name, equal)),
        }
    }

    /// Working-copy entries that differ from the baseline
    pub fn changed_settings(
        &self,
        equal: &dyn Fn(&str, &Value, &Value) -> bool,
    ) -> Map<String, Value> {
        self.working()
            .iter()
            .filter(|(name, _)| self.differs(name, equal))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn differs(&self, name: &str, equal: &dyn Fn(&str, &Value, &Value) -> bool) -> bool {
        match (self.working().get(name), self.baseline().get(name)) {
            (Some(current), Some(saved)) => !equal(name, current, saved),
            (None, None) => false,
            _ => true,
        }
    }

    fn working(&self) -> &Map<String, Value> {
        self.settings.as_ref().unwrap_or(empty())
    }

    fn baseline(&self) -> &Map<String, Value> {
        self.saved_settings.as_ref().unwrap_or(empty())
    }
}

fn empty() -> &'static Map<String, Value> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    EMPTY.get_or_init(Map::new)
}
