//! Conversion between environment action ids and the phrases shown to the model.
//!
//! Movement ids use the freeciv eight-direction order (`goto_0` is north-west, `goto_7`
//! south-east). Everything else only swaps underscores for spaces.

const GOTO_PREFIX: &str = "goto_";
const MOVE_PREFIX: &str = "move ";

pub const DIR8_NAMES: [&str; 8] = [
    "NorthWest",
    "North",
    "NorthEast",
    "West",
    "East",
    "SouthWest",
    "South",
    "SouthEast",
];

/// `goto_1` -> `move North`, `build_city` -> `build city`.
pub fn readable_name(action_id: &str) -> String {
    if let Some(dir) = action_id.strip_prefix(GOTO_PREFIX)
        && dir.len() == 1
        && let Ok(idx) = dir.parse::<usize>()
        && let Some(name) = DIR8_NAMES.get(idx)
    {
        return format!("{MOVE_PREFIX}{name}");
    }
    action_id.replace('_', " ")
}

/// Inverse of [`readable_name`]. Direction names are matched case-insensitively.
pub fn action_id(readable: &str) -> String {
    let readable = readable.trim();
    if let Some(dir) = readable.strip_prefix(MOVE_PREFIX)
        && let Some(idx) = DIR8_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(dir.trim()))
    {
        return format!("{GOTO_PREFIX}{idx}");
    }
    readable.replace(' ', "_")
}

/// Per-entity table of `(action id, prompt name)` pairs.
///
/// Lookups go through the table rather than [`action_id`], so a name always maps back to the id
/// it was built from even when two ids would render to the same phrase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionVocabulary {
    entries: Vec<(String, String)>,
}

impl ActionVocabulary {
    pub fn readable(action_ids: &[String]) -> Self {
        let mut entries: Vec<(String, String)> = Vec::with_capacity(action_ids.len());
        for id in action_ids {
            let mut name = readable_name(id);
            if entries.iter().any(|(_, existing)| existing == &name) {
                name = format!("{name} [{id}]");
            }
            entries.push((id.clone(), name));
        }
        Self { entries }
    }

    pub fn identity(action_ids: &[String]) -> Self {
        Self {
            entries: action_ids
                .iter()
                .map(|id| (id.clone(), id.clone()))
                .collect(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn goto_ids_become_directions() {
        assert_eq!(readable_name("goto_0"), "move NorthWest");
        assert_eq!(readable_name("goto_6"), "move South");
        assert_eq!(action_id("move South"), "goto_6");
        assert_eq!(action_id("move northeast"), "goto_2");
    }

    #[test]
    fn out_of_range_goto_is_plain_id() {
        assert_eq!(readable_name("goto_9"), "goto 9");
        assert_eq!(readable_name("goto_12"), "goto 12");
        assert_eq!(action_id("move Up"), "move_Up");
    }

    #[test]
    fn underscores_round_trip() {
        for id in ["build_city", "fortify", "city_buy_production", "goto_3"] {
            assert_eq!(action_id(&readable_name(id)), id);
        }
    }

    #[test]
    fn vocabulary_maps_names_back_to_ids() {
        let vocab = ActionVocabulary::readable(&ids(&["goto_1", "build_city", "fortify"]));
        assert_eq!(vocab.names(), ids(&["move North", "build city", "fortify"]));
        assert_eq!(vocab.id_for("move North"), Some("goto_1"));
        assert_eq!(vocab.id_for("build city"), Some("build_city"));
        assert_eq!(vocab.id_for("disband"), None);
    }

    #[test]
    fn colliding_names_are_disambiguated_in_either_order() {
        for order in [["build city", "build_city"], ["build_city", "build city"]] {
            let vocab = ActionVocabulary::readable(&ids(&order));
            let names = vocab.names();
            assert_eq!(names[0], "build city");
            assert_eq!(names[1], format!("build city [{}]", order[1]));
            assert_ne!(names[0], names[1]);
            for (id, name) in order.iter().zip(&names) {
                assert_eq!(vocab.id_for(name), Some(*id));
            }
        }
    }

    #[test]
    fn identity_vocabulary_passes_ids_through() {
        let vocab = ActionVocabulary::identity(&ids(&["goto_1"]));
        assert_eq!(vocab.names(), ids(&["goto_1"]));
        assert_eq!(vocab.id_for("goto_1"), Some("goto_1"));
    }
}
