use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Key of the scenario message inside `llm_info`; it is not an entity class.
pub const MESSAGE_KEY: &str = "message";

/// Identity of one controllable entity: its class tag plus the id the environment assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct EntityKey {
    pub class: String,
    pub id: String,
}

impl EntityKey {
    pub fn new(class: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.class, self.id)
    }
}

/// One unit or city as delivered by the environment.
///
/// Fields the agent does not interpret are kept verbatim in `extra` and end up in the prompt.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct EntityRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub available_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub observations: serde_json::Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EntityRecord {
    pub fn new<I, S>(name: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            available_actions: actions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_observations(mut self, observations: serde_json::Value) -> Self {
        self.observations = observations;
        self
    }

    pub fn has_actions(&self) -> bool {
        !self.available_actions.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum LlmInfoEntry {
    Message(String),
    Entities(IndexMap<String, EntityRecord>),
    Other(Value),
}

impl LlmInfoEntry {
    /// An object of objects is an entity class. Records are decoded one by one, so a single
    /// malformed record is dropped without taking the rest of its class with it.
    fn decode(class: &str, value: Value) -> Self {
        match value {
            Value::String(msg) => Self::Message(msg),
            Value::Object(map) if map.values().all(Value::is_object) => {
                let mut records = IndexMap::with_capacity(map.len());
                for (id, raw) in map {
                    match serde_json::from_value::<EntityRecord>(raw) {
                        Ok(record) => {
                            records.insert(id, record);
                        }
                        Err(err) => tracing::warn!(
                            class = %class,
                            id = %id,
                            error = %err,
                            "observation.entity_skipped"
                        ),
                    }
                }
                Self::Entities(records)
            }
            other => Self::Other(other),
        }
    }
}

/// Entity class -> entity id -> record, in the order the environment produced them.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct LlmInfo(IndexMap<String, LlmInfoEntry>);

impl<'de> Deserialize<'de> for LlmInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = IndexMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .map(|(class, value)| {
                    let entry = LlmInfoEntry::decode(&class, value);
                    (class, entry)
                })
                .collect(),
        ))
    }
}

impl LlmInfo {
    pub fn insert_entity(
        &mut self,
        class: impl Into<String>,
        id: impl Into<String>,
        record: EntityRecord,
    ) {
        let entry = self
            .0
            .entry(class.into())
            .or_insert_with(|| LlmInfoEntry::Entities(IndexMap::new()));
        match entry {
            LlmInfoEntry::Entities(map) => {
                map.insert(id.into(), record);
            }
            other => {
                let mut map = IndexMap::new();
                map.insert(id.into(), record);
                *other = LlmInfoEntry::Entities(map);
            }
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.0
            .insert(MESSAGE_KEY.to_string(), LlmInfoEntry::Message(message.into()));
    }

    /// Game scenario message, if the environment sent a non-empty one.
    pub fn message(&self) -> Option<&str> {
        match self.0.get(MESSAGE_KEY) {
            Some(LlmInfoEntry::Message(msg)) if !msg.trim().is_empty() => Some(msg.as_str()),
            _ => None,
        }
    }

    /// All entities, classes first, then entities within each class, in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = (EntityKey, &EntityRecord)> {
        self.0
            .iter()
            .filter_map(|(class, entry)| match entry {
                LlmInfoEntry::Entities(map) => Some((class, map)),
                _ => None,
            })
            .flat_map(|(class, map)| {
                map.iter()
                    .map(move |(id, record)| (EntityKey::new(class.as_str(), id.as_str()), record))
            })
    }

    pub fn get(&self, key: &EntityKey) -> Option<&EntityRecord> {
        match self.0.get(&key.class) {
            Some(LlmInfoEntry::Entities(map)) => map.get(&key.id),
            _ => None,
        }
    }
}

/// Per-step `info` payload: the turn counter and the controllable entities.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TurnInfo {
    pub turn: u64,
    #[serde(default)]
    pub llm_info: LlmInfo,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TurnInfo {
    pub fn new(turn: u64, llm_info: LlmInfo) -> Self {
        Self {
            turn,
            llm_info,
            extra: serde_json::Map::new(),
        }
    }
}

/// One resolved `(entity_class, entity_id, action_name)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Decision {
    pub entity_class: String,
    pub entity_id: String,
    pub action_name: String,
}

impl Decision {
    pub fn new(key: &EntityKey, action_name: impl Into<String>) -> Self {
        Self {
            entity_class: key.class.clone(),
            entity_id: key.id.clone(),
            action_name: action_name.into(),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_class.as_str(), self.entity_id.as_str())
    }
}
