use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// The object the model is asked to return.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ActionChoice {
    #[serde(default)]
    pub reasoning: Option<String>,
    pub action_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChoiceParseError {
    #[error("invalid choice json")]
    InvalidJson,
    #[error("choice is not a json object")]
    NotAnObject,
    #[error("missing action_name")]
    MissingActionName,
    #[error("illegal action: {0}")]
    IllegalAction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no legal actions to choose from")]
pub struct NoLegalActions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSource {
    Llm { reasoning: Option<String> },
    Fallback { reason: ChoiceParseError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub action_name: String,
    pub source: ActionSource,
}

impl ResolvedAction {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ActionSource::Fallback { .. })
    }
}

/// Decodes the model reply as `{ "reasoning": "...", "action_name": "..." }`.
///
/// `reasoning` is optional; a non-string `action_name` counts as missing.
pub fn parse_action_choice(raw: &str) -> Result<ActionChoice, ChoiceParseError> {
    let value: serde_json::Value =
        serde_json::from_str(raw.trim()).map_err(|_| ChoiceParseError::InvalidJson)?;
    let obj = value.as_object().ok_or(ChoiceParseError::NotAnObject)?;

    let action_name = obj
        .get("action_name")
        .and_then(|v| v.as_str())
        .ok_or(ChoiceParseError::MissingActionName)?
        .to_string();
    let reasoning = obj
        .get("reasoning")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(ActionChoice {
        reasoning,
        action_name,
    })
}

/// Picks the model's action when it is legal, otherwise a uniformly random legal action.
///
/// Only an empty `legal` list is an error.
pub fn resolve_action<R: Rng + ?Sized>(
    raw: &str,
    legal: &[String],
    rng: &mut R,
) -> Result<ResolvedAction, NoLegalActions> {
    if legal.is_empty() {
        return Err(NoLegalActions);
    }

    let reason = match parse_action_choice(raw) {
        Ok(choice) if legal.contains(&choice.action_name) => {
            return Ok(ResolvedAction {
                action_name: choice.action_name,
                source: ActionSource::Llm {
                    reasoning: choice.reasoning,
                },
            });
        }
        Ok(choice) => ChoiceParseError::IllegalAction(choice.action_name),
        Err(err) => err,
    };

    let action_name = legal.choose(rng).cloned().ok_or(NoLegalActions)?;
    Ok(ResolvedAction {
        action_name,
        source: ActionSource::Fallback { reason },
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn legal(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_ok() {
        let choice =
            parse_action_choice("{\"reasoning\":\"safe\",\"action_name\":\"fortify\"}").unwrap();
        assert_eq!(choice.action_name, "fortify");
        assert_eq!(choice.reasoning.as_deref(), Some("safe"));
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        let choice = parse_action_choice("\n  {\"action_name\":\"move\"}  \n").unwrap();
        assert_eq!(choice.action_name, "move");
        assert_eq!(choice.reasoning, None);
    }

    #[test]
    fn parse_rejects_prose_and_fences() {
        assert_eq!(
            parse_action_choice("move please"),
            Err(ChoiceParseError::InvalidJson)
        );
        assert_eq!(
            parse_action_choice("```json\n{\"action_name\":\"move\"}\n```"),
            Err(ChoiceParseError::InvalidJson)
        );
    }

    #[test]
    fn parse_requires_string_action_name() {
        assert_eq!(
            parse_action_choice("{\"reasoning\":\"x\"}"),
            Err(ChoiceParseError::MissingActionName)
        );
        assert_eq!(
            parse_action_choice("{\"action_name\":3}"),
            Err(ChoiceParseError::MissingActionName)
        );
        assert_eq!(
            parse_action_choice("[\"move\"]"),
            Err(ChoiceParseError::NotAnObject)
        );
    }

    #[test]
    fn legal_choice_is_returned_exactly() {
        let mut rng = StdRng::seed_from_u64(7);
        let got = resolve_action(
            "{\"action_name\":\"move\"}",
            &legal(&["move", "fortify"]),
            &mut rng,
        )
        .unwrap();
        assert_eq!(got.action_name, "move");
        assert!(!got.is_fallback());
    }

    #[test]
    fn illegal_choice_falls_back_with_reason() {
        let mut rng = StdRng::seed_from_u64(7);
        let got = resolve_action(
            "{\"action_name\":\"disband\"}",
            &legal(&["move", "fortify"]),
            &mut rng,
        )
        .unwrap();
        assert!(["move", "fortify"].contains(&got.action_name.as_str()));
        assert_eq!(
            got.source,
            ActionSource::Fallback {
                reason: ChoiceParseError::IllegalAction("disband".to_string())
            }
        );
    }

    #[test]
    fn fallback_reaches_every_legal_action() {
        let actions = legal(&["move", "fortify", "sentry"]);
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = HashSet::new();
        for _ in 0..300 {
            let got = resolve_action("move please", &actions, &mut rng).unwrap();
            assert!(got.is_fallback());
            seen.insert(got.action_name);
        }
        assert_eq!(seen.len(), actions.len());
    }

    #[test]
    fn empty_legal_list_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            resolve_action("{\"action_name\":\"move\"}", &[], &mut rng),
            Err(NoLegalActions)
        );
    }

    fn raw_reply() -> impl Strategy<Value = String> {
        prop_oneof![
            ".*",
            "[a-z ]{1,12}".prop_map(|a| format!("{{\"action_name\":\"{a}\"}}")),
            "[a-z ]{1,12}".prop_map(|a| format!("{{\"reasoning\":\"{a}\"}}")),
        ]
    }

    proptest! {
        #[test]
        fn resolved_action_is_always_legal(
            raw in raw_reply(),
            actions in prop::collection::vec("[a-z ]{1,12}", 1..6),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let got = resolve_action(&raw, &actions, &mut rng).unwrap();
            prop_assert!(actions.contains(&got.action_name));
        }

        #[test]
        fn legal_json_choice_is_never_replaced(
            actions in prop::collection::vec("[a-z]{1,12}", 1..6),
            pick in any::<prop::sample::Index>(),
            seed in any::<u64>(),
        ) {
            let chosen = pick.get(&actions).clone();
            let raw = format!("{{\"reasoning\":\"r\",\"action_name\":\"{chosen}\"}}");
            let mut rng = StdRng::seed_from_u64(seed);
            let got = resolve_action(&raw, &actions, &mut rng).unwrap();
            prop_assert_eq!(&got.action_name, &chosen);
            prop_assert!(!got.is_fallback());
        }
    }
}
