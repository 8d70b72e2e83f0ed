//! Sequential schema migration.
//!
//! A store created at version N is upgraded to the latest version by
//! running every step in `(N, LATEST]` in order, bumping the stored
//! version after each step completes. Steps rewrite record payload
//! shapes in place; a record whose payload does not decode is logged
//! and left as-is rather than failing the whole upgrade.
//!
//! Versions newer than [`LATEST_VERSION`] are rejected at open. No
//! downgrade path exists.

use crate::codec::{map_field, set_map_field, value_from_cbor, value_to_cbor};
use crate::error::StoreResult;
use crate::object::StoredObject;
use crate::table::Table;
use crate::types::ObjectKind;
use ciborium::value::Value;
use std::collections::BTreeMap;

/// Newest schema version this engine reads and writes.
pub const LATEST_VERSION: u32 = 3;

/// Returns true if a stored schema version can be opened (possibly
/// after upgrading).
#[must_use]
pub const fn version_supported(stored: u32) -> bool {
    stored <= LATEST_VERSION
}

/// One step in the upgrade chain, moving stores from version
/// `target_version() - 1` to `target_version()`.
pub trait UpgradeStep {
    /// The version this step upgrades to.
    fn target_version(&self) -> u32;

    /// Human-readable step name for logging.
    fn name(&self) -> &'static str;

    /// The object kind whose table this step rewrites.
    fn kind(&self) -> ObjectKind;

    /// Rewrites one decoded payload in place.
    ///
    /// Returns true if the payload changed. Payloads already in the
    /// target shape must be left alone, so a restarted upgrade
    /// converges.
    fn rewrite(&self, payload: &mut Value) -> StoreResult<bool>;
}

/// Result of running one upgrade step over a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Records whose payload was rewritten.
    pub rewritten: usize,
    /// Records skipped because their payload did not decode.
    pub skipped: usize,
}

/// The ordered registry of upgrade steps.
pub struct UpgradeChain {
    steps: BTreeMap<u32, Box<dyn UpgradeStep>>,
}

impl UpgradeChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: BTreeMap::new(),
        }
    }

    /// The chain of built-in steps covering every released version.
    #[must_use]
    pub fn builtin() -> Self {
        let mut chain = Self::new();
        chain.register(Box::new(EventTypeTagging));
        chain.register(Box::new(GenderCodes));
        chain.register(Box::new(PlaceAltNames));
        chain
    }

    /// Registers a step, replacing any step with the same target.
    pub fn register(&mut self, step: Box<dyn UpgradeStep>) {
        self.steps.insert(step.target_version(), step);
    }

    /// Returns the steps needed to move from `stored` to the latest
    /// version, in order. Empty when already at the latest.
    pub fn steps_from(&self, stored: u32) -> impl Iterator<Item = &dyn UpgradeStep> {
        self.steps
            .range(stored.saturating_add(1)..)
            .take_while(|(target, _)| **target <= LATEST_VERSION)
            .map(|(_, step)| step.as_ref())
    }

    /// Runs one step over its table.
    pub fn run_step(step: &dyn UpgradeStep, table: &mut Table) -> StoreResult<StepOutcome> {
        let mut outcome = StepOutcome::default();
        let mut rewrites: Vec<StoredObject> = Vec::new();

        for (handle, obj) in table.iter() {
            let mut value = match value_from_cbor(&obj.payload) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(
                        step = step.name(),
                        %handle,
                        error = %err,
                        "skipping record with undecodable payload"
                    );
                    outcome.skipped += 1;
                    continue;
                }
            };
            if step.rewrite(&mut value)? {
                rewrites.push(StoredObject::new(
                    obj.handle,
                    obj.gramps_id.clone(),
                    value_to_cbor(&value)?,
                ));
            }
        }

        outcome.rewritten = rewrites.len();
        for obj in rewrites {
            table.put(obj);
        }

        tracing::info!(
            step = step.name(),
            target = step.target_version(),
            rewritten = outcome.rewritten,
            skipped = outcome.skipped,
            "upgrade step complete"
        );
        Ok(outcome)
    }
}

impl Default for UpgradeChain {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for UpgradeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeChain")
            .field("targets", &self.steps.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// v0 -> v1: event `type` moves from a bare string to a tagged
/// `{code, custom}` map. Well-known names get codes; anything else
/// becomes a custom type.
struct EventTypeTagging;

impl EventTypeTagging {
    fn code_for(name: &str) -> i64 {
        match name {
            "Birth" => 1,
            "Death" => 2,
            "Marriage" => 3,
            _ => 0,
        }
    }
}

impl UpgradeStep for EventTypeTagging {
    fn target_version(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str {
        "event-type-tagging"
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Event
    }

    fn rewrite(&self, payload: &mut Value) -> StoreResult<bool> {
        let Some(Value::Text(name)) = map_field(payload, "type") else {
            return Ok(false);
        };
        let code = Self::code_for(name);
        let custom = if code == 0 { name.clone() } else { String::new() };

        let tagged = Value::Map(vec![
            (Value::Text("code".into()), Value::Integer(code.into())),
            (Value::Text("custom".into()), Value::Text(custom)),
        ]);
        set_map_field(payload, "type", tagged);
        Ok(true)
    }
}

/// v1 -> v2: person `gender` moves from a string to an integer code
/// (0 unknown, 1 male, 2 female).
struct GenderCodes;

impl UpgradeStep for GenderCodes {
    fn target_version(&self) -> u32 {
        2
    }

    fn name(&self) -> &'static str {
        "gender-codes"
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Person
    }

    fn rewrite(&self, payload: &mut Value) -> StoreResult<bool> {
        let Some(Value::Text(name)) = map_field(payload, "gender") else {
            return Ok(false);
        };
        let code: i64 = match name.as_str() {
            "male" => 1,
            "female" => 2,
            _ => 0,
        };
        set_map_field(payload, "gender", Value::Integer(code.into()));
        Ok(true)
    }
}

/// v2 -> v3: place records grow an `alt_names` list, empty when absent.
struct PlaceAltNames;

impl UpgradeStep for PlaceAltNames {
    fn target_version(&self) -> u32 {
        3
    }

    fn name(&self) -> &'static str {
        "place-alt-names"
    }

    fn kind(&self) -> ObjectKind {
        ObjectKind::Place
    }

    fn rewrite(&self, payload: &mut Value) -> StoreResult<bool> {
        if map_field(payload, "alt_names").is_some() {
            return Ok(false);
        }
        Ok(set_map_field(payload, "alt_names", Value::Array(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::to_cbor;
    use crate::types::{GrampsId, Handle};
    use rootsdb_storage::InMemoryBackend;

    fn table_with(kind: ObjectKind, payloads: Vec<Value>) -> Table {
        let mut table = Table::open(kind, Box::new(InMemoryBackend::new())).unwrap();
        for (i, value) in payloads.into_iter().enumerate() {
            table.put(StoredObject::new(
                Handle::new(),
                GrampsId::new(format!("X{i:04}")),
                to_cbor(&value).unwrap(),
            ));
        }
        table
    }

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::Text(k.to_string()), v))
                .collect(),
        )
    }

    #[test]
    fn chain_orders_steps_sequentially() {
        let chain = UpgradeChain::builtin();
        let targets: Vec<_> = chain.steps_from(0).map(|s| s.target_version()).collect();
        assert_eq!(targets, vec![1, 2, 3]);

        let targets: Vec<_> = chain.steps_from(2).map(|s| s.target_version()).collect();
        assert_eq!(targets, vec![3]);

        assert_eq!(chain.steps_from(LATEST_VERSION).count(), 0);
    }

    #[test]
    fn version_gate() {
        assert!(version_supported(0));
        assert!(version_supported(LATEST_VERSION));
        assert!(!version_supported(LATEST_VERSION + 1));
    }

    #[test]
    fn event_type_tagging_rewrites_known_and_custom() {
        let mut table = table_with(
            ObjectKind::Event,
            vec![
                map(vec![("type", Value::Text("Birth".into()))]),
                map(vec![("type", Value::Text("Census".into()))]),
            ],
        );
        let outcome = UpgradeChain::run_step(&EventTypeTagging, &mut table).unwrap();
        assert_eq!(outcome.rewritten, 2);
        assert_eq!(outcome.skipped, 0);

        let shapes: Vec<_> = table
            .iter()
            .map(|(_, obj)| value_from_cbor(&obj.payload).unwrap())
            .collect();
        for shape in &shapes {
            let tagged = map_field(shape, "type").unwrap();
            assert!(map_field(tagged, "code").is_some());
            assert!(map_field(tagged, "custom").is_some());
        }
    }

    #[test]
    fn event_type_tagging_is_idempotent() {
        let mut table = table_with(
            ObjectKind::Event,
            vec![map(vec![("type", Value::Text("Death".into()))])],
        );
        UpgradeChain::run_step(&EventTypeTagging, &mut table).unwrap();
        let outcome = UpgradeChain::run_step(&EventTypeTagging, &mut table).unwrap();
        assert_eq!(outcome.rewritten, 0);
    }

    #[test]
    fn gender_codes_rewrite() {
        let mut table = table_with(
            ObjectKind::Person,
            vec![
                map(vec![("gender", Value::Text("female".into()))]),
                map(vec![("gender", Value::Text("unsure".into()))]),
                map(vec![("gender", Value::Integer(1.into()))]),
            ],
        );
        let outcome = UpgradeChain::run_step(&GenderCodes, &mut table).unwrap();
        // the already-integer record is untouched
        assert_eq!(outcome.rewritten, 2);

        let codes: Vec<i128> = table
            .iter()
            .map(|(_, obj)| {
                let value = value_from_cbor(&obj.payload).unwrap();
                match map_field(&value, "gender") {
                    Some(Value::Integer(code)) => i128::from(*code),
                    other => panic!("expected integer gender, got {other:?}"),
                }
            })
            .collect();
        assert!(codes.contains(&0));
        assert!(codes.contains(&1));
        assert!(codes.contains(&2));
    }

    #[test]
    fn place_alt_names_added_once() {
        let mut table = table_with(
            ObjectKind::Place,
            vec![
                map(vec![("name", Value::Text("London".into()))]),
                map(vec![
                    ("name", Value::Text("Wien".into())),
                    ("alt_names", Value::Array(vec![Value::Text("Vienna".into())])),
                ]),
            ],
        );
        let outcome = UpgradeChain::run_step(&PlaceAltNames, &mut table).unwrap();
        assert_eq!(outcome.rewritten, 1);

        // existing lists are preserved, not emptied
        let kept = table.iter().any(|(_, obj)| {
            let value = value_from_cbor(&obj.payload).unwrap();
            matches!(
                map_field(&value, "alt_names"),
                Some(Value::Array(items)) if items.len() == 1
            )
        });
        assert!(kept);
    }

    #[test]
    fn undecodable_payloads_are_skipped() {
        let mut table = Table::open(ObjectKind::Person, Box::new(InMemoryBackend::new())).unwrap();
        table.put(StoredObject::new(
            Handle::new(),
            GrampsId::new("I0001"),
            vec![0xff, 0x00, 0x01],
        ));
        table.put(StoredObject::new(
            Handle::new(),
            GrampsId::new("I0002"),
            to_cbor(&map(vec![("gender", Value::Text("male".into()))])).unwrap(),
        ));

        let outcome = UpgradeChain::run_step(&GenderCodes, &mut table).unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.rewritten, 1);
    }
}
