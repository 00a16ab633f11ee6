// Mapping schemas
// A schema is an ordered set of key specs plus key-count checks. Builders
// consume and return the schema; `extend` produces a fresh merged schema.

use crate::context::{Context, Rejected};
use crate::error::SchemaError;
use crate::{Validate, Validator, ValueType};
use fwgen_diagnostics::ErrorKind;
use fwgen_value::{Setting, Settings, Value};
use indexmap::IndexMap;
use std::fmt::Write;

/// How a key participates in a mapping
#[derive(Debug, Clone, PartialEq)]
pub enum KeyRule {
    Required,
    /// Optional with an optional literal default, validated like user input
    Optional(Option<Value>),
    /// At most one key of the named group may be present
    Exclusive(String),
    /// An id key: absent means the child validator sees `null`
    GenerateId,
}

impl KeyRule {
    fn describe(&self) -> String {
        match self {
            KeyRule::Required => "required".to_string(),
            KeyRule::Optional(None) => "optional".to_string(),
            KeyRule::Optional(Some(default)) => format!("optional(default={})", default),
            KeyRule::Exclusive(group) => format!("exclusive({})", group),
            KeyRule::GenerateId => "generate_id".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct KeySpec {
    rule: KeyRule,
    validator: Validator,
    /// Most specific type seen for this key across merges
    constraint: ValueType,
}

/// Keys a check counts: a literal list, or every key of an exclusive group
#[derive(Debug, Clone, PartialEq)]
pub enum KeySet {
    Keys(Vec<String>),
    Group(String),
}

/// Whole-mapping constraint over the number of present keys
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    ExactlyOne(KeySet),
    AtLeastOne(KeySet),
    AtMostOne(KeySet),
    NoneOrAll(KeySet),
}

impl Check {
    fn describe(&self) -> String {
        let (name, set) = match self {
            Check::ExactlyOne(set) => ("exactly_one", set),
            Check::AtLeastOne(set) => ("at_least_one", set),
            Check::AtMostOne(set) => ("at_most_one", set),
            Check::NoneOrAll(set) => ("none_or_all", set),
        };
        match set {
            KeySet::Keys(keys) => format!("{}({})", name, keys.join(", ")),
            KeySet::Group(group) => format!("{}(group {})", name, group),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    keys: IndexMap<String, KeySpec>,
    checks: Vec<Check>,
}

fn owned(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, key: &str, rule: KeyRule, validator: impl Into<Validator>) -> Self {
        let validator = validator.into();
        let constraint = validator.value_type();
        self.keys.insert(
            key.to_string(),
            KeySpec {
                rule,
                validator,
                constraint,
            },
        );
        self
    }

    pub fn required(self, key: &str, validator: impl Into<Validator>) -> Self {
        self.key(key, KeyRule::Required, validator)
    }

    pub fn optional(self, key: &str, validator: impl Into<Validator>) -> Self {
        self.key(key, KeyRule::Optional(None), validator)
    }

    pub fn optional_default(
        self,
        key: &str,
        validator: impl Into<Validator>,
        default: impl Into<Value>,
    ) -> Self {
        self.key(key, KeyRule::Optional(Some(default.into())), validator)
    }

    pub fn exclusive(self, key: &str, group: &str, validator: impl Into<Validator>) -> Self {
        self.key(key, KeyRule::Exclusive(group.to_string()), validator)
    }

    pub fn generate_id(self, key: &str, validator: impl Into<Validator>) -> Self {
        self.key(key, KeyRule::GenerateId, validator)
    }

    /// Declare a whole exclusive group at once
    pub fn exclusive_group(
        mut self,
        group: &str,
        members: Vec<(&str, Validator)>,
    ) -> Result<Self, SchemaError> {
        let mut seen: Vec<&str> = Vec::new();
        for (key, validator) in members {
            if seen.contains(&key) {
                return Err(SchemaError::DuplicateGroupKey {
                    key: key.to_string(),
                    group: group.to_string(),
                });
            }
            seen.push(key);
            self = self.exclusive(key, group, validator);
        }
        Ok(self)
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn has_exactly_one_key(self, keys: &[&str]) -> Self {
        self.check(Check::ExactlyOne(KeySet::Keys(owned(keys))))
    }

    pub fn has_at_least_one_key(self, keys: &[&str]) -> Self {
        self.check(Check::AtLeastOne(KeySet::Keys(owned(keys))))
    }

    pub fn has_at_most_one_key(self, keys: &[&str]) -> Self {
        self.check(Check::AtMostOne(KeySet::Keys(owned(keys))))
    }

    pub fn has_none_or_all_keys(self, keys: &[&str]) -> Self {
        self.check(Check::NoneOrAll(KeySet::Keys(owned(keys))))
    }

    /// Require exactly one member of an exclusive group
    pub fn exactly_one_of_group(self, group: &str) -> Self {
        self.check(Check::ExactlyOne(KeySet::Group(group.to_string())))
    }

    /// Merge `other` into a copy of `self`. Keys of `other` override keys of
    /// the same name in place; checks are concatenated.
    pub fn extend(&self, other: &Schema) -> Result<Schema, SchemaError> {
        let mut merged = self.clone();
        for (key, spec) in &other.keys {
            match merged.keys.get_mut(key) {
                Some(existing) => {
                    let constraint = existing.constraint.meet(&spec.constraint).ok_or_else(|| {
                        SchemaError::ConflictingType {
                            key: key.clone(),
                            left: existing.constraint.to_string(),
                            right: spec.constraint.to_string(),
                        }
                    })?;
                    existing.rule = spec.rule.clone();
                    existing.validator = spec.validator.clone();
                    existing.constraint = constraint;
                }
                None => {
                    merged.keys.insert(key.clone(), spec.clone());
                }
            }
        }
        merged.checks.extend(other.checks.iter().cloned());
        Ok(merged)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn rule(&self, key: &str) -> Option<&KeyRule> {
        self.keys.get(key).map(|spec| &spec.rule)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.checks.is_empty()
    }

    fn group_members(&self, group: &str) -> Vec<String> {
        self.keys
            .iter()
            .filter(|(_, spec)| matches!(&spec.rule, KeyRule::Exclusive(g) if g == group))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn check_exclusive_groups(&self, present: &dyn Fn(&str) -> bool, cx: &mut Context<'_>) {
        let mut groups: Vec<&str> = Vec::new();
        for spec in self.keys.values() {
            if let KeyRule::Exclusive(group) = &spec.rule {
                if !groups.contains(&group.as_str()) {
                    groups.push(group);
                }
            }
        }
        for group in groups {
            let found: Vec<String> = self
                .group_members(group)
                .into_iter()
                .filter(|k| present(k))
                .collect();
            if found.len() > 1 {
                cx.fail(
                    ErrorKind::ExclusiveConflict,
                    format!(
                        "Cannot specify more than one of inclusion group '{}': {}",
                        group,
                        found.join(", ")
                    ),
                );
            }
        }
    }

    fn run_checks(&self, present: &dyn Fn(&str) -> bool, cx: &mut Context<'_>) {
        for check in &self.checks {
            let (set, from_group) = match check {
                Check::ExactlyOne(set)
                | Check::AtLeastOne(set)
                | Check::AtMostOne(set)
                | Check::NoneOrAll(set) => match set {
                    KeySet::Keys(keys) => (keys.clone(), false),
                    KeySet::Group(group) => (self.group_members(group), true),
                },
            };
            let count = set.iter().filter(|k| present(k)).count();
            let listed = set.join(", ");

            let message = match check {
                Check::ExactlyOne(_) if count == 0 => {
                    Some(format!("Must contain exactly one of {}.", listed))
                }
                // a group overflow is already an exclusive conflict
                Check::ExactlyOne(_) if count > 1 && !from_group => {
                    Some(format!("Cannot specify more than one of {}.", listed))
                }
                Check::AtLeastOne(_) if count == 0 => {
                    Some(format!("Must contain at least one of {}.", listed))
                }
                Check::AtMostOne(_) if count > 1 && !from_group => {
                    Some(format!("Cannot specify more than one of {}.", listed))
                }
                Check::NoneOrAll(_) if count != 0 && count != set.len() => {
                    Some(format!("Must contain none or all of {}.", listed))
                }
                _ => None,
            };
            if let Some(message) = message {
                cx.fail(ErrorKind::OneOfViolation, message);
            }
        }
    }

    /// Stable signature: one line per key, then one per check
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (key, spec) in &self.keys {
            let _ = writeln!(
                out,
                "{}: {} {}",
                key,
                spec.rule.describe(),
                spec.validator.describe()
            );
        }
        for check in &self.checks {
            let _ = writeln!(out, "check {}", check.describe());
        }
        out
    }
}

impl Validate for Schema {
    fn validate(&self, value: &Value, cx: &mut Context<'_>) -> Result<Setting, Rejected> {
        let empty = fwgen_value::Mapping::new();
        let map = match value {
            Value::Map(map) => map,
            Value::Null => &empty,
            other => {
                return Err(cx.fail(
                    ErrorKind::ValueInvalid,
                    format!("expected a dictionary, got {}", other.type_name()),
                ))
            }
        };

        let errors_before = cx.error_count();
        let valid: Vec<String> = self.keys.keys().cloned().collect();
        for key in map.keys() {
            if !self.keys.contains_key(key) {
                cx.unknown_key(key, &valid);
            }
        }

        let mut out = Settings::new();
        for (key, spec) in &self.keys {
            let result = match (map.get(key), &spec.rule) {
                (Some(given), _) => cx.at_key(key, |cx| spec.validator.validate(given, cx)),
                (None, KeyRule::Required) => {
                    cx.missing_required(key);
                    continue;
                }
                (None, KeyRule::Optional(Some(default))) => {
                    cx.at_key(key, |cx| spec.validator.validate(default, cx))
                }
                (None, KeyRule::GenerateId) => {
                    cx.at_key(key, |cx| spec.validator.validate(&Value::Null, cx))
                }
                (None, KeyRule::Optional(None) | KeyRule::Exclusive(_)) => continue,
            };
            if let Ok(setting) = result {
                out.insert(key.clone(), setting);
            }
        }

        let present = |key: &str| map.contains_key(key);
        self.check_exclusive_groups(&present, cx);
        self.run_checks(&present, cx);

        if cx.error_count() > errors_before {
            Err(Rejected)
        } else {
            Ok(Setting::Map(out))
        }
    }

    fn value_type(&self) -> ValueType {
        ValueType::Map
    }

    fn describe(&self) -> String {
        let keys: Vec<&str> = self.keys().collect();
        format!("mapping{{{}}}", keys.join(", "))
    }
}
