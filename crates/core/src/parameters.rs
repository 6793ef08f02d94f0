//! Parameter resolution: which `<task>_<alias>` keys a job requires, and how
//! submitted form fields bind to them.
//!
//! Everything here is pure. Parameter rules are declarative and evaluated
//! without executing any submitted content.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::Job;

// ---------------------------------------------------------------------------
// Keys and bound values
// ---------------------------------------------------------------------------

/// Identifies one parameter of one task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterKey {
    pub task: String,
    pub rest_alias: String,
}

impl ParameterKey {
    pub fn new(task: impl Into<String>, rest_alias: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            rest_alias: rest_alias.into(),
        }
    }

    /// The multipart field name that binds this parameter.
    pub fn field_name(&self) -> String {
        format!("{}_{}", self.task, self.rest_alias)
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.task, self.rest_alias)
    }
}

/// Serialized form of one binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundParameter {
    pub task: String,
    pub rest_alias: String,
    pub value: String,
}

/// Parameter values bound to a submission, keyed by task and alias.
///
/// Serializes as a list of [`BoundParameter`] so it can be stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<BoundParameter>", into = "Vec<BoundParameter>")]
pub struct BoundParameters(BTreeMap<ParameterKey, String>);

impl BoundParameters {
    pub fn get(&self, task: &str, rest_alias: &str) -> Option<&str> {
        self.0
            .get(&ParameterKey::new(task, rest_alias))
            .map(String::as_str)
    }

    pub fn contains(&self, key: &ParameterKey) -> bool {
        self.0.contains_key(key)
    }

    /// Bindings scoped to one task, as `(rest_alias, value)` pairs.
    pub fn for_task<'a>(&'a self, task: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k.task == task)
            .map(|(k, v)| (k.rest_alias.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<ParameterKey, String>> for BoundParameters {
    fn from(map: BTreeMap<ParameterKey, String>) -> Self {
        Self(map)
    }
}

impl From<Vec<BoundParameter>> for BoundParameters {
    fn from(list: Vec<BoundParameter>) -> Self {
        Self(
            list.into_iter()
                .map(|b| (ParameterKey::new(b.task, b.rest_alias), b.value))
                .collect(),
        )
    }
}

impl From<BoundParameters> for Vec<BoundParameter> {
    fn from(bound: BoundParameters) -> Self {
        bound
            .0
            .into_iter()
            .map(|(k, value)| BoundParameter {
                task: k.task,
                rest_alias: k.rest_alias,
                value,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Every `(task, rest_alias)` the job needs, across all of its steps.
pub fn required_parameters(job: &Job) -> BTreeSet<ParameterKey> {
    job.ordered_steps()
        .into_iter()
        .flat_map(|step| {
            step.task
                .parameters
                .iter()
                .map(move |p| ParameterKey::new(&step.task.name, &p.rest_alias))
        })
        .collect()
}

/// Bind submitted fields named `<task>_<alias>` to the job's parameters.
///
/// Fields that do not name a parameter of one of the job's tasks are ignored.
/// An empty value falls back to the parameter's default when it has one.
pub fn resolve(job: &Job, fields: &BTreeMap<String, String>) -> BTreeMap<ParameterKey, String> {
    let mut bound = BTreeMap::new();
    for (field, value) in fields {
        for step in job.ordered_steps() {
            let task = &step.task;
            let Some(alias) = field
                .strip_prefix(task.name.as_str())
                .and_then(|rest| rest.strip_prefix('_'))
            else {
                continue;
            };
            let Some(param) = task.parameter(alias) else {
                continue;
            };
            let value = match (&param.default, value.is_empty()) {
                (Some(default), true) => default.clone(),
                _ => value.clone(),
            };
            bound.insert(ParameterKey::new(&task.name, alias), value);
        }
    }
    bound
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Declarative constraint on a parameter value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterRule {
    #[default]
    Any,
    Integer,
    Number,
    Boolean,
    /// The whole value must match `regex`.
    Pattern { regex: String },
    OneOf { values: Vec<String> },
    /// Inclusive numeric bounds; either may be omitted.
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl ParameterRule {
    /// Check `value` against the rule, returning a reason on violation.
    pub fn check(&self, value: &str) -> Result<(), String> {
        let value = value.trim();
        match self {
            Self::Any => Ok(()),
            Self::Integer => value
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("'{value}' is not an integer")),
            Self::Number => value
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| format!("'{value}' is not a number")),
            Self::Boolean => parse_bool(value)
                .map(|_| ())
                .ok_or_else(|| format!("'{value}' is not a boolean")),
            Self::Pattern { regex } => match Regex::new(&format!("^(?:{regex})$")) {
                Ok(re) if re.is_match(value) => Ok(()),
                Ok(_) => Err(format!("'{value}' does not match /{regex}/")),
                // Invalid patterns pass; they are a catalog problem, not the submitter's.
                Err(_) => Ok(()),
            },
            Self::OneOf { values } => {
                if values.iter().any(|v| v == value) {
                    Ok(())
                } else {
                    Err(format!("'{value}' is not one of {values:?}"))
                }
            }
            Self::Range { min, max } => {
                let n: f64 = value
                    .parse()
                    .map_err(|_| format!("'{value}' is not a number"))?;
                if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                    Err(format!("{n} is outside [{min:?}, {max:?}]"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Parse a form boolean (`true/false`, `1/0`, `yes/no`, `on/off`).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{job, task};

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // -- required_parameters --------------------------------------------------

    #[test]
    fn required_is_union_over_steps() {
        let j = job(
            "job1",
            vec![task(1, "task1", &["this", "that"]), task(2, "task2", &["this2"])],
        );
        let required = required_parameters(&j);
        let names: Vec<String> = required.iter().map(ParameterKey::field_name).collect();
        assert_eq!(names, ["task1_that", "task1_this", "task2_this2"]);
    }

    #[test]
    fn unrelated_job_does_not_affect_required() {
        let j1 = job("job1", vec![task(1, "task1", &["this"])]);
        let before = required_parameters(&j1);
        let _j2 = job("job2", vec![task(5, "task5", &["other"])]);
        assert_eq!(required_parameters(&j1), before);
    }

    #[test]
    fn shared_task_counted_once() {
        let t = task(1, "task1", &["this"]);
        let j = job("job1", vec![t.clone(), t]);
        assert_eq!(required_parameters(&j).len(), 1);
    }

    // -- resolve --------------------------------------------------------------

    #[test]
    fn resolve_binds_known_fields() {
        let j = job("job1", vec![task(1, "task1", &["this"])]);
        let bound = resolve(&j, &fields(&[("task1_this", "Value1")]));
        assert_eq!(
            bound.get(&ParameterKey::new("task1", "this")).map(String::as_str),
            Some("Value1")
        );
    }

    #[test]
    fn resolve_ignores_unknown_fields() {
        let j = job("job1", vec![task(1, "task1", &["this"])]);
        let bound = resolve(
            &j,
            &fields(&[("task1_strange", "x"), ("nope", "y"), ("task9_this", "z")]),
        );
        assert!(bound.is_empty());
    }

    #[test]
    fn resolve_handles_underscores_in_task_names() {
        let j = job("job1", vec![task(1, "psi_pred", &["e_value"])]);
        let bound = resolve(&j, &fields(&[("psi_pred_e_value", "0.01")]));
        assert!(bound.contains_key(&ParameterKey::new("psi_pred", "e_value")));
    }

    #[test]
    fn resolve_applies_default_for_empty_value() {
        let mut t = task(1, "task1", &["this"]);
        t.parameters[0].default = Some("42".into());
        let j = job("job1", vec![t]);
        let bound = resolve(&j, &fields(&[("task1_this", "")]));
        assert_eq!(
            bound.get(&ParameterKey::new("task1", "this")).map(String::as_str),
            Some("42")
        );
    }

    #[test]
    fn bound_parameters_scope_to_task() {
        let j = job(
            "job1",
            vec![task(1, "task1", &["a"]), task(2, "task2", &["b"])],
        );
        let bound: BoundParameters =
            resolve(&j, &fields(&[("task1_a", "1"), ("task2_b", "2")])).into();
        let t2: Vec<_> = bound.for_task("task2").collect();
        assert_eq!(t2, [("b", "2")]);
        assert_eq!(bound.get("task1", "a"), Some("1"));
    }

    #[test]
    fn bound_parameters_serialize_as_list() {
        let mut map = BTreeMap::new();
        map.insert(ParameterKey::new("task1", "this"), "v".to_string());
        let bound = BoundParameters::from(map);
        let json = serde_json::to_value(&bound).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!([{"task": "task1", "rest_alias": "this", "value": "v"}])
        );
        let back: BoundParameters = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, bound);
    }

    // -- rules ----------------------------------------------------------------

    #[test]
    fn integer_rule() {
        assert!(ParameterRule::Integer.check("12").is_ok());
        assert!(ParameterRule::Integer.check("1.5").is_err());
    }

    #[test]
    fn boolean_rule() {
        assert!(ParameterRule::Boolean.check("yes").is_ok());
        assert!(ParameterRule::Boolean.check("maybe").is_err());
    }

    #[test]
    fn pattern_rule_requires_full_match() {
        let rule = ParameterRule::Pattern {
            regex: "[A-Z]+".into(),
        };
        assert!(rule.check("ACDE").is_ok());
        assert!(rule.check("ACDe").is_err());
    }

    #[test]
    fn invalid_pattern_passes() {
        let rule = ParameterRule::Pattern { regex: "(".into() };
        assert!(rule.check("anything").is_ok());
    }

    #[test]
    fn one_of_rule() {
        let rule = ParameterRule::OneOf {
            values: vec!["fast".into(), "slow".into()],
        };
        assert!(rule.check("fast").is_ok());
        assert!(rule.check("medium").is_err());
    }

    #[test]
    fn range_rule_inclusive() {
        let rule = ParameterRule::Range {
            min: Some(0.0),
            max: Some(1.0),
        };
        assert!(rule.check("0").is_ok());
        assert!(rule.check("1").is_ok());
        assert!(rule.check("1.01").is_err());
        assert!(rule.check("abc").is_err());
    }

    #[test]
    fn rule_deserializes_from_tagged_json() {
        let rule: ParameterRule =
            serde_json::from_value(serde_json::json!({"type": "range", "min": 1}))
                .expect("deserialize");
        assert_eq!(
            rule,
            ParameterRule::Range {
                min: Some(1.0),
                max: None
            }
        );
    }
}
