//! Response payload model.
//!
//! salt-api answers with `{"return": [round, ...]}` where each round maps a
//! node id to whatever the executed function produced: a string, a list, a
//! mapping of state results, a bare boolean. [`ResourcePayload`] captures that
//! shape as a tagged value so the walker can match on it instead of probing
//! JSON types. Mapping entries keep the order salt-api sent them in.

use crate::error::{Error, Result};
use serde_json::{Map, Number, Value};

/// Keys salt adds to state results for its own bookkeeping.
pub const BOOKKEEPING_KEYS: [&str; 3] = ["__run_num__", "__id__", "pchanges"];

/// One value inside a salt-api response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    /// JSON `null`.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(Number),
    /// String scalar.
    Text(String),
    /// Ordered list of sub-results.
    Sequence(Vec<ResourcePayload>),
    /// Ordered mapping of field name to sub-result.
    Fields(Vec<(String, ResourcePayload)>),
}

impl ResourcePayload {
    /// Python-style truthiness: null, false, zero and empty containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ResourcePayload::Null => false,
            ResourcePayload::Bool(b) => *b,
            ResourcePayload::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            ResourcePayload::Text(s) => !s.is_empty(),
            ResourcePayload::Sequence(items) => !items.is_empty(),
            ResourcePayload::Fields(fields) => !fields.is_empty(),
        }
    }

    /// Whether this is a list or a mapping.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ResourcePayload::Sequence(_) | ResourcePayload::Fields(_)
        )
    }

    /// Look up a field of a mapping.
    pub fn get(&self, key: &str) -> Option<&ResourcePayload> {
        match self {
            ResourcePayload::Fields(fields) => {
                fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// String content of a text scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResourcePayload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Entries of a container keyed by field name or list index.
    ///
    /// Scalars have no entries.
    pub fn entries(&self) -> Vec<(String, &ResourcePayload)> {
        match self {
            ResourcePayload::Fields(fields) => {
                fields.iter().map(|(k, v)| (k.clone(), v)).collect()
            }
            ResourcePayload::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Copy of this payload with salt bookkeeping keys removed at every level.
    pub fn without_bookkeeping(&self) -> ResourcePayload {
        match self {
            ResourcePayload::Fields(fields) => ResourcePayload::Fields(
                fields
                    .iter()
                    .filter(|(k, _)| !BOOKKEEPING_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.without_bookkeeping()))
                    .collect(),
            ),
            ResourcePayload::Sequence(items) => {
                ResourcePayload::Sequence(items.iter().map(Self::without_bookkeeping).collect())
            }
            other => other.clone(),
        }
    }

    /// Human-readable rendering used in reports.
    ///
    /// Strings print verbatim; everything else prints as indented JSON.
    pub fn render(&self) -> String {
        match self {
            ResourcePayload::Text(s) => s.clone(),
            other => serde_json::to_string_pretty(&Value::from(other)).unwrap_or_default(),
        }
    }
}

impl From<&Value> for ResourcePayload {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ResourcePayload::Null,
            Value::Bool(b) => ResourcePayload::Bool(*b),
            Value::Number(n) => ResourcePayload::Number(n.clone()),
            Value::String(s) => ResourcePayload::Text(s.clone()),
            Value::Array(items) => {
                ResourcePayload::Sequence(items.iter().map(ResourcePayload::from).collect())
            }
            Value::Object(map) => ResourcePayload::Fields(
                map.iter()
                    .map(|(k, v)| (k.clone(), ResourcePayload::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for ResourcePayload {
    fn from(value: Value) -> Self {
        ResourcePayload::from(&value)
    }
}

impl From<&ResourcePayload> for Value {
    fn from(payload: &ResourcePayload) -> Self {
        match payload {
            ResourcePayload::Null => Value::Null,
            ResourcePayload::Bool(b) => Value::Bool(*b),
            ResourcePayload::Number(n) => Value::Number(n.clone()),
            ResourcePayload::Text(s) => Value::String(s.clone()),
            ResourcePayload::Sequence(items) => {
                Value::Array(items.iter().map(Value::from).collect())
            }
            ResourcePayload::Fields(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), Value::from(v));
                }
                Value::Object(map)
            }
        }
    }
}

/// A parsed salt-api response: the rounds of its `return` sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// One entry per round, normally exactly one.
    pub rounds: Vec<ResourcePayload>,
}

impl RawResponse {
    /// Parse a decoded salt-api response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the body is null, has no `return` entry,
    /// or `return` is not a list.
    pub fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            return Err(Error::protocol("response is null"));
        }

        let rounds = value
            .get("return")
            .ok_or_else(|| Error::protocol("response has no `return` entry"))?;

        match rounds {
            Value::Array(items) => Ok(Self {
                rounds: items.iter().map(ResourcePayload::from).collect(),
            }),
            other => Err(Error::protocol(format!(
                "`return` is not a list: {other}"
            ))),
        }
    }

    /// Node entries of the first round, in service order.
    pub fn first_round(&self) -> Vec<(String, &ResourcePayload)> {
        self.rounds
            .first()
            .map(ResourcePayload::entries)
            .unwrap_or_default()
    }

    /// Replace runner/wheel envelopes (`{"data": {...}}`) by their contents.
    ///
    /// Master-side clients wrap their result as `{tag, outputter, data}` and
    /// wheel functions nest it once more as `data.return` next to a
    /// `data.success` flag. Rounds without an envelope are kept as they are.
    pub fn unwrap_envelopes(&self) -> RawResponse {
        let rounds = self
            .rounds
            .iter()
            .map(|round| {
                let Some(data) = round.get("data") else {
                    return round.clone();
                };
                let is_wheel = data.get("success").is_some();
                match data.get("return") {
                    Some(inner) if is_wheel && inner.is_container() => inner.clone(),
                    _ => data.clone(),
                }
            })
            .collect();
        RawResponse { rounds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!ResourcePayload::Null.is_truthy());
        assert!(!ResourcePayload::Bool(false).is_truthy());
        assert!(ResourcePayload::Bool(true).is_truthy());
        assert!(!ResourcePayload::from(json!(0)).is_truthy());
        assert!(ResourcePayload::from(json!(1.5)).is_truthy());
        assert!(!ResourcePayload::from(json!("")).is_truthy());
        assert!(ResourcePayload::from(json!("x")).is_truthy());
        assert!(!ResourcePayload::from(json!([])).is_truthy());
        assert!(!ResourcePayload::from(json!({})).is_truthy());
        assert!(ResourcePayload::from(json!({"a": 1})).is_truthy());
    }

    #[test]
    fn test_fields_preserve_order() {
        let payload = ResourcePayload::from(json!({"zeta": 1, "alpha": 2, "mid": 3}));
        let keys: Vec<String> = payload.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_sequence_entries_use_index_keys() {
        let payload = ResourcePayload::from(json!(["a", "b"]));
        let entries = payload.entries();
        assert_eq!(entries[0].0, "0");
        assert_eq!(entries[1].0, "1");
        assert_eq!(entries[1].1.as_text(), Some("b"));
        assert!(ResourcePayload::from(json!("scalar")).entries().is_empty());
    }

    #[test]
    fn test_without_bookkeeping_strips_nested_keys() {
        let payload = ResourcePayload::from(json!({
            "result": true,
            "__run_num__": 4,
            "__id__": "nginx",
            "pchanges": {},
            "changes": {"nested": {"__id__": "x", "keep": 1}},
        }));
        let stripped = payload.without_bookkeeping();

        assert!(stripped.get("__run_num__").is_none());
        assert!(stripped.get("__id__").is_none());
        assert!(stripped.get("pchanges").is_none());
        let nested = stripped.get("changes").and_then(|c| c.get("nested"));
        assert!(nested.and_then(|n| n.get("__id__")).is_none());
        assert!(nested.and_then(|n| n.get("keep")).is_some());

        // the source is untouched
        assert!(payload.get("__run_num__").is_some());
    }

    #[test]
    fn test_render() {
        assert_eq!(ResourcePayload::from(json!("plain")).render(), "plain");
        let rendered = ResourcePayload::from(json!({"result": true})).render();
        assert!(rendered.contains("\"result\": true"));
    }

    #[test]
    fn test_value_conversion_is_lossless() {
        let value = json!({"b": [1, "two", null, false], "a": {"x": 2.5}});
        let payload = ResourcePayload::from(&value);
        assert_eq!(Value::from(&payload), value);
    }

    #[test]
    fn test_raw_response_requires_return() {
        assert!(matches!(
            RawResponse::from_value(&Value::Null),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            RawResponse::from_value(&json!({"status": "ok"})),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            RawResponse::from_value(&json!({"return": "nope"})),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_raw_response_rounds() {
        let response = RawResponse::from_value(&json!({
            "return": [{"node1": true, "node2": false}]
        }))
        .unwrap();
        assert_eq!(response.rounds.len(), 1);
        let nodes = response.first_round();
        assert_eq!(nodes[0].0, "node1");
        assert_eq!(nodes[1].1, &ResourcePayload::Bool(false));

        let empty = RawResponse::from_value(&json!({"return": []})).unwrap();
        assert!(empty.rounds.is_empty());
        assert!(empty.first_round().is_empty());
    }

    #[test]
    fn test_unwrap_runner_envelope() {
        let response = RawResponse::from_value(&json!({
            "return": [{
                "outputter": "highstate",
                "data": {"cfg01_master": {"salt_|-deploy_|-deploy_|-state": {"result": true}}}
            }]
        }))
        .unwrap();

        let unwrapped = response.unwrap_envelopes();
        let nodes = unwrapped.first_round();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].0, "cfg01_master");
    }

    #[test]
    fn test_unwrap_wheel_envelope() {
        let response = RawResponse::from_value(&json!({
            "return": [{
                "tag": "salt/wheel/20240101",
                "data": {"return": {"pub": "PUB", "priv": "PRIV"}, "success": true}
            }]
        }))
        .unwrap();

        let unwrapped = response.unwrap_envelopes();
        assert_eq!(
            unwrapped.rounds[0].get("pub").and_then(ResourcePayload::as_text),
            Some("PUB")
        );
    }

    #[test]
    fn test_unwrap_leaves_plain_rounds() {
        let response = RawResponse::from_value(&json!({"return": [{"node1": "ok"}]})).unwrap();
        assert_eq!(response.unwrap_envelopes(), response);
    }
}
