// ── JSON-Patch mirror ──
//
// Local copy of the server's module-state tree. Batches are applied to a
// scratch copy and swapped in only when every operation succeeded, so a
// rejected batch never leaves a half-applied document behind.

use indexmap::IndexSet;
use serde_json::{Map, Value};

use floorsync_api::PatchOp;

use crate::error::CoreError;

/// Top-level keys touched by an applied batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Touched {
    /// Distinct first path segments, in order of first appearance.
    pub keys: IndexSet<String>,
    /// A root-level operation replaced the whole document.
    pub root: bool,
}

/// Mirrored document: `{ "<addressHex>": { "<subindex>": ... } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMirror {
    doc: Value,
}

impl Default for StateMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMirror {
    pub fn new() -> Self {
        Self {
            doc: Value::Object(Map::new()),
        }
    }

    /// The whole mirrored document.
    pub fn document(&self) -> &Value {
        &self.doc
    }

    /// State of one module, if any has been received.
    pub fn module(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Drop one module's state.
    pub fn forget(&mut self, key: &str) -> Option<Value> {
        self.doc.as_object_mut()?.remove(key)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.doc = Value::Object(Map::new());
    }

    /// Apply `ops` atomically and report which top-level keys they touched.
    ///
    /// On error the mirror is unchanged.
    pub fn apply(&mut self, ops: &[PatchOp]) -> Result<Touched, CoreError> {
        let mut scratch = self.doc.clone();
        let mut touched = Touched::default();

        for (index, op) in ops.iter().enumerate() {
            let reject = |reason: String| CoreError::PatchApply {
                index,
                op: op.name(),
                path: op.path().to_owned(),
                reason,
            };
            let tokens = parse_pointer(op.path()).map_err(reject)?;
            apply_op(&mut scratch, op, &tokens).map_err(reject)?;

            match tokens.first() {
                Some(key) => {
                    touched.keys.insert(key.clone());
                }
                None => touched.root = true,
            }
        }

        self.doc = scratch;
        Ok(touched)
    }
}

/// Split a JSON pointer into unescaped reference tokens.
pub(crate) fn parse_pointer(path: &str) -> Result<Vec<String>, String> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(format!("path must start with '/': {path:?}"));
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn apply_op(doc: &mut Value, op: &PatchOp, tokens: &[String]) -> Result<(), String> {
    match op {
        PatchOp::Add { value, .. } => add(doc, tokens, value.clone()),
        PatchOp::Replace { value, .. } => {
            let target = resolve_mut(doc, tokens)?;
            *target = value.clone();
            Ok(())
        }
        PatchOp::Remove { .. } => remove(doc, tokens),
    }
}

fn add(doc: &mut Value, tokens: &[String], value: Value) -> Result<(), String> {
    let Some((last, parents)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    match resolve_mut(doc, parents)? {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(last)?;
            if index > items.len() {
                return Err(format!("index {index} out of bounds (len {})", items.len()));
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(format!("cannot add member '{last}' to a scalar")),
    }
}

fn remove(doc: &mut Value, tokens: &[String]) -> Result<(), String> {
    let Some((last, parents)) = tokens.split_last() else {
        return Err("cannot remove the document root".into());
    };
    match resolve_mut(doc, parents)? {
        Value::Object(map) => map
            .remove(last)
            .map(drop)
            .ok_or_else(|| format!("no such member '{last}'")),
        Value::Array(items) => {
            let index = parse_index(last)?;
            if index >= items.len() {
                return Err(format!("index {index} out of bounds (len {})", items.len()));
            }
            items.remove(index);
            Ok(())
        }
        _ => Err(format!("cannot remove member '{last}' from a scalar")),
    }
}

fn resolve_mut<'a>(doc: &'a mut Value, tokens: &[String]) -> Result<&'a mut Value, String> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| format!("no such member '{token}'"))?,
            Value::Array(items) => {
                let index = parse_index(token)?;
                let len = items.len();
                items
                    .get_mut(index)
                    .ok_or_else(|| format!("index {index} out of bounds (len {len})"))?
            }
            _ => return Err(format!("cannot descend into a scalar at '{token}'")),
        };
    }
    Ok(current)
}

fn parse_index(token: &str) -> Result<usize, String> {
    let canonical = token == "0" || (!token.starts_with('0') && !token.is_empty());
    if !canonical || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid array index '{token}'"));
    }
    token
        .parse()
        .map_err(|_| format!("invalid array index '{token}'"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn mirror(doc: Value) -> StateMirror {
        StateMirror { doc }
    }

    #[test]
    fn pointer_unescapes_tokens() {
        assert_eq!(parse_pointer("").unwrap(), Vec::<String>::new());
        assert_eq!(parse_pointer("/07/1").unwrap(), vec!["07", "1"]);
        assert_eq!(parse_pointer("/a~1b/c~0d").unwrap(), vec!["a/b", "c~d"]);
        assert!(parse_pointer("07/1").is_err());
    }

    #[test]
    fn add_creates_module_and_members() {
        let mut m = StateMirror::new();
        let touched = m
            .apply(&[
                PatchOp::add("/07", json!({})),
                PatchOp::add("/07/1", json!({"relay": false})),
                PatchOp::add("/07/1/last_change", json!(1_700_000_000.0)),
            ])
            .unwrap();

        assert_eq!(
            m.document(),
            &json!({"07": {"1": {"relay": false, "last_change": 1_700_000_000.0}}})
        );
        assert_eq!(touched.keys.len(), 1);
        assert!(touched.keys.contains("07"));
        assert!(!touched.root);
    }

    #[test]
    fn add_requires_parent() {
        let mut m = StateMirror::new();
        let err = m.apply(&[PatchOp::add("/07/1/relay", json!(true))]).unwrap_err();
        assert!(matches!(err, CoreError::PatchApply { index: 0, op: "add", .. }));
    }

    #[test]
    fn add_into_array_inserts_and_appends() {
        let mut m = mirror(json!({"0a": {"scenes": [1, 3]}}));
        m.apply(&[
            PatchOp::add("/0a/scenes/1", json!(2)),
            PatchOp::add("/0a/scenes/-", json!(4)),
            PatchOp::add("/0a/scenes/0", json!(0)),
        ])
        .unwrap();
        assert_eq!(m.module("0a").unwrap(), &json!({"scenes": [0, 1, 2, 3, 4]}));
    }

    #[test]
    fn add_past_array_end_fails() {
        let mut m = mirror(json!({"0a": {"scenes": [1]}}));
        assert!(m.apply(&[PatchOp::add("/0a/scenes/5", json!(2))]).is_err());
    }

    #[test]
    fn replace_and_remove_need_existing_target() {
        let mut m = mirror(json!({"07": {"1": {"relay": true}}}));
        assert!(m.apply(&[PatchOp::replace("/07/2/relay", json!(false))]).is_err());
        assert!(m.apply(&[PatchOp::remove("/07/1/dimmer")]).is_err());
        assert!(m.apply(&[PatchOp::remove("/08")]).is_err());

        m.apply(&[PatchOp::replace("/07/1/relay", json!(1_700_000_300))])
            .unwrap();
        assert_eq!(m.module("07").unwrap(), &json!({"1": {"relay": 1_700_000_300}}));

        m.apply(&[PatchOp::remove("/07/1")]).unwrap();
        assert_eq!(m.module("07").unwrap(), &json!({}));
    }

    #[test]
    fn failed_batch_leaves_document_untouched() {
        let before = json!({"07": {"1": {"relay": true}, "2": {"relay": false}}});
        let mut m = mirror(before.clone());

        let err = m
            .apply(&[
                PatchOp::replace("/07/1/relay", json!(false)),
                PatchOp::remove("/07/2/relay"),
                PatchOp::replace("/07/9/relay", json!(true)),
            ])
            .unwrap_err();

        assert!(matches!(err, CoreError::PatchApply { index: 2, .. }));
        assert_eq!(m.document(), &before);
    }

    #[test]
    fn touched_keys_are_distinct_and_ordered() {
        let mut m = mirror(json!({"07": {"1": {}}, "2c": {"1": {}}}));
        let touched = m
            .apply(&[
                PatchOp::add("/2c/1/relay", json!(true)),
                PatchOp::add("/07/1/relay", json!(true)),
                PatchOp::add("/2c/1/last_change", json!(5)),
            ])
            .unwrap();
        let keys: Vec<_> = touched.keys.iter().cloned().collect();
        assert_eq!(keys, vec!["2c".to_owned(), "07".to_owned()]);
    }

    #[test]
    fn root_replace_marks_everything_touched() {
        let mut m = mirror(json!({"07": {}}));
        let touched = m
            .apply(&[PatchOp::replace("", json!({"08": {"1": {}}}))])
            .unwrap();
        assert!(touched.root);
        assert!(m.module("07").is_none());
        assert!(m.module("08").is_some());
    }

    #[test]
    fn removing_root_fails() {
        let mut m = StateMirror::new();
        assert!(m.apply(&[PatchOp::remove("")]).is_err());
    }

    #[test]
    fn array_index_must_be_canonical() {
        assert_eq!(parse_index("0").unwrap(), 0);
        assert_eq!(parse_index("12").unwrap(), 12);
        for bad in ["", "01", "-1", "1a", "+1"] {
            assert!(parse_index(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn forget_and_clear() {
        let mut m = mirror(json!({"07": {}, "08": {}}));
        assert!(m.forget("07").is_some());
        assert!(m.forget("07").is_none());
        m.clear();
        assert_eq!(m.document(), &json!({}));
    }
}
