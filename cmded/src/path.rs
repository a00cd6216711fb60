//! Key paths into the accumulator tree.
//!
//! Paths mix dot and bracket notation: `nested.foo[0].bar`,
//! `servers["eu.west"].port`. Numeric bracket segments index arrays;
//! against an object they are plain keys.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn as_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
        }
    }
}

/// Tokenize a key path on `.` and `[...]`. Empty segments are dropped.
pub fn split(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => flush_key(&mut segments, &mut current),
            '[' => {
                flush_key(&mut segments, &mut current);

                let quote = match chars.peek() {
                    Some(&q) if q == '"' || q == '\'' => {
                        chars.next();
                        Some(q)
                    }
                    _ => None,
                };

                let mut inner = String::new();
                while let Some(c) = chars.next() {
                    if let Some(q) = quote {
                        if c == q && chars.peek() == Some(&']') {
                            chars.next();
                            break;
                        }
                    } else if c == ']' {
                        break;
                    }
                    inner.push(c);
                }

                if quote.is_none() {
                    if let Ok(index) = inner.trim().parse::<usize>() {
                        segments.push(Segment::Index(index));
                        continue;
                    }
                }
                if !inner.is_empty() {
                    segments.push(Segment::Key(inner));
                }
            }
            _ => current.push(c),
        }
    }
    flush_key(&mut segments, &mut current);

    segments
}

fn flush_key(segments: &mut Vec<Segment>, current: &mut String) {
    if !current.is_empty() {
        segments.push(Segment::Key(std::mem::take(current)));
    }
}

fn child<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), segment) => map.get(&segment.as_key()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        (Value::Array(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        _ => None,
    }
}

/// Look up a path. A stored `null` is a present value.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    split(path)
        .iter()
        .try_fold(root, |value, segment| child(value, segment))
}

/// Like [`get`], rooted at an object's entries.
pub fn get_in<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let segments = split(path);
    let (first, rest) = segments.split_first()?;
    rest.iter()
        .try_fold(map.get(&first.as_key())?, |value, segment| child(value, segment))
}

/// Set a path, creating intermediate containers as needed. Scalars in
/// the way are replaced. A numeric key indexes an existing array; any other
/// key replaces that array with an object, as [`merge`] does.
///
/// An empty path names the `""` key of an object root and never replaces
/// the root itself. Against an array root it does nothing.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let segments = split(path);
    let Some((last, parents)) = segments.split_last() else {
        if !root.is_array() {
            place(root, &Segment::Key(String::new()), value);
        }
        return;
    };

    let mut node = root;
    for (position, segment) in parents.iter().enumerate() {
        let next = &segments[position + 1];
        node = slot(node, segment, next);
    }
    place(node, last, value);
}

fn empty_for(next: &Segment) -> Value {
    match next {
        Segment::Index(_) => Value::Array(Vec::new()),
        Segment::Key(_) => Value::Object(Map::new()),
    }
}

// `list.1` addresses an element when `list` already is an array.
fn resolve(node: &Value, segment: &Segment) -> Segment {
    match (node, segment) {
        (Value::Array(_), Segment::Key(key)) => key
            .parse::<usize>()
            .map_or_else(|_| segment.clone(), Segment::Index),
        _ => segment.clone(),
    }
}

fn slot<'a>(node: &'a mut Value, segment: &Segment, next: &Segment) -> &'a mut Value {
    if !node.is_object() && !node.is_array() {
        *node = empty_for(segment);
    }

    match (resolve(node, segment), node) {
        (Segment::Index(index), Value::Array(items)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            let entry = &mut items[index];
            if !entry.is_object() && !entry.is_array() {
                *entry = empty_for(next);
            }
            entry
        }
        (segment, node) => {
            if let Value::Array(_) = node {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                unreachable!("slot always holds an object here")
            };
            let entry = map.entry(segment.as_key()).or_insert(Value::Null);
            if !entry.is_object() && !entry.is_array() {
                *entry = empty_for(next);
            }
            entry
        }
    }
}

fn place(node: &mut Value, segment: &Segment, value: Value) {
    if !node.is_object() && !node.is_array() {
        *node = empty_for(segment);
    }

    match (resolve(node, segment), node) {
        (Segment::Index(index), Value::Array(items)) => {
            if items.len() <= index {
                items.resize(index + 1, Value::Null);
            }
            items[index] = value;
        }
        (segment, Value::Object(map)) => {
            map.insert(segment.as_key(), value);
        }
        (segment, node) => {
            let mut map = Map::new();
            map.insert(segment.as_key(), value);
            *node = Value::Object(map);
        }
    }
}

/// Deep-merge `source` into `target`. Objects merge key by key; anything
/// else (arrays included) replaces the target value.
pub fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                let nested = value.is_object() && into.get(&key).is_some_and(Value::is_object);
                if !nested {
                    into.insert(key, value);
                } else if let Some(existing) = into.get_mut(&key) {
                    merge(existing, value);
                }
            }
        }
        (target, source) => *target = source,
    }
}

static BRACKETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]]").unwrap());
static NOT_WORD_OR_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.]").unwrap());
static DOT_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.+").unwrap());
static EDGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^A-Za-z0-9_]+|[^A-Za-z0-9_]+$").unwrap());

/// Reduce a key path to the name of its last segment:
/// `nested.foo[0].bar` becomes `bar`.
pub fn sanitize_key(key: &str) -> String {
    let key = BRACKETS.replace_all(key, ".");
    let key = NOT_WORD_OR_DOT.replace_all(&key, "");
    let key = DOT_RUNS.replace_all(&key, ".");
    let key = EDGES.replace_all(&key, "");
    key.rsplit('.').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_mixed_notation() {
        assert_eq!(
            split("a.b[0].c"),
            vec![
                Segment::Key("a".into()),
                Segment::Key("b".into()),
                Segment::Index(0),
                Segment::Key("c".into()),
            ]
        );
    }

    #[test]
    fn split_quoted_brackets() {
        assert_eq!(
            split(r#"servers["eu.west"].port"#),
            vec![
                Segment::Key("servers".into()),
                Segment::Key("eu.west".into()),
                Segment::Key("port".into()),
            ]
        );
    }

    #[test]
    fn split_drops_empty_segments() {
        assert_eq!(split("..a..b."), vec![Segment::Key("a".into()), Segment::Key("b".into())]);
        assert!(split("").is_empty());
    }

    #[test]
    fn get_nested_values() {
        let tree = json!({ "hello": "world", "empty": null, "list": [{ "x": 1 }], "sub": { "test": true } });
        assert_eq!(get(&tree, "hello"), Some(&json!("world")));
        assert_eq!(get(&tree, "empty"), Some(&Value::Null));
        assert_eq!(get(&tree, "sub.test"), Some(&json!(true)));
        assert_eq!(get(&tree, "list[0].x"), Some(&json!(1)));
        assert_eq!(get(&tree, "list.0.x"), Some(&json!(1)));
        assert_eq!(get(&tree, "missing.deeper"), None);
        assert_eq!(get(&tree, "hello.length"), None);
    }

    #[test]
    fn get_in_object_entries() {
        let tree = json!({ "sub": { "list": [1, 2] }, "plain": "x" });
        let map = tree.as_object().unwrap();
        assert_eq!(get_in(map, "sub.list[1]"), Some(&json!(2)));
        assert_eq!(get_in(map, "plain"), Some(&json!("x")));
        assert_eq!(get_in(map, ""), None);
        assert_eq!(get_in(map, "plain.deeper"), None);
    }

    #[test]
    fn set_vivifies_objects_and_arrays() {
        let mut tree = json!({});
        set(&mut tree, "a.b", json!(1));
        set(&mut tree, "list[2].name", json!("c"));
        assert_eq!(
            tree,
            json!({ "a": { "b": 1 }, "list": [null, null, { "name": "c" }] })
        );
    }

    #[test]
    fn set_replaces_scalars_in_the_way() {
        let mut tree = json!({ "a": 5 });
        set(&mut tree, "a.b", json!(true));
        assert_eq!(tree, json!({ "a": { "b": true } }));
    }

    #[test]
    fn set_keeps_siblings() {
        let mut tree = json!({ "sub": { "test": true } });
        set(&mut tree, "sub.deep", json!("merging"));
        assert_eq!(tree, json!({ "sub": { "test": true, "deep": "merging" } }));
    }

    #[test]
    fn set_with_empty_path_keeps_container() {
        let mut tree = json!({ "keep": 1 });
        set(&mut tree, "", json!(5));
        assert_eq!(tree, json!({ "keep": 1, "": 5 }));

        let mut list = json!([1, 2]);
        set(&mut list, "", json!(5));
        assert_eq!(list, json!([1, 2]));
    }

    #[test]
    fn set_numeric_key_indexes_existing_array() {
        let mut tree = json!({ "list": [1, 2, 3] });
        set(&mut tree, "list.1", json!("two"));
        set(&mut tree, "list.4.name", json!("e"));
        assert_eq!(tree, json!({ "list": [1, "two", 3, null, { "name": "e" }] }));

        set(&mut tree, "list.foo", json!(true));
        assert_eq!(tree, json!({ "list": { "foo": true } }));
    }

    #[test]
    fn merge_objects_deeply() {
        let mut tree = json!({ "hello": "world", "sub": { "test": true } });
        merge(&mut tree, json!({ "derp": true, "sub": { "deep": "merging" } }));
        assert_eq!(
            tree,
            json!({ "hello": "world", "derp": true, "sub": { "test": true, "deep": "merging" } })
        );
    }

    #[test]
    fn merge_replaces_arrays() {
        let mut tree = json!({ "words": ["a", "b"] });
        merge(&mut tree, json!({ "words": ["c"] }));
        assert_eq!(tree, json!({ "words": ["c"] }));
    }

    #[test]
    fn sanitize_takes_last_segment() {
        assert_eq!(sanitize_key("a.b[0].c"), "c");
        assert_eq!(sanitize_key("nested.foo[0].bar"), "bar");
        assert_eq!(sanitize_key("verbosity"), "verbosity");
        assert_eq!(sanitize_key("--use-system-echo"), "usesystemecho");
        assert_eq!(sanitize_key("list[3]"), "3");
        assert_eq!(sanitize_key("..a...b.."), "b");
    }
}
