//! JSON / JSONL record loading shared by documents and queries.

use crate::error::{Error, Result};
use crate::tokenizer::json_kind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

/// Accept `"Id": "abc"` as well as `"Id": 42`; both become strings.
pub fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Load records from a `.json` file (array or single object) or a `.jsonl`
/// file (one object per line, blank lines ignored).
pub fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let f = File::open(path)?;
    let reader = BufReader::new(f);
    if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let mut out = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() { continue; }
            let record = serde_json::from_str(&line)
                .map_err(|e| Error::Parse { line: n + 1, reason: e.to_string() })?;
            out.push(record);
        }
        return Ok(out);
    }
    Ok(match serde_json::from_reader(reader)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(r) => vec![r],
    })
}

/// Join optional title/body fields with a single space. Present fields must be strings.
pub(crate) fn joined_text(title: Option<&Value>, body: Option<&Value>) -> std::result::Result<String, String> {
    if title.is_none() && body.is_none() {
        return Err("record has no text fields".into());
    }
    fn part<'a>(name: &str, v: Option<&'a Value>) -> std::result::Result<&'a str, String> {
        match v {
            None => Ok(""),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(format!("{name}: expected text, found {}", json_kind(other))),
        }
    }
    Ok(format!("{} {}", part("Title", title)?, part("Body", body)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Rec {
        #[serde(rename = "Id", deserialize_with = "deserialize_id")]
        id: String,
    }

    #[test]
    fn ids_accept_numbers_and_strings() {
        let recs: Vec<Rec> = serde_json::from_value(json!([{"Id": 7}, {"Id": "x9"}, {"Id": -1}])).unwrap();
        let ids: Vec<_> = recs.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["7", "x9", "-1"]);
    }

    #[test]
    fn ids_reject_objects() {
        let res: std::result::Result<Rec, _> = serde_json::from_value(json!({"Id": {"a": 1}}));
        assert!(res.is_err());
    }

    #[test]
    fn joined_text_requires_strings() {
        assert_eq!(joined_text(Some(&json!("a")), Some(&json!("b"))).unwrap(), "a b");
        assert_eq!(joined_text(None, Some(&json!("b"))).unwrap(), " b");
        assert!(joined_text(Some(&json!(1)), None).is_err());
        assert!(joined_text(None, None).is_err());
    }

    #[test]
    fn joined_text_names_the_bad_field() {
        let title = json!("kept");
        let body = json!(["no"]);
        let err = joined_text(Some(&title), Some(&body)).unwrap_err();
        assert_eq!(err, "Body: expected text, found array");
        assert_eq!(joined_text(Some(&title), None).unwrap(), "kept ");
    }

    #[test]
    fn loads_json_and_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("docs.json");
        std::fs::write(&json_path, r#"[{"Id": 1}, {"Id": "2"}]"#).unwrap();
        let recs: Vec<Rec> = load_records(&json_path).unwrap();
        assert_eq!(recs.len(), 2);

        let single = dir.path().join("one.json");
        std::fs::write(&single, r#"{"Id": 5}"#).unwrap();
        assert_eq!(load_records::<Rec>(&single).unwrap()[0].id, "5");

        let jsonl = dir.path().join("docs.jsonl");
        std::fs::write(&jsonl, "{\"Id\": 1}\n\n{\"Id\": 3}\n").unwrap();
        assert_eq!(load_records::<Rec>(&jsonl).unwrap().len(), 2);

        std::fs::write(&jsonl, "{\"Id\": 1}\nnot json\n").unwrap();
        assert!(matches!(load_records::<Rec>(&jsonl), Err(Error::Parse { line: 2, .. })));
    }
}
