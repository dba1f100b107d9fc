//! `KEY:VALUE` properties given to `add`.
//!
//! Values are typed by trying each sniffer in order; the first one that
//! accepts the text decides the stored value. Text nothing accepts is kept
//! as a plain string.

use anyhow::{anyhow, bail};
use serde_json::{Number, Value};
use tracing::trace;

use crate::datetime::DateResolver;
use crate::record::{DONE_KEY, DUE_KEY, PLANNED_KEY};

const TRUE_WORDS: [&str; 6] = ["True", "true", "Yes", "yes", "Y", "y"];
const FALSE_WORDS: [&str; 6] = ["False", "false", "No", "no", "N", "n"];

type Sniffer = fn(&str, &dyn DateResolver) -> Option<Value>;

const SNIFFERS: [(&str, Sniffer); 4] = [
    ("bool", sniff_bool),
    ("int", sniff_int),
    ("float", sniff_float),
    ("date", sniff_date),
];

#[tracing::instrument(skip(resolver))]
pub fn parse_property(raw: &str, resolver: &dyn DateResolver) -> anyhow::Result<(String, Value)> {
    let (key, value) = split_property(raw)
        .ok_or_else(|| anyhow!("properties key and value arguments must be separated by `:`: {raw}"))?;

    if key == DONE_KEY {
        return sniff_bool(&value, resolver)
            .map(|flag| (key, flag))
            .ok_or_else(|| anyhow!("the `done` property must be a boolean value"));
    }

    if key == PLANNED_KEY || key == DUE_KEY {
        return sniff_date(&value, resolver)
            .map(|date| (key.clone(), date))
            .ok_or_else(|| anyhow!("provided `{key}` value could not be parsed as a date"));
    }

    for (kind, sniffer) in SNIFFERS {
        if let Some(typed) = sniffer(&value, resolver) {
            trace!(key = %key, kind, "sniffed property");
            return Ok((key, typed));
        }
    }

    Ok((key, Value::String(value)))
}

pub fn parse_properties(
    raw: &[String],
    resolver: &dyn DateResolver,
) -> anyhow::Result<serde_json::Map<String, Value>> {
    let mut props = serde_json::Map::new();
    for prop in raw {
        let (key, value) = parse_property(prop, resolver)?;
        if key.is_empty() {
            bail!("property key cannot be empty: {prop}");
        }
        props.insert(key, value);
    }
    Ok(props)
}

/// Splits at the first `:` not preceded by a backslash. Escaped colons in the
/// key are unescaped; the value is kept verbatim.
fn split_property(raw: &str) -> Option<(String, String)> {
    let mut prev = None;
    for (idx, ch) in raw.char_indices() {
        if ch == ':' && prev != Some('\\') {
            let key = raw[..idx].replace("\\:", ":");
            let value = &raw[idx + 1..];
            return Some((key.trim().to_string(), value.trim().to_string()));
        }
        prev = Some(ch);
    }
    None
}

fn sniff_bool(value: &str, _: &dyn DateResolver) -> Option<Value> {
    if TRUE_WORDS.contains(&value) {
        Some(Value::Bool(true))
    } else if FALSE_WORDS.contains(&value) {
        Some(Value::Bool(false))
    } else {
        None
    }
}

fn sniff_int(value: &str, _: &dyn DateResolver) -> Option<Value> {
    value.parse::<i64>().ok().map(Value::from)
}

fn sniff_float(value: &str, _: &dyn DateResolver) -> Option<Value> {
    let parsed = value.parse::<f64>().ok()?;
    Number::from_f64(parsed).map(Value::Number)
}

fn sniff_date(value: &str, resolver: &dyn DateResolver) -> Option<Value> {
    resolver
        .resolve(value)
        .map(|resolved| Value::String(resolved.to_storage_string()))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    use super::{parse_properties, parse_property};
    use crate::datetime::NaturalDateResolver;

    fn resolver() -> NaturalDateResolver {
        NaturalDateResolver::new(
            NaiveDate::from_ymd_opt(2026, 1, 7)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .expect("valid now"),
        )
    }

    fn parse(raw: &str) -> anyhow::Result<(String, Value)> {
        parse_property(raw, &resolver())
    }

    #[test]
    fn done_must_be_boolean() {
        assert_eq!(parse("done:yes").expect("bool"), ("done".to_string(), json!(true)));
        assert_eq!(parse("done: N").expect("bool"), ("done".to_string(), json!(false)));
        assert!(parse("done:maybe").is_err());
        assert!(parse("done:1").is_err());
    }

    #[test]
    fn sniffers_apply_in_order() {
        assert_eq!(parse("urgent:y").expect("bool").1, json!(true));
        assert_eq!(parse("n:3").expect("int").1, json!(3));
        assert_eq!(parse("x:2.5").expect("float").1, json!(2.5));
        assert_eq!(
            parse("review:tomorrow at 3pm").expect("date").1,
            json!("January 8, 2026, 3:00 PM")
        );
        assert_eq!(parse("note:call Bob").expect("string").1, json!("call Bob"));
    }

    #[test]
    fn planned_and_due_must_be_dates() {
        assert_eq!(
            parse("planned:friday").expect("date").1,
            json!("January 9, 2026")
        );
        assert!(parse("due:whenever").is_err());
        assert!(parse("due:5").is_err());
    }

    #[test]
    fn splits_on_first_unescaped_colon() {
        assert_eq!(
            parse(r"url\:scheme:https://example.com").expect("string"),
            ("url:scheme".to_string(), json!("https://example.com"))
        );
        assert!(parse("no separator").is_err());
    }

    #[test]
    fn collects_properties() {
        let props = parse_properties(
            &["done:no".to_string(), "effort:2".to_string()],
            &resolver(),
        )
        .expect("parse props");
        assert_eq!(props.get("done"), Some(&json!(false)));
        assert_eq!(props.get("effort"), Some(&json!(2)));
        assert!(parse_properties(&[":x".to_string()], &resolver()).is_err());
    }
}
