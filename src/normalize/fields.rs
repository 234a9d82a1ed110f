use serde::Serialize;

use crate::error::SchemaInferenceError;

/// The upstream field names chosen for each role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferredFields {
    pub date: String,
    pub value: String,
}

/// First name (in the given order) whose lowercase form contains any keyword.
pub fn find_field<'a, I>(names: I, keywords: &[String], exclude: Option<&str>) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    names.into_iter().find(|name| {
        if Some(*name) == exclude {
            return false;
        }
        let lower = name.to_lowercase();
        keywords.iter().any(|k| !k.is_empty() && lower.contains(k.as_str()))
    })
}

/// Pick the date field, then the value field among the remaining names.
pub fn infer_fields<'a, I>(
    names: I,
    date_keywords: &[String],
    value_keywords: &[String],
) -> Result<InferredFields, SchemaInferenceError>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    let date = find_field(names.iter().copied(), date_keywords, None);
    let value = find_field(names.iter().copied(), value_keywords, date);

    match (date, value) {
        (Some(date), Some(value)) => Ok(InferredFields {
            date: date.to_string(),
            value: value.to_string(),
        }),
        (d, v) => {
            let missing = match (d.is_none(), v.is_none()) {
                (true, true) => "date and value",
                (true, false) => "date",
                _ => "value",
            };
            Err(SchemaInferenceError {
                missing: missing.to_string(),
                available: names.iter().map(|s| s.to_string()).collect(),
            })
        }
    }
}
