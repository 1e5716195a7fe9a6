//! Remote table schema for `harvest schema`.
//!
//! Prints the field list an operator needs to create the Airtable table
//! the store writes to. Category choices come from the classifier tables
//! in effect, so overridden tables produce a matching schema.

use anyhow::Result;
use serde_json::{json, Value};

use crate::classify::Classifier;
use crate::config::Config;
use crate::store::airtable::field;

pub fn table_schema(config: &Config) -> Value {
    let classifier = Classifier::from_config(&config.classifier);
    let choices: Vec<Value> = classifier
        .category_names()
        .into_iter()
        .map(|name| json!({ "name": name }))
        .collect();

    let text = |name: &str, description: &str| {
        json!({ "name": name, "type": "singleLineText", "description": description })
    };
    let long_text = |name: &str, description: &str| {
        json!({ "name": name, "type": "multilineText", "description": description })
    };
    let url = |name: &str, description: &str| {
        json!({ "name": name, "type": "url", "description": description })
    };
    let attachment = |name: &str, description: &str| {
        json!({ "name": name, "type": "multipleAttachments", "description": description })
    };

    json!({
        "name": config.store.table,
        "description": "Prompt cases harvested from community collections",
        "fields": [
            text(&config.store.fingerprint_field, "SHA-256 of the trimmed prompt; unique per record"),
            text(field::TITLE, "Case title"),
            long_text(field::PROMPT, "Full prompt text"),
            text(field::AUTHOR, "Original creator's handle"),
            url(field::AUTHOR_URL, "Link to the author's profile"),
            text(field::SOURCE_REPO, "owner/repo the case was harvested from"),
            url(field::SOURCE_URL, "Direct link to the source"),
            url(field::REFERENCE_IMAGE_URL, "Reference image shown before the result"),
            url(field::RESULT_IMAGE_URL, "Result image"),
            attachment(field::REFERENCE_IMAGE, "Reference image attachment"),
            attachment(field::RESULT_IMAGE, "Result image attachment"),
            {
                "name": field::REFERENCE_REQUIRED,
                "type": "checkbox",
                "description": "Whether the prompt needs a user-supplied image"
            },
            long_text(field::REFERENCE_NOTE, "Instructions for the reference image"),
            text(field::TAGS, "Comma-separated tags"),
            {
                "name": field::CATEGORY,
                "type": "singleSelect",
                "options": { "choices": choices },
                "description": "Content category"
            },
            {
                "name": field::SCRAPED_AT,
                "type": "dateTime",
                "options": {
                    "dateFormat": { "name": "iso" },
                    "timeFormat": { "name": "24hour" },
                    "timeZone": "utc"
                },
                "description": "When the case was harvested"
            }
        ]
    })
}

pub fn print_schema(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&table_schema(config))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_lists_categories_and_fingerprint() {
        let schema = table_schema(&Config::default());
        assert_eq!(schema["name"], "NanoBanana");
        let fields = schema["fields"].as_array().unwrap();
        assert_eq!(fields[0]["name"], "Fingerprint");

        let category = fields.iter().find(|f| f["name"] == "Category").unwrap();
        let choices = category["options"]["choices"].as_array().unwrap();
        assert_eq!(choices.last().unwrap()["name"], "General");
        assert!(choices.iter().any(|c| c["name"] == "Portrait & Character"));
    }
}
