//! Embedded product payload
//!
//! Product pages ship their data as JSON inside `<script id="__LAYOUT__">`.
//! The product record is referenced from an `accordions` widget somewhere in
//! the widget tree and resolved through `resolveParamValues`.

use crate::item::DetailFields;
use scraper::{Html, Selector};
use serde_json::Value;

/// Parses the `__LAYOUT__` script payload out of a page
///
/// Returns `None` when the script is missing or does not hold valid JSON.
pub fn find_embedded_payload(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("script#__LAYOUT__").ok()?;
    let script = document.select(&selector).next()?;
    let raw = script.text().collect::<String>();

    match serde_json::from_str(raw.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Layout payload is not valid JSON: {}", e);
            None
        }
    }
}

/// Depth-first search for the key under which the product record is stored
pub fn find_product_uuid(widgets: &[Value]) -> Option<String> {
    for widget in widgets {
        if widget.get("name").and_then(Value::as_str) == Some("accordions") {
            let refs = widget.get("resolveParamRefs").and_then(Value::as_object);
            for (key, uuid) in refs.into_iter().flatten() {
                if key.contains("pdp_product_data") {
                    if let Some(uuid) = uuid.as_str() {
                        return Some(uuid.to_string());
                    }
                }
            }
        }

        if let Some(children) = widget.get("children").and_then(Value::as_array) {
            if let Some(uuid) = find_product_uuid(children) {
                return Some(uuid);
            }
        }
    }
    None
}

/// The product record inside a layout payload
pub fn product_data(payload: &Value) -> Option<&Value> {
    let widgets = payload.get("widgets").and_then(Value::as_array)?;
    let uuid = find_product_uuid(widgets)?;
    payload
        .get("resolveParamValues")?
        .get(uuid.as_str())?
        .get("data")
}

/// Maps a layout payload onto detail fields
///
/// Returns `None` when the payload carries no product record. Fields absent
/// from the record come back empty.
pub fn extract_fields(payload: &Value) -> Option<DetailFields> {
    let product = product_data(payload)?;
    let info_sections = product.get("infoSections");
    let info_section = info_sections.and_then(|s| s.get("infoSection"));

    let highlights = product
        .get("benefits")
        .and_then(Value::as_array)
        .map(|benefits| {
            benefits
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();

    let directions = info_section
        .and_then(|s| s.get("directions"))
        .map(|d| format!("{} {}", str_at(d, "heading"), str_at(d, "text")))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let ingredients = info_section
        .and_then(|s| s.get("otherIngredients"))
        .map(|i| clean_html(str_at(i, "text")))
        .unwrap_or_default();

    let nutritional_info = info_sections
        .and_then(|s| s.get("nutritionals"))
        .map(nutrition_facts)
        .unwrap_or_default();

    Some(DetailFields {
        highlights,
        description: clean_html(str_at(product, "description")),
        directions,
        ingredients,
        nutritional_info,
        product_type: String::new(),
        target_area: String::new(),
    })
}

fn str_at<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// `"nutrient: amount"` pairs across every table, skipping incomplete rows
fn nutrition_facts(nutritionals: &Value) -> String {
    let mut facts = Vec::new();
    let tables = nutritionals.as_array().map(Vec::as_slice).unwrap_or(&[]);

    for table in tables {
        let sections = table.get("sections").and_then(Value::as_array);
        for section in sections.into_iter().flatten() {
            let keys = section
                .get("fact")
                .and_then(|f| f.get("keys"))
                .and_then(Value::as_array);
            for row in keys.into_iter().flatten() {
                let nutrient = str_at(row, "key").trim();
                let amount = str_at(row, "value").trim();
                if !nutrient.is_empty() && !amount.is_empty() {
                    facts.push(format!("{}: {}", nutrient, amount));
                }
            }
        }
    }

    facts.join("; ")
}

/// Strips markup, keeping each text run trimmed and separated by a space
pub fn clean_html(fragment: &str) -> String {
    if fragment.trim().is_empty() {
        return String::new();
    }

    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "widgets": [
                {"name": "header", "children": []},
                {
                    "name": "pdp",
                    "children": [
                        {
                            "name": "accordions",
                            "resolveParamRefs": {"pdp_product_data_v2": "uuid-1"}
                        }
                    ]
                }
            ],
            "resolveParamValues": {
                "uuid-1": {
                    "data": {
                        "benefits": ["Supports immunity", "Vegan"],
                        "description": "<p>Daily <b>vitamin C</b>.</p>",
                        "infoSections": {
                            "infoSection": {
                                "directions": {"heading": "Take", "text": "one tablet daily "},
                                "otherIngredients": {"text": "<ul><li>Bulking agent</li></ul>"}
                            },
                            "nutritionals": [
                                {
                                    "sections": [
                                        {
                                            "fact": {
                                                "keys": [
                                                    {"key": "Vitamin C", "value": "1000mg"},
                                                    {"key": " Zinc ", "value": " 10mg "},
                                                    {"key": "Empty", "value": ""}
                                                ]
                                            }
                                        }
                                    ]
                                }
                            ]
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_find_embedded_payload() {
        let html = r#"<html><head>
            <script id="__LAYOUT__" type="application/json">{"widgets": []}</script>
        </head><body></body></html>"#;

        let payload = find_embedded_payload(html).unwrap();
        assert_eq!(payload, json!({"widgets": []}));
    }

    #[test]
    fn test_missing_or_malformed_payload() {
        assert!(find_embedded_payload("<html><body>no data</body></html>").is_none());
        assert!(find_embedded_payload(r#"<script id="__LAYOUT__">{not json</script>"#).is_none());
    }

    #[test]
    fn test_find_product_uuid_recurses() {
        let payload = sample_payload();
        let widgets = payload["widgets"].as_array().unwrap();
        assert_eq!(find_product_uuid(widgets), Some("uuid-1".to_string()));
        assert_eq!(find_product_uuid(&[json!({"name": "accordions"})]), None);
    }

    #[test]
    fn test_extract_fields() {
        let fields = extract_fields(&sample_payload()).unwrap();

        assert_eq!(fields.highlights, "Supports immunity; Vegan");
        assert_eq!(fields.description, "Daily vitamin C .");
        assert_eq!(fields.directions, "Take one tablet daily");
        assert_eq!(fields.ingredients, "Bulking agent");
        assert_eq!(fields.nutritional_info, "Vitamin C: 1000mg; Zinc: 10mg");
        assert!(fields.product_type.is_empty());
        assert!(fields.target_area.is_empty());
    }

    #[test]
    fn test_extract_fields_without_product_record() {
        let payload = json!({"widgets": [{"name": "accordions", "resolveParamRefs": {}}]});
        assert!(extract_fields(&payload).is_none());

        let dangling = json!({
            "widgets": [{"name": "accordions", "resolveParamRefs": {"pdp_product_data": "x"}}],
            "resolveParamValues": {}
        });
        assert!(extract_fields(&dangling).is_none());
    }

    #[test]
    fn test_sparse_record_yields_empty_fields() {
        let payload = json!({
            "widgets": [{"name": "accordions", "resolveParamRefs": {"pdp_product_data": "u"}}],
            "resolveParamValues": {"u": {"data": {}}}
        });
        let fields = extract_fields(&payload).unwrap();
        assert_eq!(fields, DetailFields::default());
    }

    #[test]
    fn test_clean_html() {
        assert_eq!(clean_html(""), "");
        assert_eq!(clean_html("plain"), "plain");
        assert_eq!(clean_html("<p>One</p><p> Two </p>"), "One Two");
    }
}
