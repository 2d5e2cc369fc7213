use serde_json::Value as Json;

/// Backend-native representation of an object: a JSON object keyed by field.
pub type Document = serde_json::Map<String, Json>;

/// Field holding the object identifier inside a stored document.
pub const ID_FIELD: &str = "_id";

/// Resolves a dotted path (`owner.name`) inside a document.
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Json> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Json::Object(fields) => fields.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}
