use super::{Identifiable, Result, is_zero_json};

/// Restores declared defaults over storage-native zero values.
///
/// Only attributes that declare a non-zero default and currently hold a zero
/// value are written, through `Identifiable::set_attribute`.
pub fn reset_default_for_zero_values(object: &mut dyn Identifiable) -> Result<()> {
    let specs = object.attribute_specifications();
    if specs.is_empty() {
        return Ok(());
    }

    let doc = object.to_document()?;

    for spec in specs {
        let is_zero = doc.get(spec.name).is_none_or(is_zero_json);
        if is_zero && !is_zero_json(&spec.default_value) {
            object.set_attribute(spec.name, spec.default_value)?;
        }
    }

    Ok(())
}
