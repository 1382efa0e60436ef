use crate::database::repo::AttributeValues;
use crate::extract::Metadata;
use crate::utils::config::TagFsConfig;

/// Turns an extractor's mapping into the attributes stored in the index.
///
/// Attribute names are lower-cased and every key yields an attribute, even
/// when nothing usable is left of its value. List attributes are split on
/// commas and keep only the non-empty parts. Any other key keeps exactly one
/// value, its trimmed text, which may be empty.
pub fn normalize_metadata(metadata: &Metadata, config: &TagFsConfig) -> Vec<AttributeValues> {
    metadata
        .iter()
        .map(|(key, value)| {
            let attr = key.to_lowercase();
            let values = if config.splits(&attr) {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            } else {
                vec![value.trim().to_string()]
            };
            (attr, values)
        })
        .collect()
}
