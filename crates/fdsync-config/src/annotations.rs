use std::any::type_name;

use documented::{Documented, DocumentedFields};
use toml_edit::{ArrayOfTables, Decor, Item, RawString, Table};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Turns `docs` into `#` comment lines and appends them to the prefix of
/// `decor`, separating them from an existing prefix with a bare `#` line.
pub fn append_docs_as_toml_comments(decor: &mut Decor, docs: &str) {
    let comments: String = docs
        .lines()
        .map(|line| {
            if line.is_empty() {
                "#\n".to_string()
            } else {
                format!("# {line}\n")
            }
        })
        .collect();

    let existing = decor
        .prefix()
        .and_then(RawString::as_str)
        .unwrap_or_default();

    let new_prefix = if existing.is_empty() || existing.ends_with("\n\n") {
        format!("{existing}{comments}")
    } else if existing.ends_with('\n') {
        format!("{existing}#\n{comments}")
    } else {
        format!("{existing}\n{comments}")
    };
    decor.set_prefix(new_prefix);
}

/// Writes the field docs of `T` above every key of `table`. Non-root tables
/// also get the doc comment of `T` itself.
pub fn annotate_toml_table<T>(table: &mut Table, is_root: bool) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    if !is_root {
        append_docs_as_toml_comments(table.decor_mut(), T::DOCS);
    }

    for (mut key, item) in table.iter_mut() {
        let name = key.get().to_string();
        let Ok(docs) = T::get_field_docs(&name) else {
            debug!("no docs for field '{}' of '{}'", name, type_name::<T>());
            continue;
        };

        match item {
            Item::None => return Err(ConfigError::UnexpectedTomlItem(name)),
            Item::Value(_) => append_docs_as_toml_comments(key.leaf_decor_mut(), docs),
            Item::Table(sub) => append_docs_as_toml_comments(sub.decor_mut(), docs),
            Item::ArrayOfTables(array) => {
                if let Some(first) = array.iter_mut().next() {
                    append_docs_as_toml_comments(first.decor_mut(), docs);
                }
            }
        }
    }

    Ok(())
}

/// Annotates the first table of `array` with the field docs of `T`; the rest
/// share its shape.
pub fn annotate_toml_array_of_tables<T>(array: &mut ArrayOfTables) -> Result<()>
where
    T: Documented + DocumentedFields,
{
    match array.iter_mut().next() {
        Some(first) => annotate_toml_table::<T>(first, false),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use toml_edit::{DocumentMut, Decor};

    use super::*;
    use crate::{config::Config, device::DeviceProfile, repository::RepositoryConfig};

    fn prefix(decor: &Decor) -> String {
        decor
            .prefix()
            .and_then(|p| p.as_str())
            .unwrap_or_default()
            .to_string()
    }

    #[test]
    fn test_append_docs_blank_lines() {
        let mut decor = Decor::new("", "");
        append_docs_as_toml_comments(&mut decor, "First\n\nSecond");
        assert_eq!(prefix(&decor), "# First\n#\n# Second\n");
    }

    #[test]
    fn test_append_docs_after_existing_prefix() {
        let mut decor = Decor::new("# existing\n", "");
        append_docs_as_toml_comments(&mut decor, "More");
        assert_eq!(prefix(&decor), "# existing\n#\n# More\n");
    }

    #[test]
    fn test_annotate_device_table() {
        let mut doc: DocumentMut = "[device]\napi_level = 30\n".parse().unwrap();
        let device = doc["device"].as_table_mut().unwrap();
        annotate_toml_table::<DeviceProfile>(device, false).unwrap();

        let rendered = doc.to_string();
        assert!(rendered.contains("# Android API level"));
        assert!(rendered.contains("api_level = 30"));
    }

    #[test]
    fn test_annotate_repositories() {
        let mut doc: DocumentMut = r#"
[[repositories]]
name = "one"
address = "https://example.org/repo"

[[repositories]]
name = "two"
address = "https://example.org/two"
"#
        .parse()
        .unwrap();
        let array = doc["repositories"].as_array_of_tables_mut().unwrap();
        annotate_toml_array_of_tables::<RepositoryConfig>(array).unwrap();

        let rendered = doc.to_string();
        assert_eq!(rendered.matches("# Base address").count(), 1);
    }

    #[test]
    fn test_annotated_default_config() {
        let doc = Config::default_config().to_annotated_document().unwrap();
        let rendered = doc.to_string();
        assert!(rendered.contains("# Allow releases newer than"));
        assert!(rendered.contains("[device]"));
    }
}
