//! Item-Entity Linker
//!
//! Seeds the item and entity vocabularies from the file that ties rating-system
//! items to knowledge-graph entities.

use crate::error::{PrepError, Result};
use crate::reader::{Columns, DelimitedReader};
use crate::types::{RawId, Vocab};
use std::path::Path;

/// Read `(raw item id, raw entity id)` pairs and assign each side the next
/// dense index in file order. Both vocabularies must start empty.
pub fn read_item2entity_file(
    path: &Path,
    item_vocab: &mut Vocab<RawId>,
    entity_vocab: &mut Vocab<RawId>,
) -> Result<()> {
    log::info!("Reading item2entity file: {}", path.display());

    if !item_vocab.is_empty() {
        return Err(PrepError::VocabularyNotEmpty { vocab: "item" });
    }
    if !entity_vocab.is_empty() {
        return Err(PrepError::VocabularyNotEmpty { vocab: "entity" });
    }

    let lines = DelimitedReader::tab_separated(path, Columns::Exactly(2)).for_each(|fields| {
        let item: RawId = fields.parse(0)?;
        let entity: RawId = fields.parse(1)?;
        item_vocab.get_or_insert(item);
        entity_vocab.get_or_insert(entity);
        Ok(())
    })?;

    log::info!(
        "Linked {} lines: {} items, {} entities",
        lines,
        item_vocab.len(),
        entity_vocab.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_link_assigns_dense_indices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item_index2entity_id.txt");
        std::fs::write(&path, "101\t5001\n102\t5002\n103\t5003\n").unwrap();

        let mut items = Vocab::new();
        let mut entities = Vocab::new();
        read_item2entity_file(&path, &mut items, &mut entities).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(entities.len(), 3);
        assert_eq!(items.get(&102), Some(1));
        assert_eq!(entities.get(&5003), Some(2));
    }

    #[test]
    fn test_repeated_item_keeps_first_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item_index2entity_id.txt");
        std::fs::write(&path, "101\t5001\n102\t5002\n101\t5001\n").unwrap();

        let mut items = Vocab::new();
        let mut entities = Vocab::new();
        read_item2entity_file(&path, &mut items, &mut entities).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items.get(&101), Some(0));
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_requires_empty_vocabularies() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item_index2entity_id.txt");
        std::fs::write(&path, "101\t5001\n").unwrap();

        let mut items: Vocab<RawId> = [1].into_iter().collect();
        let mut entities = Vocab::new();
        let err = read_item2entity_file(&path, &mut items, &mut entities).unwrap_err();
        assert!(matches!(err, PrepError::VocabularyNotEmpty { vocab: "item" }));

        let mut items = Vocab::new();
        let mut entities: Vocab<RawId> = [9].into_iter().collect();
        let err = read_item2entity_file(&path, &mut items, &mut entities).unwrap_err();
        assert!(matches!(err, PrepError::VocabularyNotEmpty { vocab: "entity" }));
    }

    #[test]
    fn test_malformed_line_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item_index2entity_id.txt");
        std::fs::write(&path, "101\t5001\n102\n").unwrap();

        let mut items = Vocab::new();
        let mut entities = Vocab::new();
        let err = read_item2entity_file(&path, &mut items, &mut entities).unwrap_err();
        assert!(matches!(err, PrepError::ColumnCount { line: 2, found: 1, .. }));
    }

    #[test]
    fn test_extra_column_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item_index2entity_id.txt");
        std::fs::write(&path, "101\t5001\t777\n\n102\t5002\n").unwrap();

        let mut items = Vocab::new();
        let mut entities = Vocab::new();
        let err = read_item2entity_file(&path, &mut items, &mut entities).unwrap_err();
        assert!(matches!(err, PrepError::ColumnCount { line: 1, found: 3, .. }));
    }
}
