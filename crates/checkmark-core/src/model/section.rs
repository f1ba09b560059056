use serde::Serialize;

use super::item::{Item, ItemId};

/// A named group of items for list rendering.
///
/// `header` doubles as the group's identity key: renderers diff rows of the
/// section with the same header across updates instead of replacing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub header: String,
    pub items: Vec<Item>,
}

impl Section {
    #[must_use]
    pub fn new(header: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            header: header.into(),
            items,
        }
    }

    /// Stable identity used for row diffing.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.header
    }

    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }
}

/// Group query-ordered items for display.
///
/// Every item currently lands in a single section labelled `header`; the
/// section is emitted even when the collection is empty so its identity
/// survives an emptied list.
#[must_use]
pub fn group(items: Vec<Item>, header: &str) -> Vec<Section> {
    vec![Section::new(header, items)]
}

/// Look up an item across all sections.
#[must_use]
pub fn find<'a>(sections: &'a [Section], id: &ItemId) -> Option<&'a Item> {
    sections
        .iter()
        .flat_map(|section| section.items.iter())
        .find(|item| &item.id == id)
}

/// Total number of items across all sections.
#[must_use]
pub fn item_count(sections: &[Section]) -> usize {
    sections.iter().map(|section| section.items.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn item(id: &str, updated_secs: i64) -> Item {
        let at = Utc.timestamp_opt(1_700_000_000 + updated_secs, 0).single().unwrap();
        Item {
            id: ItemId::new(id),
            title: format!("title {id}"),
            description: String::new(),
            is_checked: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn empty_collection_still_yields_the_default_section() {
        let sections = group(Vec::new(), "");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].identity(), "");
        assert!(sections[0].items.is_empty());
    }

    #[test]
    fn find_locates_items_by_id() {
        let sections = group(vec![item("a", 1), item("b", 2)], "");
        assert_eq!(
            find(&sections, &ItemId::new("b")).map(|i| i.updated_at),
            Some(item("b", 2).updated_at)
        );
        assert!(find(&sections, &ItemId::new("zz")).is_none());
        assert!(sections[0].contains(&ItemId::new("a")));
        assert_eq!(item_count(&sections), 2);
    }

    proptest! {
        #[test]
        fn grouping_preserves_query_order(mut stamps in proptest::collection::vec(0i64..10_000, 0..40)) {
            stamps.sort_unstable();
            let items: Vec<Item> = stamps
                .iter()
                .enumerate()
                .map(|(i, secs)| item(&format!("id-{i}"), *secs))
                .collect();

            let sections = group(items.clone(), "");
            prop_assert_eq!(sections.len(), 1);
            prop_assert_eq!(&sections[0].items, &items);
        }
    }
}
