//! Pagination and ordering shared by every list operation.

use std::cmp::Ordering as CmpOrdering;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{Timestamp, Violation};
use crate::store::instance::Record;

/// A sortable projection of one attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrderKey {
    Text(String),
    Number(i64),
    Flag(bool),
    /// Unset timestamps sort before every set one.
    Time(Option<Timestamp>),
}

impl OrderKey {
    pub fn text(value: &str) -> Self {
        OrderKey::Text(value.to_string())
    }
}

/// Entities that can be listed with `order_by`.
pub trait Orderable {
    const ORDER_FIELDS: &'static [&'static str];

    fn order_key(&self, field: &str) -> Option<OrderKey>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub field: String,
    pub direction: Direction,
}

impl Ordering {
    /// Parse `field` (ascending) or `-field` (descending).
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Ordering {
                field: field.to_string(),
                direction: Direction::Desc,
            },
            None => Ordering {
                field: raw.to_string(),
                direction: Direction::Asc,
            },
        }
    }

    fn validate<T: Orderable>(&self) -> Result<(), Violation> {
        if T::ORDER_FIELDS.contains(&self.field.as_str()) {
            Ok(())
        } else {
            Err(Violation::UnknownOrderField {
                field: self.field.clone(),
            })
        }
    }

    fn compare<T: Orderable>(&self, a: &T, b: &T) -> CmpOrdering {
        let ordering = a
            .order_key(&self.field)
            .cmp(&b.order_key(&self.field));
        match self.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }
}

/// Paging parameters of a list call. Unset values fall back to the
/// instance's [`PageLimits`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 1000,
        }
    }
}

impl PageLimits {
    /// Effective page size: zero is rejected, anything above the maximum is
    /// clamped to it.
    pub fn resolve(&self, requested: Option<usize>) -> Result<usize, Violation> {
        match requested {
            Some(0) => Err(Violation::ZeroLimit),
            Some(limit) => Ok(limit.min(self.max_limit)),
            None => Ok(self.default_limit.min(self.max_limit)),
        }
    }
}

/// One page of a listing plus the size of the whole filtered collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_entries: usize,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Order, then slice, already-filtered records. Without `order_by` the
/// page follows creation order; with it the sort is stable so ties keep
/// creation order too.
pub fn paginate<'a, T, I>(
    records: I,
    query: &ListQuery,
    limits: PageLimits,
) -> Result<Page<T>, Violation>
where
    T: Orderable + Clone + 'a,
    I: IntoIterator<Item = &'a Record<T>>,
{
    let limit = limits.resolve(query.limit)?;
    let ordering = query.order_by.as_deref().map(Ordering::parse);
    if let Some(ordering) = &ordering {
        ordering.validate::<T>()?;
    }

    let mut records: Vec<&Record<T>> = records
        .into_iter()
        .sorted_by_key(|record| record.seq)
        .collect();
    if let Some(ordering) = &ordering {
        records.sort_by(|a, b| ordering.compare(&a.value, &b.value));
    }

    let total_entries = records.len();
    let items = records
        .into_iter()
        .skip(query.offset.unwrap_or(0))
        .take(limit)
        .map(|record| record.value.clone())
        .collect();

    Ok(Page {
        items,
        total_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        rank: i64,
    }

    impl Orderable for Item {
        const ORDER_FIELDS: &'static [&'static str] = &["name", "rank"];

        fn order_key(&self, field: &str) -> Option<OrderKey> {
            match field {
                "name" => Some(OrderKey::text(self.name)),
                "rank" => Some(OrderKey::Number(self.rank)),
                _ => None,
            }
        }
    }

    fn records() -> Vec<Record<Item>> {
        // seq deliberately out of name order
        vec![
            Record::new(3, Item { name: "c", rank: 1 }),
            Record::new(1, Item { name: "b", rank: 2 }),
            Record::new(2, Item { name: "a", rank: 1 }),
        ]
    }

    fn names(page: &Page<Item>) -> Vec<&'static str> {
        page.items.iter().map(|item| item.name).collect()
    }

    #[test]
    fn test_default_is_creation_order() {
        let records = records();
        let page = paginate(&records, &ListQuery::new(), PageLimits::default()).unwrap();
        assert_eq!(names(&page), vec!["b", "a", "c"]);
        assert_eq!(page.total_entries, 3);
    }

    #[test]
    fn test_order_by_desc_keeps_ties_in_creation_order() {
        let records = records();
        let page = paginate(
            &records,
            &ListQuery::new().order_by("-rank"),
            PageLimits::default(),
        )
        .unwrap();
        assert_eq!(names(&page), vec!["b", "a", "c"]);

        let page = paginate(
            &records,
            &ListQuery::new().order_by("rank"),
            PageLimits::default(),
        )
        .unwrap();
        assert_eq!(names(&page), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_offset_and_limit() {
        let records = records();
        let page = paginate(
            &records,
            &ListQuery::new().order_by("name").offset(1).limit(1),
            PageLimits::default(),
        )
        .unwrap();
        assert_eq!(names(&page), vec!["b"]);
        assert_eq!(page.total_entries, 3);

        let page = paginate(
            &records,
            &ListQuery::new().offset(10),
            PageLimits::default(),
        )
        .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.total_entries, 3);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let records = records();
        let err = paginate(
            &records,
            &ListQuery::new().order_by("-colour"),
            PageLimits::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            Violation::UnknownOrderField {
                field: "colour".to_string()
            }
        );
    }

    #[test]
    fn test_limit_resolution() {
        let limits = PageLimits {
            default_limit: 2,
            max_limit: 5,
        };
        assert_eq!(limits.resolve(None).unwrap(), 2);
        assert_eq!(limits.resolve(Some(50)).unwrap(), 5);
        assert_eq!(limits.resolve(Some(0)), Err(Violation::ZeroLimit));
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!(Ordering::parse("-start_date").direction, Direction::Desc);
        assert_eq!(Ordering::parse("start_date").field, "start_date");
    }
}
