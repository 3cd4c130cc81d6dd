//! Query description: index choice, key range, direction, predicate.

use serde_json::Value;

/// Cursor walk order over the chosen key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// Range over a compound index: equality on the partition attribute,
/// optional inclusive bounds on the secondary attribute.  Matches the
/// reporting pattern "company X, due dates between A and B".
#[derive(Debug, Clone)]
pub struct KeyRange {
    pub partition: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
}

impl KeyRange {
    pub fn only(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            lower: None,
            upper: None,
        }
    }

    pub fn between(
        partition: impl Into<String>,
        lower: impl Into<String>,
        upper: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            lower: Some(lower.into()),
            upper: Some(upper.into()),
        }
    }
}

/// In-memory predicate applied after decryption.
pub type Filter = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// A cursor query over a store.  `Default` scans the whole store by
/// primary key, ascending, no filter.
#[derive(Default)]
pub struct Query {
    /// Compound index to walk; `None` walks the primary key.
    pub index: Option<String>,
    /// Key range; requires `index`.
    pub range: Option<KeyRange>,
    pub direction: Direction,
    pub filter: Option<Filter>,
}

impl Query {
    pub fn on_index(name: impl Into<String>) -> Self {
        Self {
            index: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn range(mut self, range: KeyRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn filter(mut self, f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(f));
        self
    }
}
