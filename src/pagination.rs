use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::limits::MAX_PAGE_LIMIT;
use crate::model::{Booking, Review, Room};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    CreatedAt,
    CheckIn,
    CheckOut,
    TotalPrice,
    Price,
    RoomNumber,
    Rating,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::CheckIn => "check_in_date",
            SortField::CheckOut => "check_out_date",
            SortField::TotalPrice => "total_price",
            SortField::Price => "price",
            SortField::RoomNumber => "room_number",
            SortField::Rating => "rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

/// Ordering requested by the caller, written as `"<field> [asc|desc]"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sort {
    pub field: SortField,
    pub direction: Direction,
}

impl Sort {
    pub const fn new(field: SortField, direction: Direction) -> Self {
        Self { field, direction }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Self::new(SortField::CreatedAt, Direction::Desc)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        write!(f, "{} {dir}", self.field.as_str())
    }
}

impl FromStr for Sort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let field = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some("created_at") => SortField::CreatedAt,
            Some("check_in_date") | Some("check_in") => SortField::CheckIn,
            Some("check_out_date") | Some("check_out") => SortField::CheckOut,
            Some("total_price") => SortField::TotalPrice,
            Some("price") => SortField::Price,
            Some("room_number") => SortField::RoomNumber,
            Some("rating") => SortField::Rating,
            _ => return Err(s.to_string()),
        };
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(_) => return Err(s.to_string()),
        };
        if parts.next().is_some() {
            return Err(s.to_string());
        }
        Ok(Sort { field, direction })
    }
}

/// Page defaults applied when the caller leaves a parameter out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationDefaults {
    pub limit: u32,
    pub max_limit: u32,
    pub sort: Sort,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self {
            limit: 10,
            max_limit: 100,
            sort: Sort::default(),
        }
    }
}

/// Raw listing parameters as a caller supplies them. Unset fields take the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// `"<field> [asc|desc]"`.
    pub sort: Option<String>,
}

impl PageRequest {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            sort: None,
        }
    }

    pub fn sorted(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }
}

/// Query-shaping cursor. A `limit` of zero means no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
    pub sort: Sort,
}

impl Pagination {
    /// Pages are 1-based; page 0 is treated as page 1.
    pub fn new(page: u32, limit: u32, sort: Sort) -> Self {
        let page = page.max(1);
        Self {
            limit,
            offset: u64::from(page - 1) * u64::from(limit),
            sort,
        }
    }

    /// Everything, in the given order.
    pub fn unbounded(sort: Sort) -> Self {
        Self {
            limit: 0,
            offset: 0,
            sort,
        }
    }

    /// Build a cursor from optional caller input, clamping the limit to the
    /// configured maximum. Callers cannot ask for an unbounded page: a zero
    /// limit becomes the maximum.
    pub fn from_query(
        page: Option<u32>,
        limit: Option<u32>,
        sort: Option<Sort>,
        defaults: &PaginationDefaults,
    ) -> Self {
        let max = defaults.max_limit.min(MAX_PAGE_LIMIT);
        let limit = match limit.unwrap_or(defaults.limit) {
            0 => max,
            n => n.min(max),
        };
        Self::new(page.unwrap_or(1), limit, sort.unwrap_or(defaults.sort))
    }

    /// Sort `items` and cut out the requested page.
    pub fn apply<T: Sortable>(&self, mut items: Vec<T>) -> Vec<T> {
        items.sort_by(|a, b| {
            let ord = a.compare_by(b, self.sort.field).then_with(|| a.tie_break(b));
            match self.sort.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let iter = items.into_iter().skip(offset);
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit as usize).collect()
        }
    }
}

/// Records that can be listed with a caller-supplied sort.
pub trait Sortable {
    /// Fields callers may sort this record by.
    const SORT_FIELDS: &'static [SortField];

    /// Compare by `field`; fields outside `SORT_FIELDS` fall back to creation order.
    fn compare_by(&self, other: &Self, field: SortField) -> Ordering;

    /// Stable ordering between records equal on the sort field.
    fn tie_break(&self, other: &Self) -> Ordering;
}

impl Sortable for Room {
    const SORT_FIELDS: &'static [SortField] =
        &[SortField::CreatedAt, SortField::Price, SortField::RoomNumber];

    fn compare_by(&self, other: &Self, field: SortField) -> Ordering {
        match field {
            SortField::Price => self.price.cmp(&other.price),
            SortField::RoomNumber => self.room_number.cmp(&other.room_number),
            _ => self.created_at.cmp(&other.created_at),
        }
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Sortable for Booking {
    const SORT_FIELDS: &'static [SortField] = &[
        SortField::CreatedAt,
        SortField::CheckIn,
        SortField::CheckOut,
        SortField::TotalPrice,
    ];

    fn compare_by(&self, other: &Self, field: SortField) -> Ordering {
        match field {
            SortField::CheckIn => self.span.check_in.cmp(&other.span.check_in),
            SortField::CheckOut => self.span.check_out.cmp(&other.span.check_out),
            SortField::TotalPrice => self.total_price.cmp(&other.total_price),
            _ => self.created_at.cmp(&other.created_at),
        }
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Sortable for Review {
    const SORT_FIELDS: &'static [SortField] = &[SortField::CreatedAt, SortField::Rating];

    fn compare_by(&self, other: &Self, field: SortField) -> Ordering {
        match field {
            SortField::Rating => self.rating.cmp(&other.rating),
            _ => self.created_at.cmp(&other.created_at),
        }
    }

    fn tie_break(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoomStatus;
    use ulid::Ulid;

    fn room(number: &str, price: u64, created_at: i64) -> Room {
        Room {
            id: Ulid::new(),
            room_number: number.into(),
            room_type: "single".into(),
            price,
            description: String::new(),
            status: RoomStatus::Available,
            max_occupancy: 1,
            created_at,
        }
    }

    #[test]
    fn parse_sort() {
        assert_eq!(
            "created_at desc".parse::<Sort>(),
            Ok(Sort::new(SortField::CreatedAt, Direction::Desc))
        );
        assert_eq!(
            "price".parse::<Sort>(),
            Ok(Sort::new(SortField::Price, Direction::Asc))
        );
        assert_eq!(
            "CHECK_IN_DATE ASC".parse::<Sort>(),
            Ok(Sort::new(SortField::CheckIn, Direction::Asc))
        );
        assert!("id; drop table rooms".parse::<Sort>().is_err());
        assert!("price sideways".parse::<Sort>().is_err());
        assert!("price asc extra".parse::<Sort>().is_err());
        assert!("".parse::<Sort>().is_err());
    }

    #[test]
    fn sort_display_roundtrips() {
        let sort = Sort::new(SortField::TotalPrice, Direction::Desc);
        assert_eq!(sort.to_string().parse::<Sort>(), Ok(sort));
    }

    #[test]
    fn offset_from_page() {
        let p = Pagination::new(3, 10, Sort::default());
        assert_eq!(p.offset, 20);
        let first = Pagination::new(0, 10, Sort::default());
        assert_eq!(first.offset, 0);
    }

    #[test]
    fn from_query_applies_defaults_and_clamps() {
        let defaults = PaginationDefaults::default();
        let p = Pagination::from_query(None, None, None, &defaults);
        assert_eq!(p.limit, 10);
        assert_eq!(p.offset, 0);
        assert_eq!(p.sort, Sort::default());

        let p = Pagination::from_query(Some(2), Some(5000), None, &defaults);
        assert_eq!(p.limit, 100);
        assert_eq!(p.offset, 100);
    }

    #[test]
    fn zero_limit_from_caller_is_capped() {
        let defaults = PaginationDefaults::default();
        let p = Pagination::from_query(None, Some(0), None, &defaults);
        assert_eq!(p.limit, 100);

        let wide = PaginationDefaults {
            max_limit: 5000,
            ..PaginationDefaults::default()
        };
        let p = Pagination::from_query(None, Some(0), None, &wide);
        assert_eq!(p.limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn apply_sorts_and_pages() {
        let rooms = vec![room("103", 300, 1), room("101", 100, 2), room("102", 200, 3)];
        let page = Pagination::new(1, 2, Sort::new(SortField::Price, Direction::Asc));
        let got: Vec<_> = page.apply(rooms.clone()).into_iter().map(|r| r.price).collect();
        assert_eq!(got, vec![100, 200]);

        let page = Pagination::new(2, 2, Sort::new(SortField::Price, Direction::Asc));
        let got: Vec<_> = page.apply(rooms.clone()).into_iter().map(|r| r.price).collect();
        assert_eq!(got, vec![300]);

        let newest_first = Pagination::unbounded(Sort::default());
        let got: Vec<_> = newest_first
            .apply(rooms)
            .into_iter()
            .map(|r| r.room_number)
            .collect();
        assert_eq!(got, vec!["102", "101", "103"]);
    }

    #[test]
    fn apply_past_end_is_empty() {
        let rooms = vec![room("101", 100, 1)];
        let page = Pagination::new(5, 10, Sort::default());
        assert!(page.apply(rooms).is_empty());
    }
}
