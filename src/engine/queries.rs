use crate::model::{Booking, UserId};
use crate::pagination::{PageRequest, Pagination, Sort, Sortable};

use super::{BookingError, Engine};

impl Engine {
    /// Resolve caller listing parameters against the configured defaults.
    /// Sort fields `T` does not carry are rejected rather than ignored.
    pub(super) fn page_for<T: Sortable>(&self, req: &PageRequest) -> Result<Pagination, BookingError> {
        let sort = match &req.sort {
            None => None,
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => {
                let sort: Sort = raw.parse().map_err(BookingError::InvalidSort)?;
                if !T::SORT_FIELDS.contains(&sort.field) {
                    return Err(BookingError::InvalidSort(raw.clone()));
                }
                Some(sort)
            }
        };
        Ok(Pagination::from_query(
            req.page,
            req.limit,
            sort,
            &self.config.pagination,
        ))
    }

    /// A user's own bookings. Scoping to the caller is the caller's job.
    pub async fn list_user_bookings(
        &self,
        user_id: UserId,
        req: &PageRequest,
    ) -> Result<Vec<Booking>, BookingError> {
        let page = self.page_for::<Booking>(req)?;
        Ok(self.bookings.list_bookings_by_user(user_id, &page).await?)
    }

    pub async fn list_all_bookings(&self, req: &PageRequest) -> Result<Vec<Booking>, BookingError> {
        let page = self.page_for::<Booking>(req)?;
        Ok(self.bookings.list_bookings(&page).await?)
    }
}
