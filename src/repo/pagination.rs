use serde::Serialize;

/// Items shown per listing page
pub const PER_PAGE: i64 = 5;

/// One page of a listing plus the numbers needed to link its neighbours
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<i64>,
    pub next_num: Option<i64>,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let pages = if per_page <= 0 || total <= 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        let has_prev = page > 1;
        let has_next = page < pages;
        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_num: has_prev.then(|| page - 1),
            next_num: has_next.then(|| page + 1),
        }
    }

    /// Row offset of the first item on `page`
    pub fn offset(page: i64, per_page: i64) -> i64 {
        page.saturating_sub(1).max(0).saturating_mul(per_page)
    }
}
