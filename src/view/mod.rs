//! The list pipeline behind every management page: filter, sort, paginate,
//! select, then act on the selection in bulk.

pub mod bulk;
pub mod filter;
pub mod list;
pub mod paging;
pub mod selection;
pub mod session;
pub mod sort;

pub use session::ViewSession;
