mod slotted_page;
mod table_page;

pub use slotted_page::{SlotEntry, SlottedPage, SlottedPageRef};
pub use table_page::{TablePage, TablePageRef};
