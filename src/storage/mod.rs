pub mod field;
pub mod heap_file;
pub mod heap_page;
pub mod page_id;
pub mod schema;
pub mod tuple;

pub use field::{Field, Type, MAX_STRING_LEN};
pub use heap_file::{HeapFile, HeapFileIterator};
pub use heap_page::HeapPage;
pub use page_id::HeapPageID;
pub use schema::{FieldItem, Schema};
pub use tuple::{RecordId, Tuple};
