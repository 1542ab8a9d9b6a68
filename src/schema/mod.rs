pub mod layout;
pub mod record;

pub use layout::{Layout, FORM_5500, FORM_5500_SF};
pub use record::{normalize_ein, CanonicalRecord, DatasetRow};
