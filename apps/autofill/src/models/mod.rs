pub mod field;
pub mod profile;

pub use field::{ElementRef, Field, FieldType, FillReport, FillResult};
pub use profile::Profile;
