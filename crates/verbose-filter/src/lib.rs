//! Filter expressions for verbose recording sessions.

mod expression;

pub use expression::{is_valid_filter, ExpressionFilter};
pub use verbose_types::{CheckFilter, FilterError};
