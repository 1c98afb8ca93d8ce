//! The reflection operations, one function per API entry.
//!
//! Every operation takes the [`InteropContext`](crate::context::InteropContext)
//! first and works on the active interpreter. Failures are logged and come
//! back as the null handle, `false`, zero or an empty collection.

mod functions;
mod interp;
mod objects;
mod overload;
mod scopes;
pub mod templates;
mod types;
mod variables;

pub use self::functions::*;
pub use self::interp::*;
pub use self::objects::*;
pub use self::overload::*;
pub use self::scopes::*;
pub use self::templates::{TemplateArgSpec, get_class_template_instantiation_args, instantiate_template};
pub use self::types::*;
pub use self::variables::*;
