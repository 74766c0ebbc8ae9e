//! kubeui core types: errors, request context, selectors, quantities and tables

#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod labels;
pub mod options;
pub mod quantity;
pub mod request;
pub mod resource;
pub mod table;

pub use context::{RequestContext, UserInfo};
pub use error::{ApiError, ApiResult};
pub use labels::{Selector, SelectorError};
pub use options::{CreateOptions, GetOptions, ListOptions, ObjectList};
pub use request::{AccessTarget, ApiRequestObject, Compute};
pub use resource::{gvk_key, GroupVersionKind, ResourceId, ResourceScope};
pub use table::{Table, TableConvertor, TableOptions};

pub mod prelude {
    pub use super::{
        ApiError, ApiRequestObject, ApiResult, Compute, GroupVersionKind, ListOptions, RequestContext, ResourceId, Selector,
        UserInfo,
    };
}
