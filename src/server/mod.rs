mod admin;
mod context;
pub mod dto;
mod live;
pub mod response;
mod router;
mod user;
pub mod validation;

pub use context::{RequestContext, RequestId};
pub use router::{AppState, create_router};
