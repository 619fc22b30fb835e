mod middleware;
mod provision;
mod token;

pub use middleware::{RequireAdmin, RequireUser};
pub use provision::{TokenOwner, create_admin_token, create_user_with_token, issue_token};
pub use token::{RawToken, TokenHasher};
