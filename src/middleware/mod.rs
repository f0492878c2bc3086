pub mod page_guard;
pub mod rate_limit;

pub use page_guard::page_guard;
pub use rate_limit::RateLimiter;
