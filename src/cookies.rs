//! Cookies: [`Cookie`], [`CookieJar`], and file-backed persistence.

mod cookie;
mod jar;
mod store;

pub use cookie::{Cookie, CookieSource, SameSite};
pub use jar::CookieJar;
pub use store::{load_jar, save_jar};
