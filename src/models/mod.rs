//! Data models

mod actor;
mod assignment;
mod audit;
mod device;
mod license;
mod product;
mod rbac;
mod user;

pub use actor::*;
pub use assignment::*;
pub use audit::*;
pub use device::*;
pub use license::*;
pub use product::*;
pub use rbac::*;
pub use user::*;
