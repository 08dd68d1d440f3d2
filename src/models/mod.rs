mod checkout;
mod enrollment;
mod payment;
mod profile;
mod storage;
mod subscription;

pub use checkout::*;
pub use enrollment::*;
pub use payment::*;
pub use profile::*;
pub use storage::*;
pub use subscription::*;
