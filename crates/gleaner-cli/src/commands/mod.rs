//! Command implementations.

pub mod combos;
pub mod run;
pub mod validate;

pub use self::combos::execute_combos;
pub use self::run::execute_run;
pub use self::validate::execute_validate;
