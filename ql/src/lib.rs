pub mod learn;
pub mod ml_model;
pub mod prelude;
mod test_environment;
pub mod util;
