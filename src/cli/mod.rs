pub mod lookup;
pub mod serve;
pub mod setup;
