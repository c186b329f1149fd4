pub mod exchange_host;
pub mod fallback;
pub mod util;

pub use exchange_host::ExchangeHostProvider;
