pub mod relay;
pub mod scope;
pub mod touchstone;
pub mod vnwa;

pub use relay::SerialRelay;
pub use scope::ScpiScope;
pub use vnwa::VnwaAnalyzer;
