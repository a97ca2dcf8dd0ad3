pub mod geo;
pub mod prober;
pub mod transport;
pub mod validator;
