pub mod session;
pub mod token_gate;
