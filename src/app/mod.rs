pub mod integration_use_case;
pub mod ports;
