pub mod ports;
pub mod transport;

pub use ports::{available_port_names, print_available_ports};
pub use transport::{CounterLink, SerialLink, SerialTransport};
