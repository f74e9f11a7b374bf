pub mod scenario;
pub mod stress_test;
pub mod venue;
