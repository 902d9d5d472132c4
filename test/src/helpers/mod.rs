pub mod event_log;

pub use counting_message::CountingMessage;
pub use event_log::EventLog;
pub use test_mesh::{init_logging, test_connection_config, TestMesh, SETTLE_ROUNDS, STEP};
