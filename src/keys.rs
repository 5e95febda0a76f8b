//! Store key layout
//!
//! Every piece of queue state lives in the backing store under a fixed key
//! derived from the queue, connection and consumer names. The templates
//! below are a wire-level contract: external processes (cleaners, stats
//! collectors, monitoring) locate queue state by these exact strings, so
//! they must never change.

/// Set of connection names
pub const CONNECTIONS_KEY: &str = "rmq::connections";

/// Set of all open queues
pub const QUEUES_KEY: &str = "rmq::queues";

/// Heartbeat key of a connection; expires after the connection died
pub const CONNECTION_HEARTBEAT_TEMPLATE: &str = "rmq::connection::{connection}::heartbeat";

/// Set of queues consumers of a connection are consuming
pub const CONNECTION_QUEUES_TEMPLATE: &str = "rmq::connection::{connection}::queues";

/// Set of all consumers from a connection consuming from a queue
pub const CONNECTION_QUEUE_CONSUMERS_TEMPLATE: &str =
    "rmq::connection::{connection}::queue::[{queue}]::consumers";

/// List of deliveries consumers of a connection are currently consuming
pub const CONNECTION_QUEUE_UNACKED_TEMPLATE: &str =
    "rmq::connection::{connection}::queue::[{queue}]::unacked";

/// List of deliveries in a queue (right is first and oldest, left is last and youngest)
pub const QUEUE_READY_TEMPLATE: &str = "rmq::queue::[{queue}]::ready";

/// List of rejected deliveries from a queue
pub const QUEUE_REJECTED_TEMPLATE: &str = "rmq::queue::[{queue}]::rejected";

const PH_CONNECTION: &str = "{connection}";
const PH_QUEUE: &str = "{queue}";

pub fn connection_heartbeat_key(connection: &str) -> String {
    CONNECTION_HEARTBEAT_TEMPLATE.replacen(PH_CONNECTION, connection, 1)
}

pub fn connection_queues_key(connection: &str) -> String {
    CONNECTION_QUEUES_TEMPLATE.replacen(PH_CONNECTION, connection, 1)
}

pub fn connection_queue_consumers_key(connection: &str, queue: &str) -> String {
    CONNECTION_QUEUE_CONSUMERS_TEMPLATE
        .replacen(PH_CONNECTION, connection, 1)
        .replacen(PH_QUEUE, queue, 1)
}

pub fn connection_queue_unacked_key(connection: &str, queue: &str) -> String {
    CONNECTION_QUEUE_UNACKED_TEMPLATE
        .replacen(PH_CONNECTION, connection, 1)
        .replacen(PH_QUEUE, queue, 1)
}

pub fn queue_ready_key(queue: &str) -> String {
    QUEUE_READY_TEMPLATE.replacen(PH_QUEUE, queue, 1)
}

pub fn queue_rejected_key(queue: &str) -> String {
    QUEUE_REJECTED_TEMPLATE.replacen(PH_QUEUE, queue, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_templates() {
        // These strings are depended upon by external processes.
        assert_eq!(CONNECTIONS_KEY, "rmq::connections");
        assert_eq!(QUEUES_KEY, "rmq::queues");
        assert_eq!(
            connection_heartbeat_key("conn1"),
            "rmq::connection::conn1::heartbeat"
        );
        assert_eq!(
            connection_queues_key("conn1"),
            "rmq::connection::conn1::queues"
        );
        assert_eq!(
            connection_queue_consumers_key("conn1", "things"),
            "rmq::connection::conn1::queue::[things]::consumers"
        );
        assert_eq!(
            connection_queue_unacked_key("conn1", "things"),
            "rmq::connection::conn1::queue::[things]::unacked"
        );
        assert_eq!(queue_ready_key("things"), "rmq::queue::[things]::ready");
        assert_eq!(
            queue_rejected_key("things"),
            "rmq::queue::[things]::rejected"
        );
    }

    #[test]
    fn test_substitution_is_single_pass() {
        // A queue name containing a placeholder must not be expanded again.
        assert_eq!(
            queue_ready_key("{queue}"),
            "rmq::queue::[{queue}]::ready"
        );
    }
}
