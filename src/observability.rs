use biometrics::{Collector, Counter};

pub(crate) static CONNECT_ATTEMPTS: Counter = Counter::new("agentdeck.session.connect_attempts");
pub(crate) static CONNECTS_BLOCKED: Counter = Counter::new("agentdeck.session.connects_blocked");
pub(crate) static RECONNECT_RETRIES: Counter = Counter::new("agentdeck.session.reconnect_retries");

pub(crate) static FRAMES_RECEIVED: Counter = Counter::new("agentdeck.session.frames_received");
pub(crate) static FRAME_PARSE_ERRORS: Counter =
    Counter::new("agentdeck.session.frame_parse_errors");
pub(crate) static MESSAGES_SENT: Counter = Counter::new("agentdeck.session.messages_sent");
pub(crate) static MESSAGES_FINALIZED: Counter =
    Counter::new("agentdeck.session.messages_finalized");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("agentdeck.session.stream_errors");
pub(crate) static WATCHDOG_FIRED: Counter = Counter::new("agentdeck.session.watchdog_fired");

pub(crate) static REST_REQUESTS: Counter = Counter::new("agentdeck.client.requests");
pub(crate) static REST_REQUEST_ERRORS: Counter = Counter::new("agentdeck.client.request_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CONNECT_ATTEMPTS);
    collector.register_counter(&CONNECTS_BLOCKED);
    collector.register_counter(&RECONNECT_RETRIES);

    collector.register_counter(&FRAMES_RECEIVED);
    collector.register_counter(&FRAME_PARSE_ERRORS);
    collector.register_counter(&MESSAGES_SENT);
    collector.register_counter(&MESSAGES_FINALIZED);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&WATCHDOG_FIRED);

    collector.register_counter(&REST_REQUESTS);
    collector.register_counter(&REST_REQUEST_ERRORS);
}
