use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("parley.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("parley.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("parley.client.request_duration_seconds");

pub(crate) static STREAM_EVENTS: Counter = Counter::new("parley.stream.events");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("parley.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("parley.stream.bytes");
pub(crate) static STREAM_DURATION: Moments = Moments::new("parley.stream.duration_seconds");

pub(crate) static SESSION_TOKENS: Counter = Counter::new("parley.session.tokens");
pub(crate) static SESSION_EXCHANGES: Counter = Counter::new("parley.session.exchanges");
pub(crate) static ROUNDS_STARTED: Counter = Counter::new("parley.driver.rounds_started");
pub(crate) static ROUND_FAULTS: Counter = Counter::new("parley.driver.round_faults");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_EVENTS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&SESSION_TOKENS);
    collector.register_counter(&SESSION_EXCHANGES);
    collector.register_counter(&ROUNDS_STARTED);
    collector.register_counter(&ROUND_FAULTS);
}
