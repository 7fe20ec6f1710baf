//! Server-sent event framing for streamed generation responses.

use std::fmt;

use eventsource_stream::{EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use parley_core::{Fragment, FragmentStream, ParleyError, Result};

/// Turns a response body into a fragment stream.
///
/// The body is framed with `eventsource-stream`; `parse` maps each event's
/// `data` to a fragment. The first error, from the transport, the framing or
/// `parse`, is yielded and ends the stream.
pub fn fragment_stream<S, B, E, P>(body: S, parse: P) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
    P: Fn(&str) -> Result<Fragment> + Send + Sync + 'static,
{
    Box::pin(async_stream::stream! {
        let mut events = Box::pin(body.eventsource());

        while let Some(event) = events.next().await {
            let parsed = match event {
                Ok(event) => parse(&event.data),
                Err(err) => Err(stream_error(err)),
            };
            let failed = parsed.is_err();
            yield parsed;
            if failed {
                return;
            }
        }
    })
}

fn stream_error<E: fmt::Display>(err: EventStreamError<E>) -> ParleyError {
    match err {
        EventStreamError::Transport(err) => ParleyError::StreamInterrupted(err.to_string()),
        other => ParleyError::StreamInterrupted(format!("Malformed event stream: {other}")),
    }
}
