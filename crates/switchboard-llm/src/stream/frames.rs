use eventsource_stream::Eventsource;
use futures_util::{StreamExt, stream};

use super::{FrameDecoder, VendorEvent, VendorEventStream};
use crate::error::LlmError;

/// Decode a server-sent-events response body
pub fn sse_events<D: FrameDecoder>(response: reqwest::Response, mut decoder: D) -> VendorEventStream {
    let frames = response.bytes_stream().eventsource().map(move |frame| match frame {
        Ok(event) => {
            let data = event.data.trim();
            if data.is_empty() || data == "[DONE]" {
                Ok(Vec::new())
            } else {
                decoder.decode(data)
            }
        }
        Err(e) => Err(LlmError::upstream(format!("vendor stream failed: {e}"))),
    });

    flatten(frames)
}

/// Decode a newline-delimited JSON response body
pub fn ndjson_events<D: FrameDecoder>(response: reqwest::Response, mut decoder: D) -> VendorEventStream {
    let bytes = Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| LlmError::upstream(format!("vendor stream failed: {e}")))),
    );

    let lines = stream::unfold((bytes, Vec::<u8>::new(), false), |(mut bytes, mut buffer, mut done)| async move {
        loop {
            if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                return Some((Ok(line), (bytes, buffer, done)));
            }

            if done {
                if buffer.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut buffer);
                return Some((Ok(line), (bytes, buffer, done)));
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Some((Err(e), (bytes, Vec::new(), true))),
                None => done = true,
            }
        }
    });

    let frames = lines.map(move |line| {
        let line = line?;
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            Ok(Vec::new())
        } else {
            decoder.decode(text)
        }
    });

    flatten(frames)
}

fn flatten(
    frames: impl futures_util::Stream<Item = Result<Vec<VendorEvent>, LlmError>> + Send + 'static,
) -> VendorEventStream {
    Box::pin(frames.flat_map(|frame| {
        let items: Vec<Result<VendorEvent, LlmError>> = match frame {
            Ok(events) => events.into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(items)
    }))
}
