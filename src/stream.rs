//! Streaming API: emit each channel's outcome as soon as it settles.
//!
//! [`Forge::process`] waits for both channels. A generated image usually
//! lands well before a long rewrite, so interactive callers can use
//! [`Forge::process_stream`] to show the image (or its error) immediately
//! and the body when it arrives. Outcomes are yielded in completion order.

use crate::error::{ChannelError, ForgeError};
use crate::forge::Forge;
use crate::output::{ImageResult, RewriteResult};
use crate::request::RewriteRequest;
use futures::future::{self, BoxFuture};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// The settled outcome of one channel.
#[derive(Debug, Clone)]
pub enum ChannelOutcome {
    Text(Result<RewriteResult, ChannelError>),
    Image(Result<Option<ImageResult>, ChannelError>),
}

/// A boxed stream of channel outcomes; yields exactly two items.
pub type ChannelStream<'a> = Pin<Box<dyn Stream<Item = ChannelOutcome> + Send + 'a>>;

impl Forge {
    /// Validate `request` and stream its two channel outcomes as they settle.
    ///
    /// # Returns
    /// The request id (also recorded on the `process` span) and the stream.
    ///
    /// # Errors
    /// [`ForgeError::Validation`] when the request is malformed.
    ///
    /// # Example
    /// ```rust,no_run
    /// use contentforge::{ChannelOutcome, Forge, ForgeConfig, RewriteRequest};
    /// use futures::StreamExt;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let forge = Forge::new(ForgeConfig::default())?;
    /// let request = RewriteRequest::new("Senior Platform Engineer", "https://jobs.example.org/apply")
    ///     .image_prompt("a minimalist abstract gradient");
    /// let (_id, mut outcomes) = forge.process_stream(&request)?;
    /// while let Some(outcome) = outcomes.next().await {
    ///     match outcome {
    ///         ChannelOutcome::Image(Ok(Some(img))) => println!("image: {}", img.url),
    ///         ChannelOutcome::Text(Ok(text)) => println!("{}", text.body),
    ///         other => eprintln!("{other:?}"),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn process_stream<'a>(
        &'a self,
        request: &RewriteRequest,
    ) -> Result<(Uuid, ChannelStream<'a>), ForgeError> {
        let validated = request.validate(self.config().require_exactly_one_source)?;
        let request_id = Uuid::new_v4();
        let span = info_span!("process", %request_id);

        if let Some(cb) = &self.config().progress_callback {
            cb.on_process_start(request_id);
        }

        let text_req = validated.clone();
        let text: BoxFuture<'a, ChannelOutcome> = async move {
            ChannelOutcome::Text(self.text_channel(&text_req).await.0)
        }
        .instrument(span.clone())
        .boxed();

        let image: BoxFuture<'a, ChannelOutcome> = async move {
            ChannelOutcome::Image(self.image_channel(&validated).await.0)
        }
        .instrument(span)
        .boxed();

        let callback = self.config().progress_callback.clone();
        let outcomes = stream::iter(vec![text, image])
            .buffer_unordered(2)
            .scan((0usize, true, true), move |(settled, text_ok, image_ok), outcome| {
                match &outcome {
                    ChannelOutcome::Text(r) => *text_ok = r.is_ok(),
                    ChannelOutcome::Image(r) => *image_ok = r.is_ok(),
                }
                *settled += 1;
                if *settled == 2 {
                    if let Some(cb) = &callback {
                        cb.on_process_complete(*text_ok, *image_ok);
                    }
                }
                future::ready(Some(outcome))
            });
        Ok((request_id, Box::pin(outcomes)))
    }
}
