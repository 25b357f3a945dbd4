//! IRC sink: posts rendered content to a channel.

use async_trait::async_trait;

use crate::channels::irc::{session_args, target_from_args, IrcChannel};
use crate::channels::{Arg, Args, Channel, ChannelError, Info, SinkChannel};
use crate::event::Event;

#[async_trait]
impl SinkChannel for IrcChannel {
    fn sink_args(&self) -> Vec<Arg> {
        session_args()
    }

    fn validate_sink_args(&self, args: &Args) -> Result<(), ChannelError> {
        target_from_args(args).map(|_| ())
    }

    fn sink_info(&self, args: &Args) -> Vec<Info> {
        target_from_args(args)
            .map(|target| Info {
                name: "connection_key".into(),
                description: "Routes with the same key share one IRC session.".into(),
                value: target.key(),
            })
            .into_iter()
            .collect()
    }

    async fn start_sink(&self, _settings: &Args) -> Result<(), ChannelError> {
        tracing::debug!(channel = self.name(), "IRC sink ready; sessions open on first delivery");
        Ok(())
    }

    async fn drain(&self, args: &Args, event: &Event, content: &str) -> Result<(), ChannelError> {
        let target = target_from_args(args)?;
        let session = self.session(&target).await?;
        session.privmsg(content)?;
        tracing::debug!(
            event_id = %event.id,
            connection_key = %target.key(),
            connection_id = %session.id(),
            "IRC delivery complete"
        );
        Ok(())
    }
}
