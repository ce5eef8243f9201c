//! Learning the idle prompt of a channel.

use log::{debug, warn};

use super::Session;
use super::command::current_prompt;
use crate::logic::ExpressionResult;
use crate::model::Node;
use crate::model::internal::{invalidate_current_prompt, prompt_variable};

impl Session {
    /// Learn the prompt of `channel_name` once, before its first command,
    /// unless one is already known. Failure only costs boundary detection,
    /// so it is logged and execution continues.
    pub(super) async fn ensure_prompt(&self, channel_name: &str) {
        if !self.services.config.learn_prompts {
            return;
        }
        {
            let mut state = self.state.lock().await;
            if !state.channels.contains_key(channel_name)
                || !state.prompt_attempts.insert(channel_name.to_string())
                || !current_prompt(&mut state, channel_name).is_empty()
            {
                return;
            }
        }

        let result = self.learn_prompt(channel_name).await;
        if !result.is_success() {
            warn!(
                "Session {} could not learn the prompt of {}: {}",
                self.short_id(),
                channel_name,
                result.message
            );
        }
    }

    /// Probe `channel_name` and store its idle prompt in
    /// `sixsense.session.prompt.<channel>`, replacing any earlier one.
    pub async fn learn_prompt(&self, channel_name: &str) -> ExpressionResult {
        let config = &self.services.config;
        let probes = Node::from(invalidate_current_prompt(
            channel_name,
            config.prompt_probe_minimal_seconds,
            config.prompt_probe_seconds_to_timeout,
        ));

        let result = self.execute_node(&probes).await;
        debug!(
            "Session {} learned prompt {:?} for {}",
            self.short_id(),
            self.variable(&prompt_variable(channel_name)).await,
            channel_name
        );
        result
    }
}
