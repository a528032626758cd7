use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::task::TaskKey;
use crate::transcript::{Message, Transcript};

/// One chat session: a dispatcher with its throttle plus the transcript.
pub struct ChatSession {
    dispatcher: Dispatcher,
    transcript: Transcript,
}

impl ChatSession {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            transcript: Transcript::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Record the user's prompt, dispatch it and record the reply.
    ///
    /// On failure only the user message is kept; no assistant entry is added.
    pub async fn submit(&mut self, prompt: &str, task: TaskKey) -> Result<String, DispatchError> {
        self.transcript.append(Message::user(prompt));
        let reply = self.dispatcher.dispatch(prompt, task).await?;
        self.transcript.append(Message::assistant(reply.clone()));
        Ok(reply)
    }
}
