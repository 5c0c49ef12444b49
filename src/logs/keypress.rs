//! Waiting for key presses from the terminal.
//!
//! Keys are read one at a time from a stream of terminal events. A wait only
//! returns on a key it is looking for; every other key is swallowed. Ctrl+C
//! and Ctrl+Z always end the wait with [`Cancelled`].

use std::io;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::{Stream, StreamExt};

/// The user asked to quit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled")]
pub struct Cancelled;

/// What a wait is looking for.
pub enum KeyMatcher {
    /// A specific key, regardless of modifiers.
    Code(KeyCode),
    /// Any key the predicate accepts.
    Predicate(Box<dyn Fn(&KeyEvent) -> bool + Send>),
}

impl KeyMatcher {
    pub fn matches(&self, key: &KeyEvent) -> bool {
        match self {
            Self::Code(code) => key.code == *code,
            Self::Predicate(accept) => accept(key),
        }
    }
}

impl From<KeyCode> for KeyMatcher {
    fn from(code: KeyCode) -> Self {
        Self::Code(code)
    }
}

/// Ctrl+C or Ctrl+Z.
pub fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c' | 'z' | 'C' | 'Z'))
}

/// Reads key presses from a terminal event stream.
pub struct KeypressReader<S> {
    events: S,
}

impl<S> KeypressReader<S>
where
    S: Stream<Item = io::Result<Event>> + Unpin,
{
    pub fn new(events: S) -> Self {
        Self { events }
    }

    /// The next key press, or [`Cancelled`] on an interrupt.
    ///
    /// Releases, repeats and non-key events are skipped. The end of the input
    /// stream is treated as an interrupt, since no further key can arrive.
    pub async fn next_key(&mut self) -> Result<KeyEvent, Cancelled> {
        loop {
            match self.events.next().await {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if is_interrupt(&key) {
                        tracing::debug!("interrupt key pressed");
                        return Err(Cancelled);
                    }
                    return Ok(key);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "failed to read terminal event");
                    return Err(Cancelled);
                }
                None => {
                    tracing::debug!("terminal input closed");
                    return Err(Cancelled);
                }
            }
        }
    }

    /// Wait until a key satisfies `matcher`.
    pub async fn wait_for_key(&mut self, matcher: &KeyMatcher) -> Result<(), Cancelled> {
        self.wait_for_any(&[matcher]).await.map(|_| ())
    }

    /// Wait until a key satisfies one of `matchers`, returning the index of
    /// the first one that accepted it.
    ///
    /// Several waits share this one reader by passing their matchers together:
    /// each key is offered to every matcher in turn.
    pub async fn wait_for_any(&mut self, matchers: &[&KeyMatcher]) -> Result<usize, Cancelled> {
        loop {
            let key = self.next_key().await?;
            if let Some(index) = matchers.iter().position(|m| m.matches(&key)) {
                return Ok(index);
            }
            tracing::trace!(?key.code, "ignored key");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::time::Duration;

    use futures::stream;

    pub(crate) fn press(code: KeyCode) -> io::Result<Event> {
        Ok(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    pub(crate) fn ctrl(c: char) -> io::Result<Event> {
        Ok(Event::Key(KeyEvent::new(
            KeyCode::Char(c),
            KeyModifiers::CONTROL,
        )))
    }

    #[tokio::test]
    async fn resolves_on_matching_key() {
        let mut reader = KeypressReader::new(stream::iter(vec![press(KeyCode::Up)]));
        assert_eq!(reader.wait_for_key(&KeyCode::Up.into()).await, Ok(()));
    }

    #[tokio::test]
    async fn skips_unrelated_keys() {
        let events = stream::iter(vec![
            press(KeyCode::Char('a')),
            press(KeyCode::Down),
            press(KeyCode::Up),
        ]);
        let mut reader = KeypressReader::new(events);

        assert_eq!(reader.wait_for_key(&KeyCode::Up.into()).await, Ok(()));
    }

    #[tokio::test]
    async fn keeps_waiting_after_unrelated_key() {
        let events = stream::iter(vec![press(KeyCode::Char('a'))]).chain(stream::pending());
        let mut reader = KeypressReader::new(events);

        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            reader.wait_for_key(&KeyCode::Up.into()),
        )
        .await;

        assert!(waited.is_err(), "wait should still be pending");
    }

    #[tokio::test]
    async fn ctrl_c_and_ctrl_z_cancel() {
        for c in ['c', 'z'] {
            let mut reader = KeypressReader::new(stream::iter(vec![ctrl(c)]));
            assert_eq!(reader.wait_for_key(&KeyCode::Up.into()).await, Err(Cancelled));
        }
    }

    #[tokio::test]
    async fn plain_c_is_not_an_interrupt() {
        let mut reader = KeypressReader::new(stream::iter(vec![press(KeyCode::Char('c'))]));
        assert_eq!(
            reader.wait_for_key(&KeyCode::Char('c').into()).await,
            Ok(())
        );
    }

    #[tokio::test]
    async fn predicate_matchers() {
        let events = stream::iter(vec![press(KeyCode::Char('x')), press(KeyCode::Char('7'))]);
        let mut reader = KeypressReader::new(events);
        let digit = KeyMatcher::Predicate(Box::new(|key| {
            matches!(key.code, KeyCode::Char(c) if c.is_ascii_digit())
        }));

        assert_eq!(reader.wait_for_key(&digit).await, Ok(()));
    }

    #[tokio::test]
    async fn shared_reader_reports_which_wait_matched() {
        let events = stream::iter(vec![press(KeyCode::Char('c')), press(KeyCode::Enter)]);
        let mut reader = KeypressReader::new(events);
        let copy = KeyMatcher::from(KeyCode::Char('c'));
        let back = KeyMatcher::from(KeyCode::Enter);

        assert_eq!(reader.wait_for_any(&[&copy, &back]).await, Ok(0));
        assert_eq!(reader.wait_for_any(&[&copy, &back]).await, Ok(1));
    }

    #[tokio::test]
    async fn end_of_input_cancels() {
        let mut reader = KeypressReader::new(stream::iter(Vec::<io::Result<Event>>::new()));
        assert_eq!(reader.next_key().await, Err(Cancelled));
    }
}
