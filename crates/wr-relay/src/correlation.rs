//! Correlation tokens and the reply registry.
//!
//! Every artifact posted for captioning gets a fresh [`CorrelationToken`],
//! rendered as `#<n>`. The relay registers the token's rendering in the
//! [`CorrelationRegistry`] and waits on the returned [`PendingReply`]. The
//! inbound dispatcher offers each chat message to the registry, which hands it
//! to at most one waiter and forgets the entry.
//!
//! ```text
//!   relay task                      registry                 inbound task
//!   ──────────                      ────────                 ────────────
//!   register(#3) ───────────────►  "#3" => tx
//!   pending.await ...                                        "#3 sunset" arrives
//!                                   remove("#3") ◄────────── resolve(msg)
//!   ◄──────────── tx.send(caption)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use wr_core::{ChannelId, IncomingMessage, UserId};

/// Process-unique identifier tying a moderation post to its caption reply.
///
/// # Examples
///
/// ```
/// use wr_relay::CorrelationToken;
///
/// assert_eq!(CorrelationToken::new(0).to_string(), "#0");
/// assert_eq!(CorrelationToken::new(17).to_string(), "#17");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationToken(u64);

impl CorrelationToken {
    /// Creates a token with the given sequence number.
    #[inline]
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// The sequence number.
    #[inline]
    #[must_use]
    pub const fn seq(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out strictly increasing tokens, starting at `#0`.
#[derive(Debug, Default)]
pub struct TokenAllocator {
    next: AtomicU64,
}

impl TokenAllocator {
    /// Creates an allocator whose first token is `#0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next token. Tokens are never reused.
    pub fn allocate(&self) -> CorrelationToken {
        CorrelationToken(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Returns the token rendering a message starts with, if any.
///
/// The rendering is `#` followed by the full run of ASCII digits, so `#12 x`
/// yields `#12` and can never be mistaken for `#1`. Digits are compared as
/// text: `#007` is its own token, not `#7`.
#[must_use]
pub fn leading_token(text: &str) -> Option<&str> {
    let digits = text.strip_prefix('#')?;
    let len = digits.bytes().take_while(u8::is_ascii_digit).count();
    (len > 0).then(|| &text[..=len])
}

/// A caption delivered to a waiting relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    /// Reply text with the token and the whitespace around it removed.
    pub text: String,

    /// The message that carried the caption.
    pub message: IncomingMessage,
}

/// Map from token rendering to the waiter for that token.
#[derive(Debug, Default)]
pub struct CorrelationRegistry {
    pending: Mutex<FxHashMap<String, oneshot::Sender<Caption>>>,
}

impl CorrelationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in replies to `token`.
    ///
    /// Dropping the returned [`PendingReply`] withdraws the registration.
    #[must_use]
    pub fn register(self: &Arc<Self>, token: CorrelationToken) -> PendingReply {
        let key = token.to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(key.clone(), tx);
        PendingReply {
            token,
            key,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Offers a message to the waiting relays.
    ///
    /// The message resolves a waiter only if it comes from `principal`, was
    /// posted in `moderation`, and starts with a registered token. The entry
    /// is removed on resolution, so later replies with the same token are
    /// ignored. Returns the token that was resolved.
    pub fn resolve(
        &self,
        message: &IncomingMessage,
        principal: &UserId,
        moderation: &ChannelId,
    ) -> Option<CorrelationToken> {
        if message.author_is_bot || &message.author != principal || &message.channel != moderation
        {
            return None;
        }

        let key = leading_token(&message.text)?;
        let tx = self.pending.lock().remove(key)?;

        let caption = Caption {
            text: message.text[key.len()..].trim().to_owned(),
            message: message.clone(),
        };
        // The sequence number is re-derived from the key we just matched.
        let token = key[1..].parse().ok().map(CorrelationToken::new);

        // A waiter that already gave up (timeout) has dropped its receiver.
        tx.send(caption).ok().and(token)
    }

    /// Number of relays currently waiting for a caption.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` if `token` is still waiting for a caption.
    #[must_use]
    pub fn is_pending(&self, token: CorrelationToken) -> bool {
        self.pending.lock().contains_key(&token.to_string())
    }

    fn withdraw(&self, key: &str) {
        self.pending.lock().remove(key);
    }
}

/// A registered wait for one token's caption.
#[derive(Debug)]
pub struct PendingReply {
    token: CorrelationToken,
    key: String,
    rx: oneshot::Receiver<Caption>,
    registry: Arc<CorrelationRegistry>,
}

impl PendingReply {
    /// The token this wait belongs to.
    #[inline]
    #[must_use]
    pub const fn token(&self) -> CorrelationToken {
        self.token
    }

    /// Waits for the caption.
    ///
    /// Returns `None` if the registry was torn down while waiting.
    pub async fn recv(&mut self) -> Option<Caption> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.registry.withdraw(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRINCIPAL: &str = "42";
    const MODERATION: &str = "100";

    fn registry() -> Arc<CorrelationRegistry> {
        Arc::new(CorrelationRegistry::new())
    }

    fn offer(registry: &CorrelationRegistry, msg: &IncomingMessage) -> Option<CorrelationToken> {
        registry.resolve(msg, &UserId::new(PRINCIPAL), &ChannelId::new(MODERATION))
    }

    fn reply(text: &str) -> IncomingMessage {
        IncomingMessage::new(PRINCIPAL, MODERATION, text)
    }

    #[test]
    fn test_allocator_is_monotonic_from_zero() {
        let tokens = TokenAllocator::new();
        assert_eq!(tokens.allocate(), CorrelationToken::new(0));
        assert_eq!(tokens.allocate(), CorrelationToken::new(1));
        assert!(tokens.allocate() > CorrelationToken::new(1));
    }

    #[test]
    fn test_leading_token() {
        assert_eq!(leading_token("#0 sunset"), Some("#0"));
        assert_eq!(leading_token("#12caption"), Some("#12"));
        assert_eq!(leading_token("#007"), Some("#007"));
        assert_eq!(leading_token("#"), None);
        assert_eq!(leading_token("# 1"), None);
        assert_eq!(leading_token("0 sunset"), None);
        assert_eq!(leading_token(" #0 sunset"), None);
        assert_eq!(leading_token(""), None);
    }

    #[tokio::test]
    async fn test_matching_reply_resolves_with_stripped_caption() {
        let registry = registry();
        let mut pending = registry.register(CorrelationToken::new(0));

        assert_eq!(offer(&registry, &reply("#0 sunset over the bay")), Some(CorrelationToken::new(0)));

        let caption = pending.recv().await.unwrap();
        assert_eq!(caption.text, "sunset over the bay");
        assert_eq!(caption.message.author.as_str(), PRINCIPAL);
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_first_reply_wins() {
        let registry = registry();
        let mut pending = registry.register(CorrelationToken::new(3));

        assert!(offer(&registry, &reply("#3 first")).is_some());
        assert!(offer(&registry, &reply("#3 second")).is_none());

        assert_eq!(pending.recv().await.unwrap().text, "first");
    }

    #[test]
    fn test_unauthorized_or_misplaced_replies_are_ignored() {
        let registry = registry();
        let _pending = registry.register(CorrelationToken::new(0));

        let stranger = IncomingMessage::new("99", MODERATION, "#0 not yours");
        assert!(offer(&registry, &stranger).is_none());

        let elsewhere = IncomingMessage::new(PRINCIPAL, "555", "#0 wrong room");
        assert!(offer(&registry, &elsewhere).is_none());

        let mut bot = reply("#0 echo");
        bot.author_is_bot = true;
        assert!(offer(&registry, &bot).is_none());

        assert!(registry.is_pending(CorrelationToken::new(0)));
    }

    #[test]
    fn test_similar_tokens_never_match() {
        let registry = registry();
        let _one = registry.register(CorrelationToken::new(1));

        for text in ["#12 longer", "#01 padded", "# 1 spaced", "1 bare", "caption #1", "#10"] {
            assert!(offer(&registry, &reply(text)).is_none(), "{text} must not resolve #1");
        }
        assert!(registry.is_pending(CorrelationToken::new(1)));
    }

    #[tokio::test]
    async fn test_interleaved_replies_resolve_only_their_own_token() {
        let registry = registry();
        let mut one = registry.register(CorrelationToken::new(1));
        let mut twelve = registry.register(CorrelationToken::new(12));

        assert_eq!(offer(&registry, &reply("#12 for twelve")), Some(CorrelationToken::new(12)));
        assert!(registry.is_pending(CorrelationToken::new(1)));
        assert_eq!(offer(&registry, &reply("#1 for one")), Some(CorrelationToken::new(1)));

        assert_eq!(one.recv().await.unwrap().text, "for one");
        assert_eq!(twelve.recv().await.unwrap().text, "for twelve");
    }

    #[test]
    fn test_dropping_pending_withdraws_registration() {
        let registry = registry();
        let pending = registry.register(CorrelationToken::new(5));
        assert_eq!(registry.pending_count(), 1);

        drop(pending);

        assert_eq!(registry.pending_count(), 0);
        assert!(offer(&registry, &reply("#5 too late")).is_none());
    }

    #[test]
    fn test_caption_without_separator() {
        let registry = registry();
        let mut pending = registry.register(CorrelationToken::new(0));
        assert!(offer(&registry, &reply("#0")).is_some());
        let caption = pending.rx.try_recv().unwrap();
        assert_eq!(caption.text, "");
    }
}
