use std::collections::VecDeque;

use courier_proto::{Message, MessageId};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A user's two-stage mailbox. Messages wait in the unread queue until the
/// owner pops them (or a live session saw them on arrival), then sit in the
/// read archive until explicitly deleted. Both stages keep arrival order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Mailbox {
    unread: VecDeque<Message>,
    read: Vec<Message>,
}

impl Mailbox {
    pub fn unread_count(&self) -> usize {
        self.unread.len()
    }

    pub fn read_count(&self) -> usize {
        self.read.len()
    }

    /// Queue a message the owner has not seen yet.
    pub fn push_unread(&mut self, message: Message) {
        self.unread.push_back(message);
    }

    /// File a message straight into the archive, skipping the unread queue.
    /// Used when delivery already happened over a live session.
    pub fn push_read(&mut self, message: Message) {
        self.read.push(message);
    }

    /// Move up to `count` of the oldest unread messages into the archive
    /// and return them. A count of -1 drains the whole queue; asking for
    /// more than exist drains what there is.
    pub fn pop_unread(&mut self, count: i32) -> Result<Vec<Message>, StoreError> {
        let take = match count {
            -1 => self.unread.len(),
            n if n < 0 => return Err(StoreError::InvalidCount(count)),
            n => (n as usize).min(self.unread.len()),
        };
        let popped: Vec<Message> = self.unread.drain(..take).collect();
        self.read.extend(popped.iter().cloned());
        Ok(popped)
    }

    /// Page through the archive from the newest end: skip the `offset`
    /// newest messages, then take the `count` next-newest before that
    /// point. A count of -1 takes everything older than the offset. The
    /// returned page itself is in arrival order, oldest first.
    pub fn read_page(&self, offset: u32, count: i32) -> Result<Vec<Message>, StoreError> {
        let end = self.read.len().saturating_sub(offset as usize);
        let start = match count {
            -1 => 0,
            n if n < 0 => return Err(StoreError::InvalidCount(count)),
            n => end.saturating_sub(n as usize),
        };
        Ok(self.read[start..end].to_vec())
    }

    /// Remove archived messages by id, at most one per id. Ids with no
    /// match and ids still in the unread queue are ignored.
    pub fn delete_read(&mut self, ids: &[MessageId]) {
        for id in ids {
            if let Some(index) = self.read.iter().position(|m| m.id == *id) {
                self.read.remove(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: MessageId, content: &str) -> Message {
        Message {
            id,
            sender: 0,
            content: content.to_string(),
        }
    }

    fn stocked() -> Mailbox {
        let mut mailbox = Mailbox::default();
        for id in 0..5 {
            mailbox.push_unread(msg(id, &format!("m{id}")));
        }
        mailbox
    }

    #[test]
    fn pop_moves_oldest_to_archive_in_order() {
        let mut mailbox = stocked();
        let popped = mailbox.pop_unread(2).unwrap();
        assert_eq!(popped.iter().map(|m| m.id).collect::<Vec<_>>(), [0, 1]);
        assert_eq!(mailbox.unread_count(), 3);
        assert_eq!(mailbox.read_count(), 2);

        // The rest drain behind them, keeping arrival order.
        mailbox.pop_unread(-1).unwrap();
        assert_eq!(mailbox.unread_count(), 0);
        let page = mailbox.read_page(0, -1).unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn pop_more_than_available_drains() {
        let mut mailbox = stocked();
        let popped = mailbox.pop_unread(99).unwrap();
        assert_eq!(popped.len(), 5);
        assert_eq!(mailbox.unread_count(), 0);
    }

    #[test]
    fn pop_zero_is_a_noop() {
        let mut mailbox = stocked();
        assert!(mailbox.pop_unread(0).unwrap().is_empty());
        assert_eq!(mailbox.unread_count(), 5);
        assert_eq!(mailbox.read_count(), 0);
    }

    #[test]
    fn pop_below_minus_one_is_rejected() {
        let mut mailbox = stocked();
        assert_eq!(mailbox.pop_unread(-2), Err(StoreError::InvalidCount(-2)));
        assert_eq!(mailbox.unread_count(), 5);
    }

    #[test]
    fn page_counts_back_from_the_newest() {
        let mut mailbox = stocked();
        mailbox.pop_unread(-1).unwrap();

        // Newest two.
        let page = mailbox.read_page(0, 2).unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), [3, 4]);

        // Skip the newest two, take the two before them.
        let page = mailbox.read_page(2, 2).unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2]);

        // Everything older than the newest one.
        let page = mailbox.read_page(1, -1).unwrap();
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), [0, 1, 2, 3]);
    }

    #[test]
    fn page_clamps_at_both_ends() {
        let mut mailbox = stocked();
        mailbox.pop_unread(-1).unwrap();

        // Asking for more than exist returns what there is.
        assert_eq!(mailbox.read_page(0, 99).unwrap().len(), 5);
        // An offset past the archive is an empty page, not a panic.
        assert!(mailbox.read_page(99, 2).unwrap().is_empty());
        assert!(mailbox.read_page(99, -1).unwrap().is_empty());
    }

    #[test]
    fn page_below_minus_one_is_rejected() {
        let mailbox = stocked();
        assert_eq!(mailbox.read_page(0, -3), Err(StoreError::InvalidCount(-3)));
    }

    #[test]
    fn delete_removes_one_match_per_id() {
        let mut mailbox = Mailbox::default();
        mailbox.push_read(msg(1, "a"));
        mailbox.push_read(msg(2, "b"));
        mailbox.push_read(msg(3, "c"));

        mailbox.delete_read(&[2, 2, 99]);
        let left = mailbox.read_page(0, -1).unwrap();
        assert_eq!(left.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 3]);
    }

    #[test]
    fn delete_ignores_the_unread_queue() {
        let mut mailbox = stocked();
        mailbox.delete_read(&[0, 1, 2, 3, 4]);
        assert_eq!(mailbox.unread_count(), 5);
    }

    #[test]
    fn delivered_messages_skip_the_queue() {
        let mut mailbox = Mailbox::default();
        mailbox.push_read(msg(7, "live"));
        assert_eq!(mailbox.unread_count(), 0);
        assert_eq!(mailbox.read_count(), 1);
    }
}
