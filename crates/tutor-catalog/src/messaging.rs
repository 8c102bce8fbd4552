//! Conversations and messages between a student and a professor

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use tutor_core::directory;
use tutor_core::{
    Conversation, ConversationId, MarketError, MemoryStore, Message, MessageId, Professor,
    ProfessorId, Reader, Result, Student, StoreError, UserId,
};

/// A conversation with its latest message and the caller's unread count
#[derive(Clone, Debug, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    pub unread: usize,
}

pub struct MessagingService {
    store: Arc<MemoryStore>,
}

impl MessagingService {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// The student's conversation with `professor_id`, created on first use
    pub fn start_conversation(&self, actor: UserId, professor_id: ProfessorId) -> Result<Conversation> {
        let mut tx = self.store.begin();
        let student = directory::require_student(&tx, actor)?;
        if tx.get::<Professor>(professor_id)?.is_none() {
            return Err(MarketError::not_found("Professor not found"));
        }
        if let Some(existing) = find_pair(&tx, &student, professor_id)? {
            return Ok(existing);
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId::new(),
            student_id: student.id,
            professor_id,
            created_at: now,
            updated_at: now,
        };
        tx.put(conversation.clone());

        match tx.commit() {
            Ok(()) => {
                tracing::info!(
                    conversation_id = %conversation.id,
                    student_id = %student.id,
                    professor_id = %professor_id,
                    "Started conversation"
                );
                Ok(conversation)
            }
            // Lost a race with a concurrent start for the same pair
            Err(StoreError::UniqueViolation { .. }) => find_pair(&*self.store, &student, professor_id)?
                .ok_or_else(|| MarketError::conflict("Conversation could not be started")),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn send_message(
        &self,
        actor: UserId,
        conversation_id: ConversationId,
        body: &str,
    ) -> Result<Message> {
        let body = body.trim();
        if body.is_empty() {
            return Err(MarketError::validation("Message cannot be empty"));
        }

        let mut tx = self.store.begin();
        let mut conversation = tx
            .lock::<Conversation>(conversation_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Conversation not found"))?;
        require_participant(&tx, &conversation, actor)?;

        let message = Message {
            id: MessageId::new(),
            conversation_id,
            sender_id: actor,
            body: body.to_string(),
            created_at: Utc::now(),
            read_at: None,
        };
        conversation.updated_at = message.created_at;
        tx.put(message.clone());
        tx.put(conversation);
        tx.commit()?;

        tracing::debug!(message_id = %message.id, conversation_id = %conversation_id, "Message sent");
        Ok(message)
    }

    /// The caller's conversations, most recent activity first
    pub fn list_conversations(&self, actor: UserId) -> Result<Vec<ConversationSummary>> {
        let student = directory::student_for_user(&*self.store, actor)?.map(|s| s.id);
        let professor = directory::professor_for_user(&*self.store, actor)?.map(|p| p.id);

        let mut conversations = self.store.find(|c: &Conversation| {
            student == Some(c.student_id) || professor == Some(c.professor_id)
        })?;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        conversations
            .into_iter()
            .map(|conversation| {
                let messages = messages_of(&*self.store, conversation.id)?;
                let unread = messages
                    .iter()
                    .filter(|m| m.sender_id != actor && m.read_at.is_none())
                    .count();
                Ok(ConversationSummary {
                    last_message: messages.into_iter().last(),
                    unread,
                    conversation,
                })
            })
            .collect()
    }

    /// Messages oldest first; the other party's unread messages become read
    pub async fn list_messages(&self, actor: UserId, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let mut tx = self.store.begin();
        let conversation = tx
            .lock::<Conversation>(conversation_id)
            .await?
            .ok_or_else(|| MarketError::not_found("Conversation not found"))?;
        require_participant(&tx, &conversation, actor)?;

        let now = Utc::now();
        let mut messages = messages_of(&tx, conversation_id)?;
        for message in &mut messages {
            if message.sender_id != actor && message.read_at.is_none() {
                message.read_at = Some(now);
                tx.put(message.clone());
            }
        }
        tx.commit()?;
        Ok(messages)
    }
}

fn find_pair(
    reader: &impl Reader,
    student: &Student,
    professor_id: ProfessorId,
) -> Result<Option<Conversation>> {
    Ok(reader.find_one(|c: &Conversation| {
        c.student_id == student.id && c.professor_id == professor_id
    })?)
}

fn require_participant(reader: &impl Reader, conversation: &Conversation, actor: UserId) -> Result<()> {
    let is_student = reader
        .get::<Student>(conversation.student_id)?
        .is_some_and(|s| s.user_id == actor);
    let is_professor = reader
        .get::<Professor>(conversation.professor_id)?
        .is_some_and(|p| p.user_id == actor);

    if is_student || is_professor {
        Ok(())
    } else {
        Err(MarketError::forbidden("Not a participant in this conversation"))
    }
}

fn messages_of(reader: &impl Reader, conversation_id: ConversationId) -> Result<Vec<Message>> {
    let mut messages = reader.find(|m: &Message| m.conversation_id == conversation_id)?;
    messages.sort_by_key(|m| m.created_at);
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::{ErrorKind, User, fixtures};

    struct Setup {
        store: Arc<MemoryStore>,
        messaging: MessagingService,
        professor: (User, Professor),
        student: (User, Student),
    }

    fn setup() -> Setup {
        let store = Arc::new(MemoryStore::new());
        let professor = fixtures::professor(&store, None);
        let student = fixtures::student(&store);
        Setup {
            messaging: MessagingService::new(store.clone()),
            store,
            professor,
            student,
        }
    }

    #[test]
    fn test_start_is_get_or_create() {
        let s = setup();

        let first = s
            .messaging
            .start_conversation(s.student.0.id, s.professor.1.id)
            .unwrap();
        let again = s
            .messaging
            .start_conversation(s.student.0.id, s.professor.1.id)
            .unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(s.store.find(|_: &Conversation| true).unwrap().len(), 1);

        let err = s
            .messaging
            .start_conversation(s.professor.0.id, s.professor.1.id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_exchange_and_read_receipts() {
        let s = setup();
        let conversation = s
            .messaging
            .start_conversation(s.student.0.id, s.professor.1.id)
            .unwrap();

        s.messaging
            .send_message(s.student.0.id, conversation.id, "Hi! Free on Tuesday?")
            .await
            .unwrap();
        s.messaging
            .send_message(s.professor.0.id, conversation.id, "Yes, 10am works")
            .await
            .unwrap();

        let inbox = s.messaging.list_conversations(s.professor.0.id).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].unread, 1);
        assert_eq!(
            inbox[0].last_message.as_ref().map(|m| m.body.as_str()),
            Some("Yes, 10am works")
        );

        let messages = s
            .messaging
            .list_messages(s.professor.0.id, conversation.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "Hi! Free on Tuesday?");
        assert!(messages[0].read_at.is_some());
        assert!(messages[1].read_at.is_none());

        let inbox = s.messaging.list_conversations(s.professor.0.id).unwrap();
        assert_eq!(inbox[0].unread, 0);
        assert_eq!(s.messaging.list_conversations(s.student.0.id).unwrap()[0].unread, 1);
    }

    #[tokio::test]
    async fn test_outsiders_and_blank_messages() {
        let s = setup();
        let conversation = s
            .messaging
            .start_conversation(s.student.0.id, s.professor.1.id)
            .unwrap();
        let (outsider, _) = fixtures::student(&s.store);

        let err = s
            .messaging
            .send_message(outsider.id, conversation.id, "hello?")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = s
            .messaging
            .list_messages(outsider.id, conversation.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = s
            .messaging
            .send_message(s.student.0.id, conversation.id, "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(s.messaging.list_conversations(outsider.id).unwrap().is_empty());
    }
}
