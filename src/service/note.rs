use std::sync::Arc;

use uuid::Uuid;

use crate::auth::UserId;
use crate::core::note::{NewNote, Note, NotePatch};
use crate::store::{NoteFilter, NoteStore, Result, StoreError, Subscription};

/// Notes with a two-step delete: the first moves the note to the trash, the
/// second purges it from the store for good.
pub struct NoteService {
    store: Arc<dyn NoteStore>,
}

impl NoteService {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    pub async fn add(&self, user: UserId, title: &str, content: &str) -> Result<Note> {
        self.store
            .create_note(NewNote::new(user, title.trim(), content))
            .await
    }

    pub async fn edit(&self, id: Uuid, title: &str, content: &str) -> Result<()> {
        self.store
            .update_note(
                id,
                NotePatch {
                    title: Some(title.trim().to_string()),
                    content: Some(content.to_string()),
                    ..NotePatch::default()
                },
            )
            .await
    }

    /// Replace who the note is shared with. Owner only.
    pub async fn set_shared_with(
        &self,
        acting: &UserId,
        id: Uuid,
        users: Vec<UserId>,
    ) -> Result<()> {
        let note = self
            .store
            .get_note(id)
            .await?
            .ok_or(StoreError::NotFound(id))?;
        if note.owner != *acting {
            return Err(StoreError::denied("only the owner can change sharing"));
        }

        let mut cleaned: Vec<UserId> = Vec::new();
        for user in users {
            if user != note.owner && !cleaned.contains(&user) {
                cleaned.push(user);
            }
        }
        self.store
            .update_note(
                id,
                NotePatch {
                    shared_with: Some(cleaned),
                    ..NotePatch::default()
                },
            )
            .await
    }

    pub async fn move_to_trash(&self, id: Uuid) -> Result<()> {
        self.set_deleted(id, true).await
    }

    pub async fn restore(&self, id: Uuid) -> Result<()> {
        self.set_deleted(id, false).await
    }

    /// Remove the document permanently. The trash view calls this for notes
    /// that are already soft-deleted.
    pub async fn purge(&self, id: Uuid) -> Result<()> {
        self.store.delete_note(id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Note>> {
        self.store.get_note(id).await
    }

    pub async fn subscribe(&self, filter: NoteFilter) -> Result<Subscription<Note>> {
        self.store.subscribe_notes(filter).await
    }

    async fn set_deleted(&self, id: Uuid, deleted: bool) -> Result<()> {
        self.store
            .update_note(
                id,
                NotePatch {
                    deleted: Some(deleted),
                    ..NotePatch::default()
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn ada() -> UserId {
        UserId::from_email("ada@example.com")
    }

    fn grace() -> UserId {
        UserId::from_email("grace@example.com")
    }

    fn service() -> NoteService {
        NoteService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn trash_then_restore_then_purge() {
        let service = service();
        let note = service.add(ada(), "Groceries", "milk").await.unwrap();

        service.move_to_trash(note.id).await.unwrap();
        assert!(service.get(note.id).await.unwrap().unwrap().deleted);

        service.restore(note.id).await.unwrap();
        assert!(!service.get(note.id).await.unwrap().unwrap().deleted);

        service.move_to_trash(note.id).await.unwrap();
        service.purge(note.id).await.unwrap();
        assert!(service.get(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn trash_subscription_sees_only_deleted_notes() {
        let service = service();
        let keep = service.add(ada(), "Keep", "").await.unwrap();
        let toss = service.add(ada(), "Toss", "").await.unwrap();

        let mut trash = service
            .subscribe(NoteFilter::owned_by(ada()).with_deleted(true))
            .await
            .unwrap();
        assert!(trash.next().await.unwrap().is_empty());

        service.move_to_trash(toss.id).await.unwrap();
        let delivered = trash.next().await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, toss.id);
        assert_ne!(delivered[0].id, keep.id);
    }

    #[tokio::test]
    async fn sharing_a_note_is_owner_only() {
        let service = service();
        let note = service.add(ada(), "Plan", "").await.unwrap();

        let err = service
            .set_shared_with(&grace(), note.id, vec![grace()])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Denied(_)));

        service
            .set_shared_with(&ada(), note.id, vec![grace()])
            .await
            .unwrap();
        assert_eq!(
            service.get(note.id).await.unwrap().unwrap().shared_with,
            vec![grace()]
        );
    }

    #[tokio::test]
    async fn edit_replaces_title_and_content() {
        let service = service();
        let note = service.add(ada(), "Draft", "old").await.unwrap();

        service.edit(note.id, "  Final  ", "new").await.unwrap();
        let stored = service.get(note.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Final");
        assert_eq!(stored.content, "new");
    }
}
