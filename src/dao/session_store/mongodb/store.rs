use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database,
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions, ReturnDocument},
};
use tracing::warn;

use super::{
    connection::connect_with_retry,
    error::{MongoDaoError, MongoResult},
    models::{CounterDocument, SessionDocument},
};
use crate::dao::{
    models::{AnswerEntity, EventEntity, SessionEntity},
    session_store::SessionStore,
    storage::StorageResult,
};

const SESSION_COLLECTION: &str = "sessions";
const ANSWER_COLLECTION: &str = "answers";
const EVENT_COLLECTION: &str = "events";
const COUNTER_COLLECTION: &str = "event_counters";

/// Connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed driver options.
    pub options: ClientOptions,
    /// Database holding all four collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection URI, preferring an explicit database name over the
    /// one embedded in the URI.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = ClientOptions::parse(uri)
            .await
            .map_err(|source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            })?;

        let database_name = db_name
            .map(str::to_owned)
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| "trivia_rush".to_owned());

        Ok(Self {
            options,
            database_name,
        })
    }
}

/// MongoDB-backed [`SessionStore`]. Cloneable; clones share one connection.
#[derive(Clone)]
pub struct MongoSessionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: Database,
}

impl MongoSessionStore {
    /// Establish a connection and ensure the indexes the engine's atomicity
    /// guarantees lean on (unique answer triple, unique event sequence).
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            connect_with_retry(config.options.clone(), &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner { database }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        // The duplicate-answer rejection in submit_answer is enforced here,
        // not by a read-then-write in the service layer.
        let answer_identity = mongodb::IndexModel::builder()
            .keys(doc! {"session_id": 1, "player_id": 1, "question_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("answer_identity_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        self.answer_collection()
            .create_index(answer_identity)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ANSWER_COLLECTION,
                index: "session_id,player_id,question_id",
                source,
            })?;

        let event_seq = mongodb::IndexModel::builder()
            .keys(doc! {"session_id": 1, "seq": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("event_seq_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        self.event_collection()
            .create_index(event_seq)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: EVENT_COLLECTION,
                index: "session_id,seq",
                source,
            })?;

        Ok(())
    }

    fn session_collection(&self) -> Collection<SessionDocument> {
        self.inner.database.collection(SESSION_COLLECTION)
    }

    fn answer_collection(&self) -> Collection<AnswerEntity> {
        self.inner.database.collection(ANSWER_COLLECTION)
    }

    fn event_collection(&self) -> Collection<EventEntity> {
        self.inner.database.collection(EVENT_COLLECTION)
    }

    fn counter_collection(&self) -> Collection<CounterDocument> {
        self.inner.database.collection(COUNTER_COLLECTION)
    }

    async fn find_session(&self, id: String) -> MongoResult<Option<SessionEntity>> {
        let document = self
            .session_collection()
            .find_one(doc! {"_id": &id})
            .await
            .map_err(|source| MongoDaoError::LoadSession { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_session(&self, session: SessionEntity) -> MongoResult<()> {
        let id = session.id.clone();
        let document: SessionDocument = session.into();
        self.session_collection()
            .replace_one(doc! {"_id": &id}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveSession { id, source })?;
        Ok(())
    }

    async fn insert_answer(&self, answer: AnswerEntity) -> MongoResult<bool> {
        match self.answer_collection().insert_one(&answer).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::InsertAnswer {
                session_id: answer.session_id,
                source,
            }),
        }
    }

    async fn answers_for_question(
        &self,
        session_id: String,
        question_id: String,
    ) -> MongoResult<Vec<AnswerEntity>> {
        self.answer_collection()
            .find(doc! {"session_id": &session_id, "question_id": &question_id})
            .await
            .map_err(|source| MongoDaoError::ListAnswers {
                session_id: session_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListAnswers {
                session_id,
                source,
            })
    }

    async fn delete_answers(&self, session_id: String) -> MongoResult<()> {
        self.answer_collection()
            .delete_many(doc! {"session_id": &session_id})
            .await
            .map_err(|source| MongoDaoError::DeleteAnswers {
                session_id,
                source,
            })?;
        Ok(())
    }

    async fn next_event_seq(&self, session_id: String) -> MongoResult<i64> {
        let counters = self.counter_collection();
        let updated = counters
            .find_one_and_update(doc! {"_id": &session_id}, doc! {"$inc": {"seq": 1}})
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::AdvanceCounter {
                session_id: session_id.clone(),
                source,
            })?;

        if let Some(counter) = updated {
            return Ok(counter.seq);
        }

        // The upsert went through but the provider did not echo the updated
        // document. Re-read before synthesizing a baseline so an existing
        // counter is never clobbered.
        warn!(session_id = %session_id, "event counter increment returned no document; re-reading");
        let reread = counters
            .find_one(doc! {"_id": &session_id})
            .await
            .map_err(|source| MongoDaoError::AdvanceCounter {
                session_id: session_id.clone(),
                source,
            })?;
        if let Some(counter) = reread {
            return Ok(counter.seq);
        }

        let baseline = CounterDocument {
            session_id: session_id.clone(),
            seq: 1,
        };
        counters
            .replace_one(doc! {"_id": &session_id}, &baseline)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::AdvanceCounter {
                session_id,
                source,
            })?;
        Ok(baseline.seq)
    }

    async fn insert_event(&self, event: EventEntity) -> MongoResult<()> {
        let session_id = event.session_id.clone();
        self.event_collection()
            .insert_one(&event)
            .await
            .map_err(|source| MongoDaoError::InsertEvent { session_id, source })?;
        Ok(())
    }

    async fn events_after(
        &self,
        session_id: String,
        after: i64,
        limit: i64,
    ) -> MongoResult<Vec<EventEntity>> {
        let event_collection = self.event_collection();
        let mut find = event_collection
            .find(doc! {"session_id": &session_id, "seq": {"$gt": after}})
            .sort(doc! {"seq": 1});
        if limit > 0 {
            find = find.limit(limit);
        }

        find.await
            .map_err(|source| MongoDaoError::ListEvents {
                session_id: session_id.clone(),
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListEvents {
                session_id,
                source,
            })
    }

    async fn delete_events(&self, session_id: String) -> MongoResult<()> {
        self.event_collection()
            .delete_many(doc! {"session_id": &session_id})
            .await
            .map_err(|source| MongoDaoError::DeleteEvents {
                session_id,
                source,
            })?;
        Ok(())
    }

    async fn reset_event_counter(&self, session_id: String) -> MongoResult<()> {
        let baseline = CounterDocument {
            session_id: session_id.clone(),
            seq: 0,
        };
        self.counter_collection()
            .replace_one(doc! {"_id": &session_id}, &baseline)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::AdvanceCounter {
                session_id,
                source,
            })?;
        Ok(())
    }

    async fn ping(&self) -> MongoResult<()> {
        self.inner
            .database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == 11000
    )
}

impl SessionStore for MongoSessionStore {
    fn find_session(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let store = self.clone();
        let id = id.to_owned();
        Box::pin(async move { store.find_session(id).await.map_err(Into::into) })
    }

    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_session(session).await.map_err(Into::into) })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_answer(answer).await.map_err(Into::into) })
    }

    fn answers_for_question(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        let question_id = question_id.to_owned();
        Box::pin(async move {
            store
                .answers_for_question(session_id, question_id)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_answers(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move { store.delete_answers(session_id).await.map_err(Into::into) })
    }

    fn next_event_seq(&self, session_id: &str) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move { store.next_event_seq(session_id).await.map_err(Into::into) })
    }

    fn insert_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_event(event).await.map_err(Into::into) })
    }

    fn events_after(
        &self,
        session_id: &str,
        after: i64,
        limit: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<EventEntity>>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            store
                .events_after(session_id, after, limit)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_events(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move { store.delete_events(session_id).await.map_err(Into::into) })
    }

    fn reset_event_counter(&self, session_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let session_id = session_id.to_owned();
        Box::pin(async move {
            store
                .reset_event_counter(session_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
