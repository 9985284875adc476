use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::info;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoDailyQuestDocument, MongoEnergyUseDocument, MongoFarmSessionDocument,
        MongoPlayerDocument, MongoReferralCompletionDocument, MongoReferralQuestDocument,
        MongoUserDocument,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{
        DailyQuestEntity, EnergyUseEntity, FarmSessionEntity, PlayerEntity, PlayerId,
        ReferralCompletionEntity, ReferralQuestEntity, UserEntity, referral_bonus,
    },
    storage::StorageResult,
};
use uuid::Uuid;

const FARM_COLLECTION_NAME: &str = "farm_sessions";
const PLAYER_COLLECTION_NAME: &str = "players";
const ENERGY_COLLECTION_NAME: &str = "energy_uses";
const USER_COLLECTION_NAME: &str = "users";
const DAILY_QUEST_COLLECTION_NAME: &str = "daily_quests";
const REFERRAL_QUEST_COLLECTION_NAME: &str = "referral_quests";
const REFERRAL_COMPLETION_COLLECTION_NAME: &str = "referral_quest_completions";

/// MongoDB-backed [`GameStore`] implementation.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = self.config.connect().await?;
        info!(database = %self.config.database_name(), "reconnected to MongoDB");
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = config.connect().await?;
        info!(database = %config.database_name(), "connected to MongoDB");

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let energy = self.energy_collection().await;

        let unique_sequence = IndexModel::builder()
            .keys(doc! {"player_id": 1, "sequence": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("energy_player_sequence_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        energy
            .create_index(unique_sequence)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ENERGY_COLLECTION_NAME,
                index: "player_id,sequence",
                source,
            })?;

        let by_use_time = IndexModel::builder()
            .keys(doc! {"player_id": 1, "used_at": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("energy_player_used_at_idx".to_owned()))
                    .build(),
            )
            .build();
        energy
            .create_index(by_use_time)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ENERGY_COLLECTION_NAME,
                index: "player_id,used_at",
                source,
            })?;

        let unique_completion = IndexModel::builder()
            .keys(doc! {"player_id": 1, "quest_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("referral_completion_player_quest_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        self.referral_completion_collection()
            .await
            .create_index(unique_completion)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: REFERRAL_COMPLETION_COLLECTION_NAME,
                index: "player_id,quest_id",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn farm_collection(&self) -> Collection<MongoFarmSessionDocument> {
        self.database().await.collection(FARM_COLLECTION_NAME)
    }

    async fn player_collection(&self) -> Collection<MongoPlayerDocument> {
        self.database().await.collection(PLAYER_COLLECTION_NAME)
    }

    async fn energy_collection(&self) -> Collection<MongoEnergyUseDocument> {
        self.database().await.collection(ENERGY_COLLECTION_NAME)
    }

    async fn user_collection(&self) -> Collection<MongoUserDocument> {
        self.database().await.collection(USER_COLLECTION_NAME)
    }

    async fn daily_quest_collection(&self) -> Collection<MongoDailyQuestDocument> {
        self.database().await.collection(DAILY_QUEST_COLLECTION_NAME)
    }

    async fn referral_quest_collection(&self) -> Collection<MongoReferralQuestDocument> {
        self.database().await.collection(REFERRAL_QUEST_COLLECTION_NAME)
    }

    async fn referral_completion_collection(&self) -> Collection<MongoReferralCompletionDocument> {
        self.database()
            .await
            .collection(REFERRAL_COMPLETION_COLLECTION_NAME)
    }

    async fn find_farm_session(&self, player: PlayerId) -> MongoResult<Option<FarmSessionEntity>> {
        let document = self
            .farm_collection()
            .await
            .find_one(doc! {"_id": player})
            .await
            .map_err(|source| farm_read(player, source))?;
        Ok(document.map(Into::into))
    }

    async fn insert_farm_session(&self, session: FarmSessionEntity) -> MongoResult<bool> {
        let player = session.player_id;
        let document: MongoFarmSessionDocument = session.into();
        match self.farm_collection().await.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(farm_write(player, source)),
        }
    }

    async fn update_farm_session(
        &self,
        player: PlayerId,
        filter: Document,
        update: Document,
    ) -> MongoResult<bool> {
        let result = self
            .farm_collection()
            .await
            .update_one(filter, update)
            .await
            .map_err(|source| farm_write(player, source))?;
        Ok(result.matched_count == 1)
    }

    async fn start_farm_cycle(&self, player: PlayerId, now: SystemTime) -> MongoResult<bool> {
        self.update_farm_session(
            player,
            doc! {"_id": player, "is_in_progress": false, "is_previous_claimed": true},
            doc! {"$set": {
                "is_in_progress": true,
                "started_at": DateTime::from_system_time(now),
                "is_previous_claimed": false,
            }},
        )
        .await
    }

    async fn expire_farm_cycle(&self, player: PlayerId, cutoff: SystemTime) -> MongoResult<bool> {
        self.update_farm_session(
            player,
            doc! {
                "_id": player,
                "is_in_progress": true,
                "started_at": {"$lte": DateTime::from_system_time(cutoff)},
            },
            doc! {"$set": {"is_in_progress": false, "started_at": null}},
        )
        .await
    }

    async fn claim_farm_reward(&self, player: PlayerId, cutoff: SystemTime) -> MongoResult<bool> {
        self.update_farm_session(
            player,
            doc! {
                "_id": player,
                "is_previous_claimed": false,
                "$or": [
                    {"started_at": null},
                    {"started_at": {"$lte": DateTime::from_system_time(cutoff)}},
                ],
            },
            doc! {"$set": {
                "is_in_progress": false,
                "started_at": null,
                "is_previous_claimed": true,
            }},
        )
        .await
    }

    async fn release_farm_claim(&self, player: PlayerId) -> MongoResult<bool> {
        self.update_farm_session(
            player,
            doc! {
                "_id": player,
                "is_previous_claimed": true,
                "is_in_progress": false,
                "started_at": null,
            },
            doc! {"$set": {"is_previous_claimed": false}},
        )
        .await
    }

    async fn find_player(&self, player: PlayerId) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .player_collection()
            .await
            .find_one(doc! {"_id": player})
            .await
            .map_err(|source| player_read(player, source))?;
        Ok(document.map(Into::into))
    }

    async fn ensure_player(
        &self,
        player: PlayerId,
        default_total_energy: u32,
    ) -> MongoResult<PlayerEntity> {
        let upserted = self
            .player_collection()
            .await
            .find_one_and_update(
                doc! {"_id": player},
                doc! {"$setOnInsert": {"total_energy": i64::from(default_total_energy)}},
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        match upserted {
            Ok(Some(document)) => Ok(document.into()),
            // Two concurrent upserts on the same `_id`: the loser sees a duplicate key.
            Ok(None) => self.reload_player(player).await,
            Err(err) if is_duplicate_key(&err) => self.reload_player(player).await,
            Err(source) => Err(player_write(player, source)),
        }
    }

    async fn reload_player(&self, player: PlayerId) -> MongoResult<PlayerEntity> {
        self.find_player(player)
            .await?
            .ok_or(MongoDaoError::MissingRecord {
                collection: PLAYER_COLLECTION_NAME,
                id: player,
            })
    }

    async fn set_player_field(&self, player: PlayerId, field: &str, value: u32) -> MongoResult<()> {
        let result = self
            .player_collection()
            .await
            .update_one(doc! {"_id": player}, doc! {"$set": {field: i64::from(value)}})
            .await
            .map_err(|source| player_write(player, source))?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::MissingRecord {
                collection: PLAYER_COLLECTION_NAME,
                id: player,
            });
        }
        Ok(())
    }

    async fn energy_uses_since(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> MongoResult<Vec<EnergyUseEntity>> {
        let documents: Vec<MongoEnergyUseDocument> = self
            .energy_collection()
            .await
            .find(doc! {
                "player_id": player,
                "used_at": {"$gt": DateTime::from_system_time(cutoff)},
            })
            .sort(doc! {"used_at": 1})
            .await
            .map_err(|source| energy_read(player, source))?
            .try_collect()
            .await
            .map_err(|source| energy_read(player, source))?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn last_energy_sequence(&self, player: PlayerId) -> MongoResult<Option<u64>> {
        let document = self
            .energy_collection()
            .await
            .find_one(doc! {"player_id": player})
            .sort(doc! {"sequence": -1})
            .await
            .map_err(|source| energy_read(player, source))?;

        Ok(document.map(|document| EnergyUseEntity::from(document).sequence))
    }

    async fn record_energy_use(&self, usage: EnergyUseEntity) -> MongoResult<bool> {
        let player = usage.player_id;
        let document: MongoEnergyUseDocument = usage.into();
        match self.energy_collection().await.insert_one(&document).await {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                collection: ENERGY_COLLECTION_NAME,
                id: player,
                source,
            }),
        }
    }

    async fn reset_energy(&self, player: PlayerId) -> MongoResult<u64> {
        let result = self
            .energy_collection()
            .await
            .delete_many(doc! {"player_id": player})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: ENERGY_COLLECTION_NAME,
                id: player,
                source,
            })?;
        Ok(result.deleted_count)
    }

    async fn find_user(&self, id: PlayerId) -> MongoResult<Option<UserEntity>> {
        let document = self
            .user_collection()
            .await
            .find_one(doc! {"_id": id})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: USER_COLLECTION_NAME,
                id,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_user(&self, user: UserEntity) -> MongoResult<bool> {
        let id = user.telegram_id;
        let referrer = user.referrer_id;
        let document: MongoUserDocument = user.into();
        let users = self.user_collection().await;

        match users.insert_one(&document).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => return Ok(false),
            Err(source) => return Err(user_write(id, source)),
        }

        if let Some(referrer) = referrer {
            users
                .update_one(doc! {"_id": referrer}, doc! {"$inc": {"referrals": 1_i64}})
                .await
                .map_err(|source| user_write(referrer, source))?;
        }
        Ok(true)
    }

    async fn credit_points(&self, user: PlayerId, amount: i64, percent: u32) -> MongoResult<()> {
        let users = self.user_collection().await;
        let before = users
            .find_one_and_update(doc! {"_id": user}, doc! {"$inc": {"points": amount}})
            .await
            .map_err(|source| user_write(user, source))?
            .ok_or(MongoDaoError::MissingRecord {
                collection: USER_COLLECTION_NAME,
                id: user,
            })?;

        let bonus = referral_bonus(amount, percent);
        if let Some(referrer) = before.referrer_id
            && bonus > 0
        {
            users
                .update_one(doc! {"_id": referrer}, doc! {"$inc": {"points": bonus}})
                .await
                .map_err(|source| user_write(referrer, source))?;
        }
        Ok(())
    }
}

impl MongoGameStore {
    async fn find_daily_quest(&self, player: PlayerId) -> MongoResult<Option<DailyQuestEntity>> {
        let document = self
            .daily_quest_collection()
            .await
            .find_one(doc! {"_id": player})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: DAILY_QUEST_COLLECTION_NAME,
                id: player,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn replace_daily_quest(
        &self,
        expected: DailyQuestEntity,
        next: DailyQuestEntity,
    ) -> MongoResult<bool> {
        let player = next.player_id;
        // A missing row stands for an unclaimed one, so only that expectation may insert.
        let may_insert = expected == DailyQuestEntity::unclaimed(expected.player_id);
        let filter = doc! {
            "_id": player,
            "streak_days": i64::from(expected.streak_days),
            "last_claimed_at": expected.last_claimed_at.map(DateTime::from_system_time),
        };
        let update = doc! {"$set": {
            "streak_days": i64::from(next.streak_days),
            "last_claimed_at": next.last_claimed_at.map(DateTime::from_system_time),
        }};

        let result = self
            .daily_quest_collection()
            .await
            .update_one(filter, update)
            .upsert(may_insert)
            .await;
        match result {
            Ok(result) => Ok(result.matched_count == 1 || result.upserted_id.is_some()),
            // The upsert lost against an existing row that no longer matches.
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                collection: DAILY_QUEST_COLLECTION_NAME,
                id: player,
                source,
            }),
        }
    }

    async fn insert_referral_quest(&self, quest: ReferralQuestEntity) -> MongoResult<()> {
        let document: MongoReferralQuestDocument = quest.into();
        self.referral_quest_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| catalog_error(REFERRAL_QUEST_COLLECTION_NAME, source))?;
        Ok(())
    }

    async fn list_referral_quests(&self) -> MongoResult<Vec<ReferralQuestEntity>> {
        let documents: Vec<MongoReferralQuestDocument> = self
            .referral_quest_collection()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| catalog_error(REFERRAL_QUEST_COLLECTION_NAME, source))?
            .try_collect()
            .await
            .map_err(|source| catalog_error(REFERRAL_QUEST_COLLECTION_NAME, source))?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_referral_quest(&self, quest_id: Uuid) -> MongoResult<Option<ReferralQuestEntity>> {
        let document = self
            .referral_quest_collection()
            .await
            .find_one(doc! {"_id": quest_id.to_string()})
            .await
            .map_err(|source| catalog_error(REFERRAL_QUEST_COLLECTION_NAME, source))?;
        Ok(document.map(Into::into))
    }

    async fn referral_completions(
        &self,
        player: PlayerId,
    ) -> MongoResult<Vec<ReferralCompletionEntity>> {
        let read = |source: mongodb::error::Error| MongoDaoError::Read {
            collection: REFERRAL_COMPLETION_COLLECTION_NAME,
            id: player,
            source,
        };
        let documents: Vec<MongoReferralCompletionDocument> = self
            .referral_completion_collection()
            .await
            .find(doc! {"player_id": player})
            .await
            .map_err(read)?
            .try_collect()
            .await
            .map_err(read)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn complete_referral_quest(
        &self,
        completion: ReferralCompletionEntity,
    ) -> MongoResult<bool> {
        let player = completion.player_id;
        let document: MongoReferralCompletionDocument = completion.into();
        match self
            .referral_completion_collection()
            .await
            .insert_one(&document)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                collection: REFERRAL_COMPLETION_COLLECTION_NAME,
                id: player,
                source,
            }),
        }
    }

    async fn revoke_referral_completion(
        &self,
        player: PlayerId,
        quest_id: Uuid,
    ) -> MongoResult<bool> {
        let result = self
            .referral_completion_collection()
            .await
            .delete_one(doc! {"player_id": player, "quest_id": quest_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: REFERRAL_COMPLETION_COLLECTION_NAME,
                id: player,
                source,
            })?;
        Ok(result.deleted_count == 1)
    }
}

fn catalog_error(collection: &'static str, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Catalog { collection, source }
}

fn farm_read(id: PlayerId, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Read {
        collection: FARM_COLLECTION_NAME,
        id,
        source,
    }
}

fn farm_write(id: PlayerId, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Write {
        collection: FARM_COLLECTION_NAME,
        id,
        source,
    }
}

fn player_read(id: PlayerId, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Read {
        collection: PLAYER_COLLECTION_NAME,
        id,
        source,
    }
}

fn player_write(id: PlayerId, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Write {
        collection: PLAYER_COLLECTION_NAME,
        id,
        source,
    }
}

fn energy_read(id: PlayerId, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Read {
        collection: ENERGY_COLLECTION_NAME,
        id,
        source,
    }
}

fn user_write(id: PlayerId, source: mongodb::error::Error) -> MongoDaoError {
    MongoDaoError::Write {
        collection: USER_COLLECTION_NAME,
        id,
        source,
    }
}

impl GameStore for MongoGameStore {
    fn find_farm_session(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<FarmSessionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_farm_session(player).await.map_err(Into::into) })
    }

    fn insert_farm_session(
        &self,
        session: FarmSessionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_farm_session(session).await.map_err(Into::into) })
    }

    fn start_farm_cycle(
        &self,
        player: PlayerId,
        now: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.start_farm_cycle(player, now).await.map_err(Into::into) })
    }

    fn expire_farm_cycle(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .expire_farm_cycle(player, cutoff)
                .await
                .map_err(Into::into)
        })
    }

    fn claim_farm_reward(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .claim_farm_reward(player, cutoff)
                .await
                .map_err(Into::into)
        })
    }

    fn release_farm_claim(&self, player: PlayerId) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.release_farm_claim(player).await.map_err(Into::into) })
    }

    fn find_player(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(player).await.map_err(Into::into) })
    }

    fn ensure_player(
        &self,
        player: PlayerId,
        default_total_energy: u32,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .ensure_player(player, default_total_energy)
                .await
                .map_err(Into::into)
        })
    }

    fn set_ball_skin(
        &self,
        player: PlayerId,
        skin_id: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_player_field(player, "ball_skin_id", skin_id)
                .await
                .map_err(Into::into)
        })
    }

    fn set_ball_hit_reward(
        &self,
        player: PlayerId,
        reward_id: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_player_field(player, "ball_hit_reward_id", reward_id)
                .await
                .map_err(Into::into)
        })
    }

    fn energy_uses_since(
        &self,
        player: PlayerId,
        cutoff: SystemTime,
    ) -> BoxFuture<'static, StorageResult<Vec<EnergyUseEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .energy_uses_since(player, cutoff)
                .await
                .map_err(Into::into)
        })
    }

    fn last_energy_sequence(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<u64>>> {
        let store = self.clone();
        Box::pin(async move { store.last_energy_sequence(player).await.map_err(Into::into) })
    }

    fn record_energy_use(
        &self,
        usage: EnergyUseEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.record_energy_use(usage).await.map_err(Into::into) })
    }

    fn reset_energy(&self, player: PlayerId) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.reset_energy(player).await.map_err(Into::into) })
    }

    fn find_user(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_user(id).await.map_err(Into::into) })
    }

    fn insert_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.insert_user(user).await.map_err(Into::into) })
    }

    fn credit_points(
        &self,
        user: PlayerId,
        amount: i64,
        referral_bonus_percent: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .credit_points(user, amount, referral_bonus_percent)
                .await
                .map_err(Into::into)
        })
    }

    fn find_daily_quest(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Option<DailyQuestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_daily_quest(player).await.map_err(Into::into) })
    }

    fn replace_daily_quest(
        &self,
        expected: DailyQuestEntity,
        next: DailyQuestEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_daily_quest(expected, next)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_referral_quest(
        &self,
        quest: ReferralQuestEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_referral_quest(quest).await.map_err(Into::into) })
    }

    fn list_referral_quests(&self) -> BoxFuture<'static, StorageResult<Vec<ReferralQuestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_referral_quests().await.map_err(Into::into) })
    }

    fn find_referral_quest(
        &self,
        quest_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ReferralQuestEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_referral_quest(quest_id).await.map_err(Into::into) })
    }

    fn referral_completions(
        &self,
        player: PlayerId,
    ) -> BoxFuture<'static, StorageResult<Vec<ReferralCompletionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.referral_completions(player).await.map_err(Into::into) })
    }

    fn complete_referral_quest(
        &self,
        completion: ReferralCompletionEntity,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .complete_referral_quest(completion)
                .await
                .map_err(Into::into)
        })
    }

    fn revoke_referral_completion(
        &self,
        player: PlayerId,
        quest_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .revoke_referral_completion(player, quest_id)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
