//! The fixed list of aggregation tasks run by each cycle.
//!
//! Each task issues its read queries and turns the rows into
//! [`GaugeUpdate`]s. Tasks never touch the registry themselves.

use super::deployed::{self, ModelUsage};
use super::rows;
use crate::catalog::{self, GaugeSpec};
use crate::error::{Error, Result};
use crate::registry::GaugeUpdate;
use crate::store::{Collection, DocumentStore};
use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{self, Bson, doc};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Look-back window for the active-user count, in minutes.
pub const ACTIVE_USER_WINDOW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    MessageTokens,
    ErrorMessages,
    MessagesWithAttachments,
    PluginUsage,
    ActiveBanners,
    Files,
    AgentsByModel,
    UsersByProvider,
    ActiveUsers,
    SessionDuration,
    PromptGroupGenerations,
    PromptsByType,
    ToolCallsByTool,
    ConversationMessages,
    TransactionsByTokenType,
    ActionsByType,
    DeployedModels,
}

impl Task {
    /// Every task, in execution order.
    pub const ALL: [Task; 17] = [
        Task::MessageTokens,
        Task::ErrorMessages,
        Task::MessagesWithAttachments,
        Task::PluginUsage,
        Task::ActiveBanners,
        Task::Files,
        Task::AgentsByModel,
        Task::UsersByProvider,
        Task::ActiveUsers,
        Task::SessionDuration,
        Task::PromptGroupGenerations,
        Task::PromptsByType,
        Task::ToolCallsByTool,
        Task::ConversationMessages,
        Task::TransactionsByTokenType,
        Task::ActionsByType,
        Task::DeployedModels,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Task::MessageTokens => "message_tokens",
            Task::ErrorMessages => "error_messages",
            Task::MessagesWithAttachments => "messages_with_attachments",
            Task::PluginUsage => "plugin_usage",
            Task::ActiveBanners => "active_banners",
            Task::Files => "files",
            Task::AgentsByModel => "agents_by_model",
            Task::UsersByProvider => "users_by_provider",
            Task::ActiveUsers => "active_users",
            Task::SessionDuration => "session_duration",
            Task::PromptGroupGenerations => "prompt_group_generations",
            Task::PromptsByType => "prompts_by_type",
            Task::ToolCallsByTool => "tool_calls_by_tool",
            Task::ConversationMessages => "conversation_messages",
            Task::TransactionsByTokenType => "transactions_by_token_type",
            Task::ActionsByType => "actions_by_type",
            Task::DeployedModels => "deployed_models",
        }
    }

    /// Run the task's queries. `now` is the cycle's start time.
    pub async fn run(self, store: &dyn DocumentStore, now: DateTime<Utc>) -> Result<Vec<GaugeUpdate>> {
        match self {
            Task::MessageTokens => {
                let rows = store
                    .aggregate(
                        Collection::Messages,
                        vec![doc! { "$group": {
                            "_id": Bson::Null,
                            "total": { "$sum": "$tokenCount" },
                            "avg": { "$avg": "$tokenCount" },
                        } }],
                    )
                    .await?;
                Ok(vec![
                    set(catalog::MESSAGE_TOKEN_SUM, rows::scalar(&rows, "total")),
                    set(catalog::MESSAGE_TOKEN_AVG, rows::scalar(&rows, "avg")),
                ])
            }
            Task::ErrorMessages => {
                let count = store
                    .count_documents(Collection::Messages, doc! { "error": true })
                    .await?;
                Ok(vec![set(catalog::ERROR_MESSAGE_COUNT, count as f64)])
            }
            Task::MessagesWithAttachments => {
                let count = store
                    .count_documents(
                        Collection::Messages,
                        doc! { "attachments": { "$exists": true, "$ne": [] } },
                    )
                    .await?;
                Ok(vec![set(catalog::MESSAGE_WITH_ATTACHMENTS_COUNT, count as f64)])
            }
            Task::PluginUsage => {
                let total = store.count_documents(Collection::Messages, doc! {}).await?;
                let with_plugin = store
                    .count_documents(
                        Collection::Messages,
                        doc! { "plugin": { "$exists": true, "$ne": Bson::Null } },
                    )
                    .await?;
                Ok(vec![set(
                    catalog::MESSAGE_PLUGIN_USAGE_PERCENT,
                    percent(with_plugin, total),
                )])
            }
            Task::ActiveBanners => {
                let now = to_bson(now);
                let count = store
                    .count_documents(
                        Collection::Banners,
                        doc! {
                            "displayFrom": { "$lte": now },
                            "$or": [
                                { "displayTo": Bson::Null },
                                { "displayTo": { "$gte": now } },
                            ],
                        },
                    )
                    .await?;
                Ok(vec![set(catalog::ACTIVE_BANNER_COUNT, count as f64)])
            }
            Task::Files => {
                let rows = store
                    .aggregate(
                        Collection::Files,
                        vec![doc! { "$group": {
                            "_id": Bson::Null,
                            "totalBytes": { "$sum": "$bytes" },
                            "avgBytes": { "$avg": "$bytes" },
                        } }],
                    )
                    .await?;
                Ok(vec![
                    set(catalog::FILE_TOTAL_BYTES, rows::scalar(&rows, "totalBytes")),
                    set(catalog::FILE_AVG_BYTES, rows::scalar(&rows, "avgBytes")),
                ])
            }
            Task::AgentsByModel => {
                count_by(store, Collection::Agents, "$model", catalog::AGENT_MODEL_COUNT).await
            }
            Task::UsersByProvider => {
                count_by(store, Collection::Users, "$provider", catalog::USER_PROVIDER_COUNT).await
            }
            Task::ActiveUsers => {
                let since = to_bson(now - Duration::minutes(ACTIVE_USER_WINDOW_MINUTES));
                let rows = store
                    .aggregate(
                        Collection::Messages,
                        vec![
                            doc! { "$match": { "createdAt": { "$gte": since } } },
                            doc! { "$group": { "_id": "$user" } },
                            doc! { "$count": "activeUsers" },
                        ],
                    )
                    .await?;
                Ok(vec![set(
                    catalog::ACTIVE_USER_COUNT,
                    rows::scalar(&rows, "activeUsers"),
                )])
            }
            Task::SessionDuration => {
                let rows = store
                    .aggregate(
                        Collection::Sessions,
                        vec![
                            doc! { "$project": {
                                "duration": { "$subtract": ["$expiration", "$createdAt"] },
                            } },
                            doc! { "$group": {
                                "_id": Bson::Null,
                                "avgDuration": { "$avg": "$duration" },
                            } },
                        ],
                    )
                    .await?;
                // Durations are in milliseconds.
                Ok(vec![set(
                    catalog::SESSION_AVG_DURATION,
                    rows::scalar(&rows, "avgDuration") / 1000.0,
                )])
            }
            Task::PromptGroupGenerations => {
                let rows = store
                    .aggregate(
                        Collection::PromptGroups,
                        vec![doc! { "$group": {
                            "_id": Bson::Null,
                            "avgGenerations": { "$avg": "$numberOfGenerations" },
                        } }],
                    )
                    .await?;
                Ok(vec![set(
                    catalog::PROMPT_GROUP_GENERATIONS_AVG,
                    rows::scalar(&rows, "avgGenerations"),
                )])
            }
            Task::PromptsByType => {
                count_by(store, Collection::Prompts, "$type", catalog::PROMPT_COUNT_BY_TYPE).await
            }
            Task::ToolCallsByTool => {
                count_by(
                    store,
                    Collection::ToolCalls,
                    "$toolId",
                    catalog::TOOL_CALL_COUNT_BY_TOOL,
                )
                .await
            }
            Task::ConversationMessages => {
                let rows = store
                    .aggregate(
                        Collection::Conversations,
                        vec![
                            doc! { "$project": {
                                "msgCount": { "$size": { "$ifNull": ["$messages", []] } },
                            } },
                            doc! { "$group": {
                                "_id": Bson::Null,
                                "avgMessages": { "$avg": "$msgCount" },
                            } },
                        ],
                    )
                    .await?;
                Ok(vec![set(
                    catalog::CONVERSATION_MESSAGE_AVG,
                    rows::scalar(&rows, "avgMessages"),
                )])
            }
            Task::TransactionsByTokenType => {
                let rows = store
                    .aggregate(
                        Collection::Transactions,
                        vec![doc! { "$group": {
                            "_id": group_key("$tokenType"),
                            "totalCost": { "$sum": "$rawAmount" },
                            "avgCost": { "$avg": "$rawAmount" },
                        } }],
                    )
                    .await?;
                Ok(vec![
                    replace(catalog::TRANSACTION_COST_SUM, rows::grouped(&rows, "totalCost")),
                    replace(catalog::TRANSACTION_COST_AVG, rows::grouped(&rows, "avgCost")),
                ])
            }
            Task::ActionsByType => {
                count_by(store, Collection::Actions, "$type", catalog::ACTION_COUNT_BY_TYPE).await
            }
            Task::DeployedModels => deployed_models(store).await,
        }
    }
}

/// `part / total * 100`, or 0 when `total` is 0.
pub fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn set(spec: GaugeSpec, value: f64) -> GaugeUpdate {
    GaugeUpdate::Set {
        name: spec.name,
        value,
    }
}

fn replace(spec: GaugeSpec, series: Vec<(Vec<String>, f64)>) -> GaugeUpdate {
    GaugeUpdate::Replace {
        name: spec.name,
        series,
    }
}

/// Group key expression that folds null and missing values into `""`, so
/// every value that publishes as `unknown` lands in a single group.
fn group_key(field: &str) -> Bson {
    Bson::Document(doc! { "$ifNull": [field, ""] })
}

fn to_bson(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

async fn count_by(
    store: &dyn DocumentStore,
    collection: Collection,
    key: &str,
    spec: GaugeSpec,
) -> Result<Vec<GaugeUpdate>> {
    let rows = store
        .aggregate(
            collection,
            vec![doc! { "$group": { "_id": group_key(key), "count": { "$sum": 1 } } }],
        )
        .await?;
    Ok(vec![replace(spec, rows::grouped(&rows, "count"))])
}

#[derive(Debug, Deserialize)]
struct AgentRef {
    id: String,
    /// Kept raw: a non-string name falls back to the id instead of failing
    /// the cycle.
    #[serde(default)]
    name: Option<Bson>,
}

impl AgentRef {
    fn name(&self) -> Option<&str> {
        match &self.name {
            Some(Bson::String(name)) => Some(name),
            _ => None,
        }
    }
}

async fn deployed_models(store: &dyn DocumentStore) -> Result<Vec<GaugeUpdate>> {
    let rows = store
        .aggregate(
            Collection::Messages,
            vec![
                doc! { "$match": { "model": { "$ne": Bson::Null } } },
                doc! { "$group": { "_id": "$model", "count": { "$sum": 1 } } },
            ],
        )
        .await?;
    let usage: Vec<ModelUsage> = rows
        .iter()
        // Empty model ids publish as `unknown`, like every other group key.
        .map(|row| ModelUsage {
            model_id: rows::label(row.get("_id")),
            count: rows::number(row, "count"),
        })
        .collect();

    let ids = deployed::agent_ids(&usage);
    let mut names = HashMap::with_capacity(ids.len());
    if !ids.is_empty() {
        let agents = store
            .find(Collection::Agents, doc! { "id": { "$in": ids } })
            .await?;
        for agent in agents {
            let agent: AgentRef = bson::from_document(agent).map_err(|e| Error::Decode {
                collection: Collection::Agents.to_string(),
                message: e.to_string(),
            })?;
            let display = deployed::display_name(&agent.id, agent.name());
            names.insert(agent.id, display);
        }
    }

    let resolved = deployed::resolve(&usage, &names);
    if !resolved.stale.is_empty() {
        debug!(stale = ?resolved.stale, "ignoring messages that reference deleted agents");
    }

    Ok(vec![
        replace(
            catalog::DEPLOYED_MODEL_USAGE_COUNT,
            resolved
                .usage
                .into_iter()
                .map(|(model, count)| (vec![model], count))
                .collect(),
        ),
        set(catalog::DEPLOYED_MODEL_NAMES_COUNT, resolved.distinct as f64),
    ])
}
