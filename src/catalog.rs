//! The fixed gauge catalog.
//!
//! Names, help strings and label keys are the contract with dashboards and
//! alert rules that scrape the exporter; do not rename them.

/// Static description of one gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

const fn scalar(name: &'static str, help: &'static str) -> GaugeSpec {
    GaugeSpec {
        name,
        help,
        labels: &[],
    }
}

const fn labeled(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> GaugeSpec {
    GaugeSpec { name, help, labels }
}

// Messages
pub const MESSAGE_TOKEN_SUM: GaugeSpec = scalar(
    "librechat_message_token_sum",
    "Sum of tokenCount for all messages",
);
pub const MESSAGE_TOKEN_AVG: GaugeSpec = scalar(
    "librechat_message_token_avg",
    "Average tokenCount for messages",
);
pub const ERROR_MESSAGE_COUNT: GaugeSpec = scalar(
    "librechat_error_message_count",
    "Count of messages with error",
);
pub const MESSAGE_WITH_ATTACHMENTS_COUNT: GaugeSpec = scalar(
    "librechat_message_with_attachments_count",
    "Count of messages with attachments",
);
pub const MESSAGE_PLUGIN_USAGE_PERCENT: GaugeSpec = scalar(
    "librechat_message_plugin_usage_percent",
    "Percentage of messages that use a plugin",
);

// Banners
pub const ACTIVE_BANNER_COUNT: GaugeSpec = scalar(
    "librechat_active_banner_count",
    "Count of banners currently active",
);

// Files
pub const FILE_TOTAL_BYTES: GaugeSpec =
    scalar("librechat_file_total_bytes", "Total bytes of all files");
pub const FILE_AVG_BYTES: GaugeSpec =
    scalar("librechat_file_avg_bytes", "Average file size in bytes");

// Agents
pub const AGENT_MODEL_COUNT: GaugeSpec = labeled(
    "librechat_agent_model_count",
    "Count of agents by model",
    &["model"],
);

// Users
pub const USER_PROVIDER_COUNT: GaugeSpec = labeled(
    "librechat_user_provider_count",
    "Count of users by provider",
    &["provider"],
);
pub const ACTIVE_USER_COUNT: GaugeSpec = scalar(
    "librechat_active_users",
    "Number of active users within the last 5 minutes",
);

// Sessions
pub const SESSION_AVG_DURATION: GaugeSpec = scalar(
    "librechat_session_avg_duration",
    "Average session duration in seconds",
);

// Prompts
pub const PROMPT_GROUP_GENERATIONS_AVG: GaugeSpec = scalar(
    "librechat_prompt_group_generations_avg",
    "Average number of generations in prompt groups",
);
pub const PROMPT_COUNT_BY_TYPE: GaugeSpec = labeled(
    "librechat_prompt_count_by_type",
    "Count of prompts by type",
    &["type"],
);

// Tool calls
pub const TOOL_CALL_COUNT_BY_TOOL: GaugeSpec = labeled(
    "librechat_tool_call_count_by_tool",
    "Count of tool calls by toolId",
    &["toolId"],
);

// Conversations
pub const CONVERSATION_MESSAGE_AVG: GaugeSpec = scalar(
    "librechat_conversation_message_avg",
    "Average number of messages per conversation",
);

// Transactions
pub const TRANSACTION_COST_SUM: GaugeSpec = labeled(
    "librechat_transaction_cost_sum",
    "Sum of raw transaction amounts by token type",
    &["tokenType"],
);
pub const TRANSACTION_COST_AVG: GaugeSpec = labeled(
    "librechat_transaction_cost_avg",
    "Average raw transaction amount by token type",
    &["tokenType"],
);

// Actions
pub const ACTION_COUNT_BY_TYPE: GaugeSpec = labeled(
    "librechat_action_count_by_type",
    "Count of actions by type",
    &["type"],
);

// Deployed models
pub const DEPLOYED_MODEL_USAGE_COUNT: GaugeSpec = labeled(
    "librechat_deployed_model_usage_count",
    "Usage count for each deployed agent model as indicated by the Message model (using agent name)",
    &["model"],
);
pub const DEPLOYED_MODEL_NAMES_COUNT: GaugeSpec = scalar(
    "librechat_deployed_model_names_count",
    "Total number of distinct deployed agent model names found in messages",
);

/// Every gauge the exporter publishes.
pub const CATALOG: &[GaugeSpec] = &[
    MESSAGE_TOKEN_SUM,
    MESSAGE_TOKEN_AVG,
    ERROR_MESSAGE_COUNT,
    MESSAGE_WITH_ATTACHMENTS_COUNT,
    MESSAGE_PLUGIN_USAGE_PERCENT,
    ACTIVE_BANNER_COUNT,
    FILE_TOTAL_BYTES,
    FILE_AVG_BYTES,
    AGENT_MODEL_COUNT,
    USER_PROVIDER_COUNT,
    ACTIVE_USER_COUNT,
    SESSION_AVG_DURATION,
    PROMPT_GROUP_GENERATIONS_AVG,
    PROMPT_COUNT_BY_TYPE,
    TOOL_CALL_COUNT_BY_TOOL,
    CONVERSATION_MESSAGE_AVG,
    TRANSACTION_COST_SUM,
    TRANSACTION_COST_AVG,
    ACTION_COUNT_BY_TYPE,
    DEPLOYED_MODEL_USAGE_COUNT,
    DEPLOYED_MODEL_NAMES_COUNT,
];
